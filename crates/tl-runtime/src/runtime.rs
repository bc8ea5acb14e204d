//! # Directory Runtime
//!
//! Owns the directory service, its store and the maintenance task.

use std::sync::Arc;

use anyhow::{Context, Result};
use tl_directory::{
    DirectoryStore, InMemoryDirectoryStore, JsonFileDirectoryStore, SystemTimeSource, TimeSource,
    TrixelDirectoryService,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::RuntimeConfig;
use crate::maintenance::run_maintenance_loop;

/// The running directory process.
pub struct DirectoryRuntime {
    config: RuntimeConfig,
    service: Arc<TrixelDirectoryService>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    maintenance: Option<JoinHandle<u64>>,
}

impl DirectoryRuntime {
    /// Open the store and restore the directory using the system clock.
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        Self::with_time_source(config, Box::new(SystemTimeSource::new()))
    }

    /// Open the store and restore the directory using `time_source`.
    pub fn with_time_source(
        config: RuntimeConfig,
        time_source: Box<dyn TimeSource>,
    ) -> Result<Self> {
        let store: Arc<dyn DirectoryStore> = match &config.data_file {
            Some(path) => {
                info!("[tl-runtime] Using directory file {}", path.display());
                let store =
                    JsonFileDirectoryStore::open_with_retention(path, config.directory.history_limit)
                        .with_context(|| format!("Failed to open {}", path.display()))?;
                Arc::new(store)
            }
            None => {
                info!("[tl-runtime] No data file configured, state is in-memory only");
                Arc::new(InMemoryDirectoryStore::with_retention(
                    config.directory.history_limit,
                ))
            }
        };

        let service = TrixelDirectoryService::new(config.directory.clone(), store, time_source)
            .context("Failed to restore trixel directory")?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            service: Arc::new(service),
            shutdown_tx,
            shutdown_rx,
            maintenance: None,
        })
    }

    /// Spawn the maintenance loop. Calling it twice has no effect.
    pub fn start(&mut self) {
        if self.maintenance.is_some() {
            return;
        }
        let interval = self.config.sweep_interval();
        info!(
            "[tl-runtime] Starting maintenance every {}s",
            interval.as_secs()
        );
        self.maintenance = Some(tokio::spawn(run_maintenance_loop(
            Arc::clone(&self.service),
            interval,
            self.shutdown_rx.clone(),
        )));
    }

    /// Stop the maintenance loop and wait for it.
    pub async fn shutdown(mut self) {
        info!("[tl-runtime] Initiating graceful shutdown...");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("[tl-runtime] Failed to send shutdown signal: {}", e);
        }
        if let Some(handle) = self.maintenance.take() {
            match handle.await {
                Ok(passes) => info!("[tl-runtime] Maintenance ran {} passes", passes),
                Err(e) => error!("[tl-runtime] Maintenance task failed: {}", e),
            }
        }
        info!("[tl-runtime] Shutdown complete");
    }

    /// The directory service, for wiring a transport.
    pub fn service(&self) -> Arc<TrixelDirectoryService> {
        Arc::clone(&self.service)
    }

    /// Active configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tl_directory::test_utils::ManualTimeSource;
    use tl_directory::{Page, TransportSecurity, TrixelDirectoryApi, TrixelId};

    fn file_config(path: std::path::PathBuf) -> RuntimeConfig {
        RuntimeConfig {
            data_file: Some(path),
            sweep_interval_secs: Some(1),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_state_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(dir.path().join("directory.json"));

        let mut runtime = DirectoryRuntime::with_time_source(
            config.clone(),
            Box::new(ManualTimeSource::new(1000)),
        )
        .unwrap();
        runtime.start();
        let id = runtime
            .service()
            .register_backend("tms.example.org", TransportSecurity::Encrypted, 50)
            .unwrap();
        runtime.shutdown().await;

        let restarted =
            DirectoryRuntime::with_time_source(config, Box::new(ManualTimeSource::new(1001)))
                .unwrap();
        let service = restarted.service();
        assert_eq!(service.list_backends(None, Page::default()).len(), 1);
        assert_eq!(service.who_owns(TrixelId::new(12).unwrap()).unwrap(), id);
    }

    #[tokio::test]
    async fn test_in_memory_runtime_starts_empty() {
        let mut runtime = DirectoryRuntime::new(RuntimeConfig::default()).unwrap();
        runtime.start();
        runtime.start();
        assert!(runtime.service().assignment_snapshot().is_empty());
        runtime.shutdown().await;
    }

    #[test]
    fn test_corrupt_data_file_fails_startup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("directory.json");
        std::fs::write(&path, b"{ not json").unwrap();
        let err = DirectoryRuntime::new(file_config(path)).err().unwrap();
        assert!(err.to_string().contains("Failed to open"));
    }
}

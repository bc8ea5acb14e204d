//! # Directory Configuration
//!
//! Tunables for admission, growth, liveness and history.

use serde::{Deserialize, Serialize};

use super::errors::DirectoryError;

/// Directory configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Accept backends registering with plain transport.
    /// Never enable in production.
    pub allow_insecure_transport: bool,
    /// Load ratio above which a lookup triggers growth.
    pub high_water: f64,
    /// Load ratio below which sibling subtrees may be merged.
    pub low_water: f64,
    /// Expected seconds between heartbeats.
    pub heartbeat_interval_secs: u64,
    /// Missed heartbeats before a backend is unreachable.
    pub max_missed_heartbeats: u32,
    /// Seconds an unreachable backend keeps its territory.
    pub eviction_grace_secs: u64,
    /// Consecutive low-load heartbeats before a merge is considered.
    pub merge_after_low_heartbeats: u32,
    /// Superseded assignments kept in memory.
    pub history_limit: usize,
    /// Upper bound on registered backends.
    pub max_backends: Option<usize>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            allow_insecure_transport: false,
            high_water: 0.85,
            low_water: 0.25,
            heartbeat_interval_secs: 30,
            max_missed_heartbeats: 3,
            eviction_grace_secs: 300,
            merge_after_low_heartbeats: 10,
            history_limit: 4096,
            max_backends: None,
        }
    }
}

impl DirectoryConfig {
    /// Create config for testing.
    pub fn for_testing() -> Self {
        Self {
            allow_insecure_transport: false,
            high_water: 0.8,
            low_water: 0.2,
            heartbeat_interval_secs: 10,
            max_missed_heartbeats: 3,
            eviction_grace_secs: 60,
            merge_after_low_heartbeats: 2,
            history_limit: 64,
            max_backends: None,
        }
    }

    /// Seconds of silence after which a backend is unreachable.
    pub fn unreachable_after_secs(&self) -> u64 {
        self.heartbeat_interval_secs
            .saturating_mul(u64::from(self.max_missed_heartbeats))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), DirectoryError> {
        if !self.high_water.is_finite() || !self.low_water.is_finite() {
            return Err(DirectoryError::Config(
                "water marks must be finite".to_string(),
            ));
        }
        if self.low_water <= 0.0 || self.low_water >= self.high_water {
            return Err(DirectoryError::Config(format!(
                "require 0 < low_water ({}) < high_water ({})",
                self.low_water, self.high_water
            )));
        }
        if self.heartbeat_interval_secs == 0 {
            return Err(DirectoryError::Config(
                "heartbeat_interval_secs must be positive".to_string(),
            ));
        }
        if self.max_missed_heartbeats == 0 {
            return Err(DirectoryError::Config(
                "max_missed_heartbeats must be positive".to_string(),
            ));
        }
        if self.max_backends == Some(0) {
            return Err(DirectoryError::Config(
                "max_backends must allow at least one backend".to_string(),
            ));
        }
        Ok(())
    }
}

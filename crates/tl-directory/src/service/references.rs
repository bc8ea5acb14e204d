//! # Reference Directory
//!
//! Auxiliary services (history servers and the like) published per scope.
//! Entries may overlap; a trixel lookup returns every entry whose trixel
//! scope contains it, most specific first.

use parking_lot::RwLock;

use super::registry::validate_endpoint;
use crate::domain::{DirectoryError, ReferenceEntry, ReferenceId, ReferenceScope, ServiceKind};

/// Read-mostly list of reference entries.
#[derive(Debug, Default)]
pub struct ReferenceDirectory {
    entries: RwLock<Vec<ReferenceEntry>>,
}

impl ReferenceDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an entry.
    pub fn add(
        &self,
        scope: ReferenceScope,
        service_kind: ServiceKind,
        endpoint: &str,
    ) -> Result<ReferenceId, DirectoryError> {
        let endpoint = validate_endpoint(endpoint)?;
        let id = ReferenceId::generate();
        self.entries.write().push(ReferenceEntry {
            id,
            scope,
            service_kind,
            endpoint,
        });
        Ok(id)
    }

    /// Withdraw an entry.
    pub fn remove(&self, id: ReferenceId) -> Result<ReferenceEntry, DirectoryError> {
        let mut entries = self.entries.write();
        let index = entries
            .iter()
            .position(|e| e.id == id)
            .ok_or(DirectoryError::UnknownReference(id))?;
        Ok(entries.remove(index))
    }

    /// Entries applicable to `scope`.
    pub fn lookup(&self, scope: ReferenceScope) -> Vec<ReferenceEntry> {
        let entries = self.entries.read();
        match scope {
            ReferenceScope::Trixel(trixel) => {
                let mut matches: Vec<ReferenceEntry> = entries
                    .iter()
                    .filter(|e| matches!(e.scope, ReferenceScope::Trixel(s) if s.contains(trixel)))
                    .cloned()
                    .collect();
                // Stable sort keeps insertion order among equal depths.
                matches.sort_by_key(|e| match e.scope {
                    ReferenceScope::Trixel(s) => std::cmp::Reverse(s.depth()),
                    ReferenceScope::SensorClass(_) => std::cmp::Reverse(0),
                });
                matches
            }
            ReferenceScope::SensorClass(_) => {
                entries.iter().filter(|e| e.scope == scope).cloned().collect()
            }
        }
    }

    /// All entries in insertion order.
    pub fn list(&self) -> Vec<ReferenceEntry> {
        self.entries.read().clone()
    }
}

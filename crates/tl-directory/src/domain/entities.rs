//! # Domain Entities
//!
//! Assignments, backends and auxiliary directory records.

use serde::{Deserialize, Serialize};

use super::errors::DirectoryError;
use super::trixel::TrixelId;
use super::value_objects::{
    AssignmentState, BackendId, BackendStatus, Generation, MeasurementType, ReferenceId,
    ReferenceScope, ServiceKind, Timestamp, TransportSecurity,
};

/// Delegation of a whole subtree to one backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// Root of the delegated subtree.
    pub subtree_root: TrixelId,
    /// Backend responsible for the subtree.
    pub owner: BackendId,
    /// When the assignment became active.
    pub created_at: Timestamp,
    /// Table generation at activation.
    pub generation: Generation,
    /// Active or superseded.
    pub state: AssignmentState,
}

impl Assignment {
    /// Create an active assignment.
    pub fn new(
        subtree_root: TrixelId,
        owner: BackendId,
        generation: Generation,
        created_at: Timestamp,
    ) -> Self {
        Self {
            subtree_root,
            owner,
            created_at,
            generation,
            state: AssignmentState::Active,
        }
    }

    /// Whether the record is part of the current partition.
    pub fn is_active(&self) -> bool {
        self.state == AssignmentState::Active
    }

    /// Copy of this record marked superseded at `at`.
    pub fn superseded(mut self, at: Timestamp) -> Self {
        self.state = AssignmentState::Superseded { at };
        self
    }
}

/// A registered Trixel Management Server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Backend {
    /// Directory-assigned id.
    pub id: BackendId,
    /// Host (and optional port/path) without scheme.
    pub endpoint: String,
    /// Announced transport posture.
    pub transport_security: TransportSecurity,
    /// Load the backend is comfortable with.
    pub capacity_hint: u32,
    /// Last reported load.
    pub current_load: u32,
    /// Lifecycle status.
    pub status: BackendStatus,
    /// Registration time.
    pub registered_at: Timestamp,
    /// Time of the last heartbeat.
    pub last_heartbeat: Timestamp,
    /// Set while the backend is unreachable.
    pub unreachable_since: Option<Timestamp>,
    /// Consecutive heartbeat intervals without a report.
    #[serde(default)]
    pub missed_heartbeats: u32,
    /// Consecutive heartbeats reporting load below the low-water mark.
    #[serde(default)]
    pub low_load_streak: u32,
    /// A growth split already moved territory off this backend since its
    /// last heartbeat. Volatile.
    #[serde(skip)]
    pub shed_since_heartbeat: bool,
}

impl Backend {
    /// Create a freshly registered, active backend.
    pub fn new(
        id: BackendId,
        endpoint: impl Into<String>,
        transport_security: TransportSecurity,
        capacity_hint: u32,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            endpoint: endpoint.into(),
            transport_security,
            capacity_hint,
            current_load: 0,
            status: BackendStatus::Active,
            registered_at: now,
            last_heartbeat: now,
            unreachable_since: None,
            missed_heartbeats: 0,
            low_load_streak: 0,
            shed_since_heartbeat: false,
        }
    }

    /// Load as a fraction of the capacity hint.
    pub fn load_ratio(&self) -> f64 {
        if self.capacity_hint == 0 {
            return f64::INFINITY;
        }
        f64::from(self.current_load) / f64::from(self.capacity_hint)
    }

    /// Whether the backend can take more load.
    pub fn has_headroom(&self) -> bool {
        self.current_load < self.capacity_hint
    }

    /// Whether the backend accepts delegations.
    pub fn is_active(&self) -> bool {
        self.status == BackendStatus::Active
    }

    /// Change status, rejecting disallowed transitions.
    pub fn transition_to(&mut self, next: BackendStatus, now: Timestamp) -> Result<(), DirectoryError> {
        if !self.status.can_transition_to(next) {
            return Err(DirectoryError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.unreachable_since = match next {
            BackendStatus::Unreachable => Some(self.unreachable_since.unwrap_or(now)),
            BackendStatus::Active => None,
            BackendStatus::Draining => self.unreachable_since,
        };
        self.status = next;
        Ok(())
    }

    /// URL a client uses to reach the backend.
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.transport_security.scheme(), self.endpoint)
    }
}

/// Auxiliary service entry keyed by scope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    /// Entry id.
    pub id: ReferenceId,
    /// Where the entry applies.
    pub scope: ReferenceScope,
    /// Kind of auxiliary service.
    pub service_kind: ServiceKind,
    /// Service address.
    pub endpoint: String,
}

/// Number of sensors of one type a backend reports inside a trixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorCount {
    /// Counted trixel.
    pub trixel: TrixelId,
    /// Sensor type.
    pub measurement: MeasurementType,
    /// Number of sensors.
    pub sensor_count: u32,
    /// Owner at the time of the report.
    pub reported_by: BackendId,
    /// Time of the report.
    pub updated_at: Timestamp,
}

/// Atomic set of assignment changes.
///
/// Every record in `superseded` leaves the active set and every record in
/// `activated` enters it, together or not at all.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableChange {
    /// Previously active records, already marked superseded.
    pub superseded: Vec<Assignment>,
    /// New active records.
    pub activated: Vec<Assignment>,
}

impl TableChange {
    /// Whether the change does nothing.
    pub fn is_empty(&self) -> bool {
        self.superseded.is_empty() && self.activated.is_empty()
    }
}

//! # Domain Value Objects
//!
//! Immutable value types for the trixel directory.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::trixel::TrixelId;

/// Identifier of a registered Trixel Management Server.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct BackendId(pub u32);

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tms-{}", self.0)
    }
}

/// Table-wide version counter stamped on assignments at activation.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Generation(pub u64);

impl Generation {
    /// The generation following this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Seconds since the Unix epoch.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a timestamp from seconds.
    pub const fn new(secs: u64) -> Self {
        Self(secs)
    }

    /// Seconds since the epoch.
    pub const fn as_secs(&self) -> u64 {
        self.0
    }

    /// Seconds elapsed since `earlier`, zero if `earlier` is in the future.
    pub fn secs_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

/// Transport posture announced by a backend at registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportSecurity {
    /// Unencrypted HTTP.
    Plain,
    /// TLS-protected HTTPS.
    Encrypted,
}

impl TransportSecurity {
    /// URL scheme used to reach the backend.
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Plain => "http",
            Self::Encrypted => "https",
        }
    }
}

/// Backend lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendStatus {
    /// Accepting delegations.
    #[default]
    Active,
    /// Shedding its territory before removal.
    Draining,
    /// Missed too many heartbeats.
    Unreachable,
}

impl BackendStatus {
    /// Check if transition to next status is valid.
    pub fn can_transition_to(&self, next: BackendStatus) -> bool {
        match (self, next) {
            (Self::Active, Self::Draining) => true,
            (Self::Active, Self::Unreachable) => true,
            (Self::Unreachable, Self::Active) => true, // Heartbeat resumed
            (Self::Unreachable, Self::Draining) => true,
            (Self::Draining, Self::Draining) => true, // Repeated deregistration
            _ => false,
        }
    }
}

impl fmt::Display for BackendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Active => "active",
            Self::Draining => "draining",
            Self::Unreachable => "unreachable",
        };
        f.write_str(name)
    }
}

/// Lifecycle of an assignment record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentState {
    /// Currently part of the partition.
    #[default]
    Active,
    /// Replaced by a later re-partition, kept for audit.
    Superseded {
        /// When it was replaced.
        at: Timestamp,
    },
}

/// Measurement types reported by stations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementType {
    /// Ambient air temperature.
    AmbientTemperature,
    /// Relative humidity.
    RelativeHumidity,
}

impl MeasurementType {
    /// All supported types.
    pub const ALL: [MeasurementType; 2] = [Self::AmbientTemperature, Self::RelativeHumidity];

    /// Wire name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AmbientTemperature => "ambient_temperature",
            Self::RelativeHumidity => "relative_humidity",
        }
    }
}

impl fmt::Display for MeasurementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeasurementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown measurement type: {s}"))
    }
}

/// Kind of auxiliary service in the reference directory.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    /// Trixel History Server.
    HistoryServer,
    /// Any other named auxiliary service.
    Custom(String),
}

/// Scope a reference entry applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceScope {
    /// A trixel and everything below it.
    Trixel(TrixelId),
    /// Every trixel, for one sensor class.
    SensorClass(MeasurementType),
}

/// Identifier of a reference entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceId(pub Uuid);

impl ReferenceId {
    /// Generate a fresh id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Limit/offset window for listings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    /// Maximum number of results.
    pub limit: usize,
    /// Results to skip.
    pub offset: usize,
}

impl Page {
    /// Create a page window.
    pub fn new(limit: usize, offset: usize) -> Self {
        Self { limit, offset }
    }

    /// Apply the window to an iterator.
    pub fn apply<I: IntoIterator>(&self, items: I) -> Vec<I::Item> {
        items.into_iter().skip(self.offset).take(self.limit).collect()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 100,
            offset: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_status_transitions() {
        assert!(BackendStatus::Active.can_transition_to(BackendStatus::Draining));
        assert!(BackendStatus::Active.can_transition_to(BackendStatus::Unreachable));
        assert!(BackendStatus::Unreachable.can_transition_to(BackendStatus::Active));
        assert!(BackendStatus::Unreachable.can_transition_to(BackendStatus::Draining));
    }

    #[test]
    fn test_draining_is_one_way() {
        assert!(!BackendStatus::Draining.can_transition_to(BackendStatus::Active));
        assert!(!BackendStatus::Draining.can_transition_to(BackendStatus::Unreachable));
    }

    #[test]
    fn test_timestamp_secs_since_saturates() {
        let earlier = Timestamp::new(100);
        let later = Timestamp::new(160);
        assert_eq!(later.secs_since(earlier), 60);
        assert_eq!(earlier.secs_since(later), 0);
    }

    #[test]
    fn test_measurement_type_round_trips_names() {
        for t in MeasurementType::ALL {
            assert_eq!(t.as_str().parse::<MeasurementType>().unwrap(), t);
        }
        assert!("pressure".parse::<MeasurementType>().is_err());
    }

    #[test]
    fn test_transport_scheme() {
        assert_eq!(TransportSecurity::Plain.scheme(), "http");
        assert_eq!(TransportSecurity::Encrypted.scheme(), "https");
    }

    #[test]
    fn test_page_window() {
        let page = Page::new(2, 1);
        assert_eq!(page.apply(vec![1, 2, 3, 4]), vec![2, 3]);
        assert_eq!(Page::default().limit, 100);
    }

    #[test]
    fn test_generation_next() {
        assert_eq!(Generation(4).next(), Generation(5));
    }
}

//! # Domain Errors
//!
//! Error types for the trixel directory.
//!
//! Every table, registry and planner operation returns one of these
//! explicitly. [`DirectoryError::kind`] lets a transport layer tell a
//! malformed request apart from a region that is not currently resolvable.

use thiserror::Error;

use super::trixel::TrixelId;
use super::value_objects::{BackendId, Generation, ReferenceId};

/// Directory error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    /// Integer is not a valid HTM trixel identifier.
    #[error("Invalid trixel id: {0}")]
    InvalidTrixelId(u64),

    /// String is not a valid HTM trixel name.
    #[error("Invalid trixel name: {0:?}")]
    InvalidTrixelName(String),

    /// Latitude/longitude pair cannot be located on the sphere.
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),

    /// Base partitions have no parent.
    #[error("Root trixel {0} has no parent")]
    RootHasNoParent(TrixelId),

    /// Trixel is already at the deepest supported level.
    #[error("Trixel {0} is at the maximum depth")]
    MaxDepthExceeded(TrixelId),

    /// Mutation would break the partition invariant.
    #[error("Subtree {subtree_root} overlaps active assignment {conflicting}")]
    OverlapConflict {
        /// Subtree root of the rejected mutation.
        subtree_root: TrixelId,
        /// Active subtree root it collides with.
        conflicting: TrixelId,
    },

    /// Split target is not a child of the split subtree.
    #[error("{child} is not a child of {parent}")]
    InvalidSplit {
        /// Subtree being split.
        parent: TrixelId,
        /// Offending key of the owner mapping.
        child: TrixelId,
    },

    /// No active assignment covers the trixel.
    #[error("Trixel {0} is not covered by any assignment")]
    Unpartitioned(TrixelId),

    /// Plain transport registration while insecure transport is disabled.
    #[error("Insecure transport rejected for endpoint {0}")]
    InsecureTransportRejected(String),

    /// No active backend with spare capacity is available.
    #[error("No eligible backend available")]
    NoEligibleBackend,

    /// Cached lookup no longer matches the table.
    #[error("Stale generation for {trixel}: cached {cached}, current {current}")]
    StaleGeneration {
        /// Trixel the cached lookup was made for.
        trixel: TrixelId,
        /// Generation held by the caller.
        cached: Generation,
        /// Generation currently in the table.
        current: Generation,
    },

    /// Backend id is not registered.
    #[error("Unknown backend: {0}")]
    UnknownBackend(BackendId),

    /// Backend endpoint is empty or malformed.
    #[error("Invalid endpoint: {0:?}")]
    InvalidEndpoint(String),

    /// Backend announced a capacity that cannot hold any load.
    #[error("Invalid capacity hint: {0}")]
    InvalidCapacity(u32),

    /// Registration would exceed the configured backend limit.
    #[error("Maximum number of backends reached: {0}")]
    BackendLimitReached(usize),

    /// Backend status change is not allowed.
    #[error("Invalid backend transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status
        from: String,
        /// Attempted status
        to: String,
    },

    /// Backend reported data for a trixel it does not own.
    #[error("Backend {backend} does not own trixel {trixel}")]
    NotOwner {
        /// Reporting backend
        backend: BackendId,
        /// Trixel outside its territory
        trixel: TrixelId,
    },

    /// Reference entry id is not known.
    #[error("Unknown reference entry: {0}")]
    UnknownReference(ReferenceId),

    /// Directory configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Persistence collaborator failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Coarse classification of [`DirectoryError`] for callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller sent something that can never succeed.
    Malformed,
    /// Request is well formed but cannot be answered right now.
    Unresolvable,
    /// Mutation conflicts with current table or registry state.
    Conflict,
    /// Rejected by deployment policy.
    Rejected,
    /// Referenced object does not exist.
    NotFound,
    /// Internal consistency or collaborator fault.
    Internal,
}

impl DirectoryError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidTrixelId(_)
            | Self::InvalidTrixelName(_)
            | Self::InvalidCoordinates(_)
            | Self::RootHasNoParent(_)
            | Self::MaxDepthExceeded(_)
            | Self::InvalidSplit { .. }
            | Self::InvalidEndpoint(_)
            | Self::InvalidCapacity(_) => ErrorKind::Malformed,
            Self::NoEligibleBackend | Self::StaleGeneration { .. } => ErrorKind::Unresolvable,
            Self::OverlapConflict { .. }
            | Self::InvalidTransition { .. }
            | Self::BackendLimitReached(_) => ErrorKind::Conflict,
            Self::InsecureTransportRejected(_) | Self::NotOwner { .. } => ErrorKind::Rejected,
            Self::UnknownBackend(_) | Self::UnknownReference(_) => ErrorKind::NotFound,
            Self::Unpartitioned(_) | Self::Config(_) | Self::Store(_) => ErrorKind::Internal,
        }
    }

    /// Whether retrying later (after a heartbeat or registration) may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NoEligibleBackend | Self::StaleGeneration { .. } | Self::Store(_)
        )
    }
}

/// Persistence errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("I/O error at {path}: {message}")]
    Io {
        /// File involved
        path: String,
        /// Underlying error message
        message: String,
    },

    /// Snapshot could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Store refused the write.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

//! # Backend Selection
//!
//! Eligibility and ranking of backends as delegation targets.

use crate::domain::{Backend, BackendId, TransportSecurity};

/// Whether `backend` may receive new territory.
///
/// Eligible means active, on an acceptable transport and below its
/// capacity hint.
pub fn is_eligible(backend: &Backend, allow_insecure: bool) -> bool {
    let transport_ok = match backend.transport_security {
        TransportSecurity::Encrypted => true,
        TransportSecurity::Plain => allow_insecure,
    };
    backend.is_active() && transport_ok && backend.has_headroom()
}

/// Eligible backends ordered by lowest load, then lowest id.
pub fn rank_eligible<'a>(
    backends: &'a [Backend],
    allow_insecure: bool,
    exclude: Option<BackendId>,
) -> Vec<&'a Backend> {
    let mut ranked: Vec<&Backend> = backends
        .iter()
        .filter(|b| Some(b.id) != exclude && is_eligible(b, allow_insecure))
        .collect();
    ranked.sort_by_key(|b| (b.current_load, b.id));
    ranked
}

/// Least loaded eligible backend.
pub fn least_loaded(
    backends: &[Backend],
    allow_insecure: bool,
    exclude: Option<BackendId>,
) -> Option<&Backend> {
    rank_eligible(backends, allow_insecure, exclude)
        .into_iter()
        .next()
}

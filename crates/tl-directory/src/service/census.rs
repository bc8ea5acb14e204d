//! Sensor counts reported by trixel owners.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::RwLock;

use crate::domain::{MeasurementType, Page, SensorCount, TrixelId};

/// Per-trixel, per-type sensor counts.
#[derive(Debug, Default)]
pub struct SensorCensus {
    counts: RwLock<BTreeMap<(TrixelId, MeasurementType), SensorCount>>,
}

impl SensorCensus {
    /// Create an empty census.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store reports, replacing earlier counts for the same key.
    pub fn record(&self, reports: impl IntoIterator<Item = SensorCount>) {
        let mut counts = self.counts.write();
        for report in reports {
            counts.insert((report.trixel, report.measurement), report);
        }
    }

    /// Counts for one trixel, restricted to `types` (all if empty).
    pub fn counts(&self, trixel: TrixelId, types: &[MeasurementType]) -> Vec<SensorCount> {
        self.counts
            .read()
            .range((trixel, MeasurementType::ALL[0])..=(trixel, MeasurementType::ALL[1]))
            .map(|(_, c)| *c)
            .filter(|c| types.is_empty() || types.contains(&c.measurement))
            .collect()
    }

    /// Trixels with sensors, optionally below `region`.
    pub fn trixels_with_sensors(
        &self,
        region: Option<TrixelId>,
        types: &[MeasurementType],
        page: Page,
    ) -> Vec<TrixelId> {
        let trixels: BTreeSet<TrixelId> = self
            .counts
            .read()
            .values()
            .filter(|c| c.sensor_count > 0)
            .filter(|c| types.is_empty() || types.contains(&c.measurement))
            .filter(|c| region.map_or(true, |r| r.contains(c.trixel)))
            .map(|c| c.trixel)
            .collect();
        page.apply(trixels)
    }
}

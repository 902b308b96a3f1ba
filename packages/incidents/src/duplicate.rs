//! Per-reporter cooldown check.
//!
//! A reporter may not re-report the same incident type near the same spot
//! until the cooldown has elapsed, so one person cannot inflate a cluster.
//!
//! Only the most recent `scan_window` reports are inspected. If more than
//! that many unrelated reports arrive within one cooldown, an earlier
//! report from the same reporter falls out of view and the repeat is
//! accepted. This keeps each check bounded regardless of ledger size.

use bridge_aid_incident_models::{Coordinates, IncidentType, Report};
use bridge_aid_spatial::is_nearby;
use chrono::{DateTime, Utc};

use crate::IncidentConfig;

/// Cooldown + proximity duplicate detector.
#[derive(Debug, Clone)]
pub struct DuplicateGuard {
    cooldown: chrono::Duration,
    proximity_m: f64,
    scan_window: usize,
}

impl DuplicateGuard {
    /// Creates a guard from the cooldown, proximity and scan window in
    /// `config`.
    #[must_use]
    pub fn new(config: &IncidentConfig) -> Self {
        Self {
            cooldown: config.cooldown(),
            proximity_m: config.proximity_threshold_m,
            scan_window: config.duplicate_scan_window,
        }
    }

    /// Returns `true` if `reports` (oldest first) already holds a report
    /// from `reporter_id` of `incident_type`, captured within the cooldown
    /// before `now`, near `coordinates`.
    #[must_use]
    pub fn is_duplicate(
        &self,
        reports: &[Report],
        reporter_id: &str,
        incident_type: IncidentType,
        coordinates: Coordinates,
        now: DateTime<Utc>,
    ) -> bool {
        let cutoff = now - self.cooldown;

        reports
            .iter()
            .rev()
            .take(self.scan_window)
            .any(|r| {
                r.reporter_id == reporter_id
                    && r.incident_type == incident_type
                    && r.timestamp >= cutoff
                    && is_nearby(coordinates, r.coordinates, self.proximity_m)
            })
    }
}

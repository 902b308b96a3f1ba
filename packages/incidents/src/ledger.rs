//! Append-only store of raw reports.
//!
//! Reports are immutable once appended. Ids are the 1-based ledger
//! position and timestamps never decrease in append order, even if the
//! clock steps backwards.

use std::collections::BTreeSet;
use std::sync::{PoisonError, RwLock};

use bridge_aid_incident_models::{Coordinates, IncidentType, NewReport, Report, ReportId};
use bridge_aid_spatial::is_nearby;
use chrono::{DateTime, Utc};

use crate::duplicate::DuplicateGuard;

/// Reports of one type around one location.
#[derive(Debug, Clone, Default)]
pub struct Cluster {
    /// Distinct reporters among `reports`.
    pub reporter_ids: BTreeSet<String>,
    /// Every matching report, oldest first.
    pub reports: Vec<Report>,
}

/// The duplicate guard rejected an append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejected;

/// Concurrency-safe report ledger.
#[derive(Debug, Default)]
pub struct ReportLedger {
    reports: RwLock<Vec<Report>>,
}

impl ReportLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `report`, assigning its id and timestamp.
    pub fn append(&self, report: NewReport, now: DateTime<Utc>) -> Report {
        let mut reports = self.reports.write().unwrap_or_else(PoisonError::into_inner);
        push(&mut reports, report, now)
    }

    /// Appends `report` unless `guard` flags it as a duplicate. The check
    /// and the append happen under one lock, so concurrent repeats from
    /// the same reporter cannot both get in.
    ///
    /// # Errors
    ///
    /// Returns [`Rejected`] if the report is a duplicate; the ledger is
    /// left unchanged.
    pub fn append_unless_duplicate(
        &self,
        report: NewReport,
        now: DateTime<Utc>,
        guard: &DuplicateGuard,
    ) -> Result<Report, Rejected> {
        let mut reports = self.reports.write().unwrap_or_else(PoisonError::into_inner);

        if guard.is_duplicate(
            &reports,
            &report.reporter_id,
            report.incident_type,
            report.coordinates,
            now,
        ) {
            return Err(Rejected);
        }

        Ok(push(&mut reports, report, now))
    }

    /// Read-only duplicate check against the current ledger.
    #[must_use]
    pub fn is_duplicate(
        &self,
        guard: &DuplicateGuard,
        reporter_id: &str,
        incident_type: IncidentType,
        coordinates: Coordinates,
        now: DateTime<Utc>,
    ) -> bool {
        let reports = self.reports.read().unwrap_or_else(PoisonError::into_inner);
        guard.is_duplicate(&reports, reporter_id, incident_type, coordinates, now)
    }

    /// Collects every report of `incident_type` within `proximity_m` of
    /// `coordinates`. Full scan.
    #[must_use]
    pub fn cluster_for(
        &self,
        incident_type: IncidentType,
        coordinates: Coordinates,
        proximity_m: f64,
    ) -> Cluster {
        let reports = self.reports.read().unwrap_or_else(PoisonError::into_inner);

        let matches: Vec<Report> = reports
            .iter()
            .filter(|r| {
                r.incident_type == incident_type
                    && is_nearby(coordinates, r.coordinates, proximity_m)
            })
            .cloned()
            .collect();

        Cluster {
            reporter_ids: matches.iter().map(|r| r.reporter_id.clone()).collect(),
            reports: matches,
        }
    }

    /// Number of reports appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reports
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no report has been appended yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every report, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Report> {
        self.reports
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn push(reports: &mut Vec<Report>, report: NewReport, now: DateTime<Utc>) -> Report {
    let timestamp = reports
        .last()
        .map_or(now, |last| last.timestamp.max(now));

    let stored = Report {
        id: ReportId(reports.len() as u64 + 1),
        incident_type: report.incident_type,
        reporter_id: report.reporter_id,
        coordinates: report.coordinates,
        resolved_address: report.resolved_address,
        timestamp,
    };
    reports.push(stored.clone());
    stored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IncidentConfig;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn new_report(reporter: &str, ty: IncidentType, lat: f64, lng: f64) -> NewReport {
        NewReport {
            incident_type: ty,
            reporter_id: reporter.to_string(),
            coordinates: Coordinates::new(lat, lng).unwrap(),
            resolved_address: "somewhere".to_string(),
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn assigns_sequential_ids() {
        let ledger = ReportLedger::new();
        let a = ledger.append(new_report("a", IncidentType::Flooding, 1.0, 1.0), t0());
        let b = ledger.append(new_report("b", IncidentType::Flooding, 1.0, 1.0), t0());
        assert_eq!(a.id.to_string(), "rep-1");
        assert_eq!(b.id.to_string(), "rep-2");
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn timestamps_never_go_backwards() {
        let ledger = ReportLedger::new();
        ledger.append(new_report("a", IncidentType::Flooding, 1.0, 1.0), t0());
        let earlier = t0() - chrono::Duration::seconds(30);
        let b = ledger.append(new_report("b", IncidentType::Flooding, 1.0, 1.0), earlier);
        assert_eq!(b.timestamp, t0());
    }

    #[test]
    fn duplicate_append_leaves_ledger_unchanged() {
        let guard = DuplicateGuard::new(&IncidentConfig::default());
        let ledger = ReportLedger::new();

        ledger
            .append_unless_duplicate(new_report("a", IncidentType::GasLeak, 1.0, 1.0), t0(), &guard)
            .unwrap();
        let again = ledger.append_unless_duplicate(
            new_report("a", IncidentType::GasLeak, 1.0, 1.0),
            t0() + chrono::Duration::minutes(1),
            &guard,
        );

        assert_eq!(again, Err(Rejected));
        assert_eq!(ledger.len(), 1);
        assert!(ledger.is_duplicate(
            &guard,
            "a",
            IncidentType::GasLeak,
            Coordinates::new(1.0, 1.0).unwrap(),
            t0()
        ));
    }

    #[test]
    fn cluster_collects_distinct_reporters_of_same_type() {
        let ledger = ReportLedger::new();
        ledger.append(new_report("a", IncidentType::Wildfire, 43.5183, -79.8774), t0());
        ledger.append(new_report("a", IncidentType::Wildfire, 43.5184, -79.8774), t0());
        ledger.append(new_report("b", IncidentType::Wildfire, 43.5185, -79.8775), t0());
        ledger.append(new_report("c", IncidentType::Flooding, 43.5183, -79.8774), t0());
        ledger.append(new_report("d", IncidentType::Wildfire, 43.6183, -79.8774), t0());

        let here = Coordinates::new(43.5183, -79.8774).unwrap();
        let cluster = ledger.cluster_for(IncidentType::Wildfire, here, 200.0);

        assert_eq!(cluster.reports.len(), 3);
        assert_eq!(
            cluster.reporter_ids.into_iter().collect::<Vec<_>>(),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn concurrent_repeats_accept_exactly_one() {
        let guard = Arc::new(DuplicateGuard::new(&IncidentConfig::default()));
        let ledger = Arc::new(ReportLedger::new());
        let barrier = Arc::new(std::sync::Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                let guard = Arc::clone(&guard);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    ledger
                        .append_unless_duplicate(
                            new_report("alice", IncidentType::GasLeak, 43.5183, -79.8774),
                            t0(),
                            &guard,
                        )
                        .is_ok()
                })
            })
            .collect();

        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&ok| ok)
            .count();

        assert_eq!(accepted, 1);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn concurrent_appends_lose_nothing() {
        let ledger = Arc::new(ReportLedger::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        ledger.append(
                            new_report(&format!("r{t}-{i}"), IncidentType::StormDamage, 1.0, 1.0),
                            t0(),
                        );
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let reports = ledger.snapshot();
        assert_eq!(reports.len(), 400);
        for (i, report) in reports.iter().enumerate() {
            assert_eq!(report.id, ReportId(i as u64 + 1));
        }
    }
}

//! Promotes corroborated report clusters into confirmed incidents.
//!
//! After every accepted report, the reports of the same type around it
//! are gathered. Once they come from at least `confirmation_threshold`
//! distinct reporters, they are merged into the first existing confirmed
//! incident of that type whose anchor is in range, or a new incident is
//! anchored at the triggering report.
//!
//! When merging, only reporters whose contributing reports lie within the
//! proximity threshold of the existing anchor are added, so an incident
//! never absorbs reporters from outside its own radius.

use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

use bridge_aid_incident_models::{ConfirmedIncident, Coordinates, IncidentType, Report};
use bridge_aid_spatial::is_nearby;
use chrono::{DateTime, Utc};

use crate::IncidentConfig;
use crate::ledger::{Cluster, ReportLedger};

/// What [`ClusterEngine::upsert_confirmed`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationKind {
    /// A new incident was created.
    Created,
    /// Reporters were merged into an existing incident.
    Merged,
}

/// Result of confirming a cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct Confirmation {
    /// Created or merged.
    pub kind: ConfirmationKind,
    /// The incident after the change.
    pub incident: ConfirmedIncident,
}

/// Owner of the confirmed-incident set.
#[derive(Debug)]
pub struct ClusterEngine {
    confirmed: Mutex<Vec<ConfirmedIncident>>,
    proximity_m: f64,
    confirmation_threshold: usize,
}

impl ClusterEngine {
    /// Creates an engine with no confirmed incidents.
    #[must_use]
    pub const fn new(config: &IncidentConfig) -> Self {
        Self {
            confirmed: Mutex::new(Vec::new()),
            proximity_m: config.proximity_threshold_m,
            confirmation_threshold: config.confirmation_threshold,
        }
    }

    /// Re-evaluates the cluster around a freshly appended `report`.
    ///
    /// Returns `None` while the cluster is below the confirmation
    /// threshold; the report simply stays in the ledger.
    pub fn evaluate(
        &self,
        ledger: &ReportLedger,
        report: &Report,
        now: DateTime<Utc>,
    ) -> Option<Confirmation> {
        let cluster = ledger.cluster_for(report.incident_type, report.coordinates, self.proximity_m);

        if cluster.reporter_ids.len() < self.confirmation_threshold {
            log::debug!(
                "{} cluster at {} has {}/{} reporters",
                report.incident_type,
                report.id,
                cluster.reporter_ids.len(),
                self.confirmation_threshold
            );
            return None;
        }

        Some(self.upsert_confirmed(report.incident_type, report.coordinates, &cluster, now))
    }

    /// Merges `cluster` into the first confirmed incident of
    /// `incident_type` anchored within range of `coordinates`, or creates
    /// a new incident anchored at `coordinates`.
    ///
    /// The lookup and the mutation happen under one lock, so concurrent
    /// upserts for the same place cannot both create an incident.
    pub fn upsert_confirmed(
        &self,
        incident_type: IncidentType,
        coordinates: Coordinates,
        cluster: &Cluster,
        now: DateTime<Utc>,
    ) -> Confirmation {
        let mut confirmed = self.confirmed.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = confirmed.iter_mut().find(|c| {
            c.incident_type == incident_type
                && is_nearby(coordinates, c.coordinates, self.proximity_m)
        }) {
            let anchor = existing.coordinates;
            let before = existing.report_count();
            existing.merge_reporters(
                cluster
                    .reports
                    .iter()
                    .filter(|r| is_nearby(r.coordinates, anchor, self.proximity_m))
                    .map(|r| r.reporter_id.clone()),
            );
            if existing.report_count() > before {
                log::info!(
                    "Merged into confirmed incident {} ({} reporters)",
                    existing.incident_id,
                    existing.report_count()
                );
            }
            return Confirmation {
                kind: ConfirmationKind::Merged,
                incident: existing.clone(),
            };
        }

        let reporters: BTreeSet<String> = cluster
            .reports
            .iter()
            .filter(|r| is_nearby(r.coordinates, coordinates, self.proximity_m))
            .map(|r| r.reporter_id.clone())
            .collect();
        let incident = ConfirmedIncident::new(incident_type, coordinates, reporters, now);
        log::info!(
            "Confirmed new incident {} ({} reporters)",
            incident.incident_id,
            incident.report_count()
        );
        confirmed.push(incident.clone());

        Confirmation {
            kind: ConfirmationKind::Created,
            incident,
        }
    }

    /// Copy of the confirmed set, in creation order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ConfirmedIncident> {
        self.confirmed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of confirmed incidents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.confirmed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing has been confirmed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

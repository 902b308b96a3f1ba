//! The operations exposed to callers: submit a report, list confirmed
//! incidents, list incident types.

use std::str::FromStr;
use std::sync::Arc;

use bridge_aid_ai::Verifier;
use bridge_aid_geocoder::GeocodeCache;
use bridge_aid_incident_models::{
    ConfirmedIncident, Coordinates, IncidentType, NewReport, Report, VerificationRecord,
};

use crate::clock::{Clock, SystemClock};
use crate::cluster::{ClusterEngine, Confirmation};
use crate::duplicate::DuplicateGuard;
use crate::ledger::ReportLedger;
use crate::sweep::{SweepSummary, VerificationSweep};
use crate::{IncidentConfig, InputError, SubmitError};

/// An accepted report and the confirmation it triggered, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    /// The report as stored.
    pub report: Report,
    /// Set when the report pushed its cluster over the threshold or merged
    /// into an existing incident.
    pub confirmation: Option<Confirmation>,
}

/// Store sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    /// Reports in the ledger.
    pub reports: usize,
    /// Confirmed incidents.
    pub confirmed: usize,
    /// Verification records.
    pub verified: usize,
}

/// Snapshot returned by [`IncidentService::list_confirmed`].
#[derive(Debug, Clone, PartialEq)]
pub struct IncidentListing {
    /// Confirmed incidents, in creation order.
    pub confirmed: Vec<ConfirmedIncident>,
    /// Verification records, oldest first.
    pub verified: Vec<VerificationRecord>,
    /// Store sizes after the sweep.
    pub totals: Totals,
    /// What the triggering sweep did.
    pub sweep: SweepSummary,
}

/// Where geocoding lookups are biased to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeocodingLocale {
    /// Country code(s) to restrict results to.
    pub region_bias: Option<String>,
    /// Preferred display-name language.
    pub language: String,
}

impl Default for GeocodingLocale {
    fn default() -> Self {
        Self {
            region_bias: None,
            language: "en".to_string(),
        }
    }
}

/// Incident ingestion and confirmation service.
pub struct IncidentService {
    config: IncidentConfig,
    geocoder: GeocodeCache,
    locale: GeocodingLocale,
    guard: DuplicateGuard,
    ledger: ReportLedger,
    clusters: ClusterEngine,
    sweep: VerificationSweep,
    clock: Arc<dyn Clock>,
}

impl IncidentService {
    /// Creates a service with empty stores, the system clock, and the
    /// default geocoding locale.
    #[must_use]
    pub fn new(config: IncidentConfig, geocoder: GeocodeCache, verifier: Arc<dyn Verifier>) -> Self {
        Self {
            guard: DuplicateGuard::new(&config),
            ledger: ReportLedger::new(),
            clusters: ClusterEngine::new(&config),
            sweep: VerificationSweep::new(verifier, &config),
            geocoder,
            locale: GeocodingLocale::default(),
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the geocoding locale.
    #[must_use]
    pub fn with_locale(mut self, locale: GeocodingLocale) -> Self {
        self.locale = locale;
        self
    }

    /// The fixed incident category set.
    #[must_use]
    pub const fn incident_types() -> &'static [IncidentType] {
        IncidentType::all()
    }

    /// Submits a report by free-text address.
    ///
    /// Validation happens in order: incident type, address, reporter; then
    /// the address is geocoded and the duplicate check runs.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Input`] for invalid or unresolvable input and
    /// [`SubmitError::Duplicate`] when the reporter is in cooldown. No state
    /// is changed on error.
    pub async fn submit_report(
        &self,
        reporter_id: &str,
        incident_type: &str,
        address: &str,
    ) -> Result<SubmitOutcome, SubmitError> {
        let incident_type = parse_incident_type(incident_type)?;
        let address = address.trim();
        if address.is_empty() {
            return Err(InputError::EmptyAddress.into());
        }
        let reporter_id = parse_reporter(reporter_id)?;

        let resolved = self
            .geocoder
            .resolve(
                address,
                self.locale.region_bias.as_deref(),
                &self.locale.language,
            )
            .await
            .map_err(InputError::UnresolvableAddress)?;

        self.ingest(NewReport {
            incident_type,
            reporter_id: reporter_id.to_string(),
            coordinates: resolved.coordinates,
            resolved_address: resolved.display_name,
        })
    }

    /// Submits a report at caller-supplied coordinates, skipping
    /// geocoding. `address` is an optional display label.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Input`] for an invalid type, reporter, or
    /// coordinates and [`SubmitError::Duplicate`] when the reporter is in
    /// cooldown.
    pub fn submit_located_report(
        &self,
        reporter_id: &str,
        incident_type: &str,
        latitude: f64,
        longitude: f64,
        address: Option<&str>,
    ) -> Result<SubmitOutcome, SubmitError> {
        let incident_type = parse_incident_type(incident_type)?;
        let reporter_id = parse_reporter(reporter_id)?;
        let coordinates = Coordinates::new(latitude, longitude).map_err(InputError::from)?;

        let resolved_address = address
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map_or_else(|| format!("{latitude}, {longitude}"), ToString::to_string);

        self.ingest(NewReport {
            incident_type,
            reporter_id: reporter_id.to_string(),
            coordinates,
            resolved_address,
        })
    }

    fn ingest(&self, report: NewReport) -> Result<SubmitOutcome, SubmitError> {
        let now = self.clock.now();

        let report = self
            .ledger
            .append_unless_duplicate(report, now, &self.guard)
            .map_err(|_| {
                log::debug!("Rejected duplicate report (cooldown active)");
                SubmitError::Duplicate {
                    cooldown_minutes: self.config.cooldown_minutes,
                }
            })?;

        log::info!(
            "Accepted {} report {} at ({}, {})",
            report.incident_type,
            report.id,
            report.coordinates.latitude(),
            report.coordinates.longitude()
        );

        let confirmation = self.clusters.evaluate(&self.ledger, &report, now);

        Ok(SubmitOutcome {
            report,
            confirmation,
        })
    }

    /// Runs a verification sweep, then returns the confirmed incidents,
    /// verification records and totals.
    pub async fn list_confirmed(&self) -> IncidentListing {
        let sweep = self.run_sweep().await;

        let confirmed = self.clusters.snapshot();
        let verified = self.sweep.records();

        IncidentListing {
            totals: Totals {
                reports: self.ledger.len(),
                confirmed: confirmed.len(),
                verified: verified.len(),
            },
            confirmed,
            verified,
            sweep,
        }
    }

    /// Runs one verification sweep over the current confirmed set.
    pub async fn run_sweep(&self) -> SweepSummary {
        let confirmed = self.clusters.snapshot();
        self.sweep.sweep(&confirmed, self.clock.as_ref()).await
    }

    /// Current store sizes, without sweeping.
    #[must_use]
    pub fn totals(&self) -> Totals {
        Totals {
            reports: self.ledger.len(),
            confirmed: self.clusters.len(),
            verified: self.sweep.len(),
        }
    }
}

fn parse_incident_type(raw: &str) -> Result<IncidentType, InputError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(InputError::MissingIncidentType);
    }
    IncidentType::from_str(raw).map_err(|_| InputError::InvalidIncidentType {
        value: raw.to_string(),
    })
}

fn parse_reporter(raw: &str) -> Result<&str, InputError> {
    let raw = raw.trim();
    if raw.is_empty() {
        Err(InputError::MissingReporter)
    } else {
        Ok(raw)
    }
}

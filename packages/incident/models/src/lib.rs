#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Incident type taxonomy and the core data types shared across
//! bridge-aid.
//!
//! A [`Report`] is one reporter's geolocated claim. Corroborating reports
//! from distinct reporters are promoted into a [`ConfirmedIncident`], and
//! the outcome of the external verification pass is stored as a
//! [`VerificationRecord`].

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Fixed set of disaster incident categories a reporter may choose from.
///
/// Serialized (both JSON and [`Display`](std::fmt::Display)) by its
/// human-readable name, e.g. `"Power Outage"`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum IncidentType {
    /// Loss of grid power
    #[serde(rename = "Power Outage")]
    #[strum(serialize = "Power Outage")]
    PowerOutage,
    /// Standing or rising water
    #[serde(rename = "Flooding")]
    #[strum(serialize = "Flooding")]
    Flooding,
    /// Uncontrolled fire in vegetation
    #[serde(rename = "Wildfire")]
    #[strum(serialize = "Wildfire")]
    Wildfire,
    /// Road impassable
    #[serde(rename = "Road Blocked")]
    #[strum(serialize = "Road Blocked")]
    RoadBlocked,
    /// Structural damage to a bridge
    #[serde(rename = "Bridge Damage")]
    #[strum(serialize = "Bridge Damage")]
    BridgeDamage,
    /// Partial or full building collapse
    #[serde(rename = "Building Collapse")]
    #[strum(serialize = "Building Collapse")]
    BuildingCollapse,
    /// Someone needs urgent medical help
    #[serde(rename = "Medical Emergency")]
    #[strum(serialize = "Medical Emergency")]
    MedicalEmergency,
    /// Suspected gas leak
    #[serde(rename = "Gas Leak")]
    #[strum(serialize = "Gas Leak")]
    GasLeak,
    /// Land or mud slide
    #[serde(rename = "Landslide")]
    #[strum(serialize = "Landslide")]
    Landslide,
    /// Wind, hail, or ice damage
    #[serde(rename = "Storm Damage")]
    #[strum(serialize = "Storm Damage")]
    StormDamage,
    /// Unsafe drinking water
    #[serde(rename = "Water Contamination")]
    #[strum(serialize = "Water Contamination")]
    WaterContamination,
    /// Phone or internet service down
    #[serde(rename = "Communication Outage")]
    #[strum(serialize = "Communication Outage")]
    CommunicationOutage,
}

impl IncidentType {
    /// Returns all variants in display order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::PowerOutage,
            Self::Flooding,
            Self::Wildfire,
            Self::RoadBlocked,
            Self::BridgeDamage,
            Self::BuildingCollapse,
            Self::MedicalEmergency,
            Self::GasLeak,
            Self::Landslide,
            Self::StormDamage,
            Self::WaterContamination,
            Self::CommunicationOutage,
        ]
    }
}

/// Error returned when a latitude/longitude pair is not a valid WGS84
/// position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvalidCoordinatesError {
    /// The rejected latitude.
    pub latitude: f64,
    /// The rejected longitude.
    pub longitude: f64,
}

impl std::fmt::Display for InvalidCoordinatesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid coordinates ({}, {}): expected latitude in [-90, 90] and longitude in [-180, 180]",
            self.latitude, self.longitude
        )
    }
}

impl std::error::Error for InvalidCoordinatesError {}

/// A validated latitude/longitude pair in decimal degrees.
///
/// Construction through [`Coordinates::new`] rejects NaN, infinite and
/// out-of-range values, so every `Coordinates` value is safe to feed into
/// distance computations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    latitude: f64,
    longitude: f64,
}

impl Coordinates {
    /// Creates a coordinate pair.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCoordinatesError`] if either component is not
    /// finite or is outside the WGS84 range.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, InvalidCoordinatesError> {
        if latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude)
        {
            Ok(Self {
                latitude,
                longitude,
            })
        } else {
            Err(InvalidCoordinatesError {
                latitude,
                longitude,
            })
        }
    }

    /// Latitude in decimal degrees.
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in decimal degrees.
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// Identifier assigned to a report when it is appended to the ledger.
///
/// Rendered as `rep-<n>` where `n` is the 1-based ledger position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReportId(pub u64);

impl std::fmt::Display for ReportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rep-{}", self.0)
    }
}

/// One reporter's claim, as stored in the report ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// Ledger-assigned identifier.
    pub id: ReportId,
    /// Reported category.
    pub incident_type: IncidentType,
    /// Opaque identity of the reporter.
    pub reporter_id: String,
    /// Geocoded position.
    pub coordinates: Coordinates,
    /// Display address from geocoding (or the submitted address).
    pub resolved_address: String,
    /// Ingestion time.
    pub timestamp: DateTime<Utc>,
}

/// A report that has not yet been appended to the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    /// Reported category.
    pub incident_type: IncidentType,
    /// Opaque identity of the reporter.
    pub reporter_id: String,
    /// Geocoded position.
    pub coordinates: Coordinates,
    /// Display address from geocoding (or the submitted address).
    pub resolved_address: String,
}

/// A cluster of corroborating reports from distinct reporters.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmedIncident {
    /// Stable bucket key, see [`ConfirmedIncident::derive_id`].
    pub incident_id: String,
    /// Category shared by every contributing report.
    pub incident_type: IncidentType,
    /// Anchor position (the report that first formed the cluster).
    pub coordinates: Coordinates,
    /// Distinct reporters contributing to this incident. Only grows.
    verified_reporter_ids: BTreeSet<String>,
    /// When the cluster first reached the confirmation threshold.
    pub created_at: DateTime<Utc>,
}

impl ConfirmedIncident {
    /// Creates a new confirmed incident anchored at `coordinates`.
    #[must_use]
    pub fn new(
        incident_type: IncidentType,
        coordinates: Coordinates,
        reporter_ids: BTreeSet<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            incident_id: Self::derive_id(incident_type, coordinates),
            incident_type,
            coordinates,
            verified_reporter_ids: reporter_ids,
            created_at,
        }
    }

    /// Derives the incident id from its type and anchor rounded to four
    /// decimal places (~11 m at the equator).
    ///
    /// Clusters that differ only below that precision share an id.
    #[must_use]
    pub fn derive_id(incident_type: IncidentType, coordinates: Coordinates) -> String {
        format!(
            "{incident_type}_{:?}_{:?}",
            round4(coordinates.latitude()),
            round4(coordinates.longitude())
        )
    }

    /// Adds reporters to this incident (set union).
    pub fn merge_reporters<I>(&mut self, reporter_ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.verified_reporter_ids.extend(reporter_ids);
    }

    /// Distinct reporters, in sorted order.
    #[must_use]
    pub const fn verified_reporter_ids(&self) -> &BTreeSet<String> {
        &self.verified_reporter_ids
    }

    /// Number of distinct reporters backing this incident.
    #[must_use]
    pub fn report_count(&self) -> usize {
        self.verified_reporter_ids.len()
    }
}

fn round4(value: f64) -> f64 {
    let rounded = (value * 10_000.0).round() / 10_000.0;
    // Avoid "-0.0" in ids.
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Positive outcome of the external verification pass for one confirmed
/// incident. At most one exists per `incident_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationRecord {
    /// The verified incident.
    pub incident_id: String,
    /// Copied from the incident for display.
    pub incident_type: IncidentType,
    /// Copied from the incident for display.
    pub coordinates: Coordinates,
    /// When the verifier confirmed the incident.
    pub verified_at: DateTime<Utc>,
    /// Short justification from the verifier.
    pub summary: String,
    /// Supporting URLs, in the order the verifier returned them.
    pub sources: Vec<String>,
}

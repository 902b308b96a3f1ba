#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the BridgeAid server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the incident domain types to allow independent evolution of the
//! API contract.

use bridge_aid_incident_models::{ConfirmedIncident, IncidentType, VerificationRecord};
use bridge_aid_incidents::service::{IncidentListing, SubmitOutcome, Totals};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}

/// The incident type enumeration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiIncidentTypes {
    /// Every accepted type, by display name.
    pub types: Vec<IncidentType>,
}

/// Body of `POST /api/incidents/report`.
///
/// Fields are optional so that missing values surface as input errors
/// rather than deserialization failures.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReportRequest {
    /// Incident type display name.
    #[serde(rename = "type")]
    pub incident_type: Option<String>,
    /// Free-text address.
    pub address: Option<String>,
    /// Latitude, when the client already knows its position.
    pub lat: Option<f64>,
    /// Longitude, when the client already knows its position.
    pub lng: Option<f64>,
}

/// A confirmed incident as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfirmedIncident {
    /// Derived incident id.
    pub incident_id: String,
    /// Incident type.
    pub incident: IncidentType,
    /// Anchor latitude.
    pub lat: f64,
    /// Anchor longitude.
    pub lng: f64,
    /// Distinct corroborating reporters.
    pub report_count: usize,
    /// The corroborating reporters, sorted.
    pub verified_users: Vec<String>,
    /// When the incident was first confirmed.
    pub timestamp: DateTime<Utc>,
}

impl From<&ConfirmedIncident> for ApiConfirmedIncident {
    fn from(incident: &ConfirmedIncident) -> Self {
        Self {
            incident_id: incident.incident_id.clone(),
            incident: incident.incident_type,
            lat: incident.coordinates.latitude(),
            lng: incident.coordinates.longitude(),
            report_count: incident.report_count(),
            verified_users: incident.verified_reporter_ids().iter().cloned().collect(),
            timestamp: incident.created_at,
        }
    }
}

/// An externally verified incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiVerificationRecord {
    /// The verified incident.
    pub incident_id: String,
    /// Incident type.
    pub incident: IncidentType,
    /// Anchor latitude.
    pub lat: f64,
    /// Anchor longitude.
    pub lng: f64,
    /// When verification succeeded.
    pub verified_at: DateTime<Utc>,
    /// Verifier justification.
    pub summary: String,
    /// Supporting URLs.
    pub sources: Vec<String>,
}

impl From<&VerificationRecord> for ApiVerificationRecord {
    fn from(record: &VerificationRecord) -> Self {
        Self {
            incident_id: record.incident_id.clone(),
            incident: record.incident_type,
            lat: record.coordinates.latitude(),
            lng: record.coordinates.longitude(),
            verified_at: record.verified_at,
            summary: record.summary.clone(),
            sources: record.sources.clone(),
        }
    }
}

/// Store sizes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTotals {
    /// Reports accepted.
    pub reports: usize,
    /// Confirmed incidents.
    pub confirmed: usize,
    /// Verification records.
    pub verified: usize,
}

impl From<Totals> for ApiTotals {
    fn from(totals: Totals) -> Self {
        Self {
            reports: totals.reports,
            confirmed: totals.confirmed,
            verified: totals.verified,
        }
    }
}

/// Response of `GET /api/incidents`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiIncidentListing {
    /// Confirmed incidents, in creation order.
    pub confirmed: Vec<ApiConfirmedIncident>,
    /// Verification records, oldest first.
    pub verified: Vec<ApiVerificationRecord>,
    /// Store sizes.
    pub totals: ApiTotals,
}

impl From<IncidentListing> for ApiIncidentListing {
    fn from(listing: IncidentListing) -> Self {
        Self {
            confirmed: listing.confirmed.iter().map(Into::into).collect(),
            verified: listing.verified.iter().map(Into::into).collect(),
            totals: listing.totals.into(),
        }
    }
}

/// Response of an accepted `POST /api/incidents/report`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSubmitResponse {
    /// Human-readable outcome.
    pub message: String,
    /// Assigned report id (`rep-<n>`).
    pub report_id: String,
    /// Resolved latitude.
    pub lat: f64,
    /// Resolved longitude.
    pub lng: f64,
    /// Resolved address.
    pub address: String,
    /// Whether this report created or merged into a confirmed incident.
    pub confirmed: bool,
    /// The confirmed incident after the change, if any.
    pub confirmed_entry: Option<ApiConfirmedIncident>,
}

impl From<SubmitOutcome> for ApiSubmitResponse {
    fn from(outcome: SubmitOutcome) -> Self {
        let confirmed_entry = outcome
            .confirmation
            .as_ref()
            .map(|c| ApiConfirmedIncident::from(&c.incident));
        let message = if confirmed_entry.is_some() {
            "Report received; incident confirmed"
        } else {
            "Report received"
        };

        Self {
            message: message.to_string(),
            report_id: outcome.report.id.to_string(),
            lat: outcome.report.coordinates.latitude(),
            lng: outcome.report.coordinates.longitude(),
            address: outcome.report.resolved_address,
            confirmed: confirmed_entry.is_some(),
            confirmed_entry,
        }
    }
}

/// Error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// What went wrong.
    pub error: String,
}

impl ApiError {
    /// Creates an error body from any displayable message.
    pub fn new(message: impl std::fmt::Display) -> Self {
        Self {
            error: message.to_string(),
        }
    }
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Disaster report ingestion and incident confirmation.
//!
//! A report flows through:
//!
//! 1. **Geocoding** via [`bridge_aid_geocoder::GeocodeCache`].
//! 2. **Duplicate suppression** ([`duplicate::DuplicateGuard`]) against
//!    the [`ledger::ReportLedger`], atomically with the append.
//! 3. **Clustering** ([`cluster::ClusterEngine`]): once enough distinct
//!    reporters corroborate a type/location, the cluster is merged into or
//!    creates a confirmed incident.
//!
//! Independently, [`sweep::VerificationSweep`] escalates recently confirmed
//! incidents to an external verifier. [`service::IncidentService`] ties the
//! pieces together behind the operations exposed to callers.
//!
//! All state is in memory and lost on restart.

pub mod clock;
pub mod cluster;
pub mod config;
pub mod duplicate;
pub mod ledger;
pub mod service;
pub mod sweep;

use bridge_aid_geocoder::ResolveError;
use bridge_aid_incident_models::InvalidCoordinatesError;
use thiserror::Error;

pub use config::IncidentConfig;
pub use service::IncidentService;

/// A submission the caller must fix before retrying.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    /// No incident type given.
    #[error("type is required")]
    MissingIncidentType,

    /// Incident type is not one of the enumerated categories.
    #[error("invalid type: {value}")]
    InvalidIncidentType {
        /// The rejected value.
        value: String,
    },

    /// No address given.
    #[error("address is required")]
    EmptyAddress,

    /// No reporter identity supplied.
    #[error("reporter identity is required")]
    MissingReporter,

    /// The address could not be geocoded.
    #[error("could not geocode address")]
    UnresolvableAddress(#[source] ResolveError),

    /// Caller-supplied coordinates are not a valid position.
    #[error(transparent)]
    MalformedCoordinates(#[from] InvalidCoordinatesError),
}

/// Why a report was not accepted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmitError {
    /// The submission is invalid; nothing was stored.
    #[error(transparent)]
    Input(#[from] InputError),

    /// The reporter already reported this type here within the cooldown;
    /// nothing was stored.
    #[error("duplicate report (cooldown active)")]
    Duplicate {
        /// Cooldown length, so callers can say when to try again.
        cooldown_minutes: u32,
    },
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Address geocoding for incident reports.
//!
//! Reporters submit free-text addresses; this crate turns them into
//! coordinates:
//!
//! 1. [`address::normalize_address`] folds cosmetic variants (case,
//!    whitespace) into one cache key.
//! 2. [`cache::GeocodeCache`] memoizes coordinates for a short TTL and
//!    retries once on a rate-limit signal.
//! 3. A [`Geocoder`] implementation (by default [`nominatim::NominatimGeocoder`])
//!    performs the actual lookup.

pub mod address;
pub mod cache;
pub mod config;
pub mod nominatim;

use bridge_aid_incident_models::Coordinates;
use thiserror::Error;

pub use cache::{GeocodeCache, ResolveError, ResolvedLocation};
pub use config::GeocoderConfig;

/// A geocoding result.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedAddress {
    /// Resolved position.
    pub coordinates: Coordinates,
    /// Canonical display name returned by the provider, if any.
    pub display_name: Option<String>,
}

/// Errors from a geocoding provider.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// Provider asked us to slow down; retrying later may succeed.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Provider did not answer in time.
    #[error("Geocoding timed out after {seconds}s")]
    Timeout {
        /// The elapsed limit.
        seconds: u64,
    },

    /// Provider answered with a non-success status.
    #[error("Unexpected HTTP status {status}")]
    Status {
        /// The returned status code.
        status: u16,
    },
}

/// An external address lookup service.
#[async_trait::async_trait]
pub trait Geocoder: Send + Sync {
    /// Looks up `address`, optionally biased to a region (e.g. an ISO
    /// country code) and localized to `language`.
    ///
    /// Returns `Ok(None)` when the provider has no match.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::RateLimited`] when the provider signals
    /// "retry later", or another [`GeocodeError`] on transport or parse
    /// failures.
    async fn geocode(
        &self,
        address: &str,
        region_bias: Option<&str>,
        language: &str,
    ) -> Result<Option<GeocodedAddress>, GeocodeError>;
}

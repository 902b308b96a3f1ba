//! Tunables for ingestion, clustering and verification, deserialized from
//! the `[incidents]` table of the server configuration file.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// A setting that would make clustering or verification meaningless.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidIncidentConfig {
    /// A single reporter could confirm an incident alone.
    #[error("confirmation_threshold must be at least 2, got {0}")]
    ConfirmationThreshold(usize),

    /// No two reports could ever be near each other.
    #[error("proximity_threshold_m must be a positive number, got {0}")]
    ProximityThreshold(f64),

    /// The sweep could never call the verifier.
    #[error("verification_concurrency must be at least 1")]
    VerificationConcurrency,
}

/// Incident pipeline settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IncidentConfig {
    /// Maximum great-circle distance, in meters, at which two reports are
    /// treated as the same location.
    pub proximity_threshold_m: f64,
    /// Distinct reporters needed to confirm an incident.
    pub confirmation_threshold: usize,
    /// How long a reporter must wait before re-reporting the same type at
    /// the same location.
    pub cooldown_minutes: u32,
    /// How many of the most recent reports the duplicate check scans.
    pub duplicate_scan_window: usize,
    /// How long after confirmation an incident stays eligible for
    /// verification.
    pub verification_window_hours: u32,
    /// Upper bound on a single verification call.
    pub verification_timeout_secs: u64,
    /// Maximum verifier calls in flight during one sweep.
    pub verification_concurrency: usize,
}

impl Default for IncidentConfig {
    fn default() -> Self {
        Self {
            proximity_threshold_m: 200.0,
            confirmation_threshold: 3,
            cooldown_minutes: 10,
            duplicate_scan_window: 200,
            verification_window_hours: 24,
            verification_timeout_secs: 60,
            verification_concurrency: 4,
        }
    }
}

impl IncidentConfig {
    /// Rejects values that would confirm on a single report, never match
    /// two reports, or stall the sweep.
    ///
    /// # Errors
    ///
    /// Returns the first [`InvalidIncidentConfig`] found.
    pub fn validate(&self) -> Result<(), InvalidIncidentConfig> {
        if self.confirmation_threshold < 2 {
            return Err(InvalidIncidentConfig::ConfirmationThreshold(
                self.confirmation_threshold,
            ));
        }
        if !(self.proximity_threshold_m.is_finite() && self.proximity_threshold_m > 0.0) {
            return Err(InvalidIncidentConfig::ProximityThreshold(
                self.proximity_threshold_m,
            ));
        }
        if self.verification_concurrency == 0 {
            return Err(InvalidIncidentConfig::VerificationConcurrency);
        }
        Ok(())
    }

    /// Cooldown as a signed duration for timestamp arithmetic.
    #[must_use]
    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.cooldown_minutes))
    }

    /// Verification window as a signed duration for timestamp arithmetic.
    #[must_use]
    pub fn verification_window(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.verification_window_hours))
    }

    /// Verification timeout.
    #[must_use]
    pub const fn verification_timeout(&self) -> Duration {
        Duration::from_secs(self.verification_timeout_secs)
    }
}

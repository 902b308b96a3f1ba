#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! External verification of confirmed incidents.
//!
//! A [`Verifier`] turns a natural-language incident claim into a
//! [`Verdict`]. The production implementation, [`verify::LlmVerifier`],
//! asks an LLM provider (Anthropic Claude, `OpenAI`, or Google Gemini,
//! selected from the environment) to check the claim against public
//! sources and answer in JSON.
//!
//! Verification is advisory: callers treat any [`AiError`] the same as
//! "not verified".

pub mod providers;
pub mod verify;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during AI operations.
#[derive(Debug, Error)]
pub enum AiError {
    /// HTTP request to LLM provider failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Provider-specific error.
    #[error("Provider error: {message}")]
    Provider {
        /// Description of what went wrong.
        message: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config {
        /// Description.
        message: String,
    },
}

/// Outcome of verifying one claim.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Verdict {
    /// Whether public sources corroborate the claim.
    #[serde(default)]
    pub verified: bool,
    /// Short justification.
    #[serde(default)]
    pub summary: String,
    /// Supporting URLs.
    #[serde(default)]
    pub sources: Vec<String>,
}

/// An external judge of incident claims.
#[async_trait::async_trait]
pub trait Verifier: Send + Sync {
    /// Verifies `claim`.
    ///
    /// # Errors
    ///
    /// Returns [`AiError`] if the verifier could not be reached or its
    /// answer could not be understood.
    async fn verify(&self, claim: &str) -> Result<Verdict, AiError>;
}

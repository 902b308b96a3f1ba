//! Claim verification through an LLM provider.
//!
//! The model is asked to answer with a single JSON object
//! `{"verified": bool, "summary": str, "sources": [url]}`. Models often
//! wrap JSON in prose or code fences, so the object is cut out between
//! the first `{` and the last `}` before parsing. Missing fields default
//! to "not verified", an empty summary and no sources.

use crate::providers::{self, LlmProvider};
use crate::{AiError, Verdict, Verifier};

const SYSTEM_PROMPT: &str = "You verify reported natural-disaster and emergency incidents \
against credible public information (local news, government and utility notices, \
emergency services). Only mark an incident verified if a credible source corroborates it. \
Return ONLY valid JSON.";

/// [`Verifier`] backed by an [`LlmProvider`].
pub struct LlmVerifier {
    provider: Box<dyn LlmProvider>,
    window_hours: u32,
}

impl LlmVerifier {
    /// Creates a verifier that asks `provider` about events within the
    /// last `window_hours`.
    #[must_use]
    pub fn new(provider: Box<dyn LlmProvider>, window_hours: u32) -> Self {
        Self {
            provider,
            window_hours,
        }
    }
}

#[async_trait::async_trait]
impl Verifier for LlmVerifier {
    async fn verify(&self, claim: &str) -> Result<Verdict, AiError> {
        let prompt = build_prompt(claim, self.window_hours);
        let text = self.provider.complete(SYSTEM_PROMPT, &prompt).await?;
        log::debug!(
            "{} verification reply ({} chars)",
            self.provider.name(),
            text.len()
        );
        parse_verdict(&text)
    }
}

/// [`Verifier`] used when no LLM provider is configured. Never verifies.
pub struct DisabledVerifier;

#[async_trait::async_trait]
impl Verifier for DisabledVerifier {
    async fn verify(&self, _claim: &str) -> Result<Verdict, AiError> {
        Ok(Verdict {
            verified: false,
            summary: "No verification provider configured.".to_string(),
            sources: Vec::new(),
        })
    }
}

/// Builds the verifier from the environment, falling back to
/// [`DisabledVerifier`] when no credentials are present.
///
/// # Errors
///
/// Returns [`AiError::Config`] if a provider was explicitly requested
/// but is misconfigured.
pub fn verifier_from_env(window_hours: u32) -> Result<Box<dyn Verifier>, AiError> {
    Ok(match providers::create_provider_from_env()? {
        Some(provider) => {
            log::info!("Incident verification via {}", provider.name());
            Box::new(LlmVerifier::new(provider, window_hours))
        }
        None => Box::new(DisabledVerifier),
    })
}

fn build_prompt(claim: &str, window_hours: u32) -> String {
    format!(
        "You are verifying a reported natural-disaster incident based on public information \
         within the last {window_hours} hours.\n\n\
         Query: {claim}\n\n\
         Return ONLY valid JSON with these fields:\n\
         {{\n  \"verified\": true|false,\n  \"summary\": \"short 1-2 sentence justification\",\n  \
         \"sources\": [\"https://...\", \"https://...\"]\n}}\n"
    )
}

/// Extracts and parses the JSON verdict embedded in `text`.
///
/// Text without any JSON object yields an unverified, empty verdict.
///
/// # Errors
///
/// Returns [`AiError::Json`] if the embedded object is malformed.
pub fn parse_verdict(text: &str) -> Result<Verdict, AiError> {
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Ok(Verdict::default());
    };
    if end < start {
        return Ok(Verdict::default());
    }

    Ok(serde_json::from_str(&text[start..=end])?)
}

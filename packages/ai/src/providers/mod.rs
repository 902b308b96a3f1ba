//! LLM provider abstraction and implementations.
//!
//! Supports Anthropic Claude, `OpenAI` (and any `OpenAI`-compatible
//! server via `AI_BASE_URL`), and Google Gemini via a common trait.

pub mod anthropic;
pub mod gemini;
pub mod openai;

use crate::AiError;

/// Trait for LLM providers.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Sends a single-turn completion request and returns the model's text.
    ///
    /// # Errors
    ///
    /// Returns [`AiError`] if the request fails.
    async fn complete(&self, system_prompt: &str, prompt: &str) -> Result<String, AiError>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}

/// Creates an LLM provider based on environment variables.
///
/// If `AI_PROVIDER` is explicitly set, uses that provider. Otherwise
/// auto-detects from available credentials:
///
/// 1. `ANTHROPIC_API_KEY` set -> Anthropic Claude
/// 2. `OPENAI_API_KEY` set -> `OpenAI`
/// 3. `GEMINI_API_KEY` or `GOOGLE_API_KEY` set -> Gemini
///
/// Returns `Ok(None)` when no provider is requested and no credentials
/// are present.
///
/// # Errors
///
/// Returns [`AiError::Config`] if the explicitly requested provider is
/// unknown or missing its credentials.
pub fn create_provider_from_env() -> Result<Option<Box<dyn LlmProvider>>, AiError> {
    let Some(provider) = std::env::var("AI_PROVIDER").ok().or_else(detect_provider) else {
        return Ok(None);
    };

    match provider.to_lowercase().as_str() {
        "anthropic" | "claude" => {
            let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| AiError::Config {
                message: "ANTHROPIC_API_KEY environment variable not set".to_string(),
            })?;
            let model = std::env::var("AI_MODEL")
                .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string());
            Ok(Some(Box::new(anthropic::AnthropicProvider::new(
                api_key, model,
            ))))
        }
        "openai" | "gpt" => {
            let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
            let base_url = std::env::var("AI_BASE_URL").ok();
            if api_key.is_empty() && base_url.is_none() {
                return Err(AiError::Config {
                    message: "OPENAI_API_KEY environment variable not set".to_string(),
                });
            }
            let model = std::env::var("AI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
            Ok(Some(Box::new(openai::OpenAiProvider::new(
                api_key, model, base_url,
            ))))
        }
        "gemini" | "google" => {
            let api_key = std::env::var("GEMINI_API_KEY")
                .or_else(|_| std::env::var("GOOGLE_API_KEY"))
                .map_err(|_| AiError::Config {
                    message: "GEMINI_API_KEY or GOOGLE_API_KEY environment variable not set"
                        .to_string(),
                })?;
            let model =
                std::env::var("AI_MODEL").unwrap_or_else(|_| "gemini-1.5-pro".to_string());
            Ok(Some(Box::new(gemini::GeminiProvider::new(api_key, model))))
        }
        other => Err(AiError::Config {
            message: format!(
                "Unknown AI provider: {other}. Use 'anthropic', 'openai', or 'gemini'."
            ),
        }),
    }
}

/// Auto-detects which provider to use based on available credentials.
fn detect_provider() -> Option<String> {
    if std::env::var("ANTHROPIC_API_KEY").is_ok() {
        log::info!("Auto-detected AI provider: Anthropic (ANTHROPIC_API_KEY found)");
        return Some("anthropic".to_string());
    }

    if std::env::var("OPENAI_API_KEY").is_ok() || std::env::var("AI_BASE_URL").is_ok() {
        log::info!("Auto-detected AI provider: OpenAI-compatible");
        return Some("openai".to_string());
    }

    if std::env::var("GEMINI_API_KEY").is_ok() || std::env::var("GOOGLE_API_KEY").is_ok() {
        log::info!("Auto-detected AI provider: Gemini");
        return Some("gemini".to_string());
    }

    log::warn!(
        "No AI credentials detected. Set one of: ANTHROPIC_API_KEY, OPENAI_API_KEY, \
         GEMINI_API_KEY, or AI_PROVIDER explicitly. Incident verification is disabled."
    );
    None
}

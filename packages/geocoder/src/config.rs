//! Geocoder settings, deserialized from the `[geocoder]` table of the
//! server configuration file.

use std::time::Duration;

use serde::Deserialize;

/// Public Nominatim search endpoint.
pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";

/// Nominatim requires an identifying user agent.
pub const DEFAULT_USER_AGENT: &str = "BridgeAid/1.0";

/// Geocoding provider and cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeocoderConfig {
    /// Nominatim search endpoint.
    pub base_url: String,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
    /// Country code(s) results are restricted to, e.g. `"ca"`.
    pub region_bias: Option<String>,
    /// Preferred language for display names.
    pub language: String,
    /// How long a cached coordinate stays fresh.
    pub cache_ttl_secs: u64,
    /// Delay before the single retry after a rate-limit response.
    pub rate_limit_backoff_ms: u64,
    /// Upper bound on each provider call.
    pub timeout_secs: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_NOMINATIM_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            region_bias: Some("ca".to_string()),
            language: "en".to_string(),
            cache_ttl_secs: 600,
            rate_limit_backoff_ms: 1200,
            timeout_secs: 12,
        }
    }
}

impl GeocoderConfig {
    /// Cache time-to-live as a [`Duration`].
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Rate-limit backoff as a [`Duration`].
    #[must_use]
    pub const fn rate_limit_backoff(&self) -> Duration {
        Duration::from_millis(self.rate_limit_backoff_ms)
    }

    /// Per-call timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

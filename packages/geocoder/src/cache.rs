//! Short-lived in-memory geocode cache.
//!
//! Keyed by [`normalize_address`], so cosmetic variants of one address
//! share an entry. Only coordinates are stored: a cache hit echoes the
//! caller's own input as the display name rather than the provider's
//! canonical name.
//!
//! Entries expire by TTL only; there is no size bound. Expired entries are
//! pruned whenever a new entry is written.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use bridge_aid_incident_models::Coordinates;
use thiserror::Error;
use tokio::time::Instant;

use crate::address::normalize_address;
use crate::{GeocodeError, GeocodedAddress, Geocoder, GeocoderConfig};

/// A resolved address.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLocation {
    /// Resolved position.
    pub coordinates: Coordinates,
    /// Provider display name on a fresh lookup; the caller's input on a
    /// cache hit.
    pub display_name: String,
    /// Whether the result came from the cache.
    pub cached: bool,
}

/// Why an address could not be resolved.
///
/// Every variant means "could not geocode": callers treat these as input
/// errors, not retryable faults.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// Nothing left after normalization.
    #[error("address is empty")]
    EmptyAddress,

    /// The provider has no match.
    #[error("address not found")]
    NotFound,

    /// The provider failed, timed out, or stayed rate limited.
    #[error("geocoding unavailable: {message}")]
    Unavailable {
        /// Description of the upstream failure.
        message: String,
    },
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    coordinates: Coordinates,
    cached_at: Instant,
}

/// Memoizing front for a [`Geocoder`].
pub struct GeocodeCache {
    geocoder: Arc<dyn Geocoder>,
    entries: RwLock<BTreeMap<String, CacheEntry>>,
    ttl: Duration,
    rate_limit_backoff: Duration,
    timeout: Duration,
}

impl GeocodeCache {
    /// Wraps `geocoder` with the TTL, backoff and timeout from `config`.
    #[must_use]
    pub fn new(geocoder: Arc<dyn Geocoder>, config: &GeocoderConfig) -> Self {
        Self {
            geocoder,
            entries: RwLock::new(BTreeMap::new()),
            ttl: config.cache_ttl(),
            rate_limit_backoff: config.rate_limit_backoff(),
            timeout: config.timeout(),
        }
    }

    /// Resolves `address` to coordinates.
    ///
    /// On a fresh cache hit, no provider call is made. On a miss the
    /// provider is called once, and once more after a fixed backoff if it
    /// signals rate limiting.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] if the address is blank, has no match, or
    /// the provider is unavailable.
    pub async fn resolve(
        &self,
        address: &str,
        region_bias: Option<&str>,
        language: &str,
    ) -> Result<ResolvedLocation, ResolveError> {
        let key = normalize_address(address);
        if key.is_empty() {
            return Err(ResolveError::EmptyAddress);
        }

        if let Some(coordinates) = self.lookup(&key) {
            log::debug!("Geocode cache hit for '{key}'");
            return Ok(ResolvedLocation {
                coordinates,
                display_name: address.to_string(),
                cached: true,
            });
        }

        let hit = self.fetch(address.trim(), region_bias, language).await?;
        self.insert(key, hit.coordinates);

        Ok(ResolvedLocation {
            coordinates: hit.coordinates,
            display_name: hit.display_name.unwrap_or_else(|| address.to_string()),
            cached: false,
        })
    }

    /// Number of entries currently held, fresh or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: &str) -> Option<Coordinates> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .filter(|entry| entry.cached_at.elapsed() < self.ttl)
            .map(|entry| entry.coordinates)
    }

    fn insert(&self, key: String, coordinates: Coordinates) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.cached_at.elapsed() < ttl);
        entries.insert(
            key,
            CacheEntry {
                coordinates,
                cached_at: Instant::now(),
            },
        );
    }

    async fn fetch(
        &self,
        address: &str,
        region_bias: Option<&str>,
        language: &str,
    ) -> Result<GeocodedAddress, ResolveError> {
        let mut outcome = self.call(address, region_bias, language).await;

        if matches!(outcome, Err(GeocodeError::RateLimited)) {
            log::warn!(
                "Geocoder rate limited, retrying once in {:?}",
                self.rate_limit_backoff
            );
            tokio::time::sleep(self.rate_limit_backoff).await;
            outcome = self.call(address, region_bias, language).await;
        }

        match outcome {
            Ok(Some(hit)) => Ok(hit),
            Ok(None) => {
                log::debug!("No geocoding match for '{address}'");
                Err(ResolveError::NotFound)
            }
            Err(e) => {
                log::warn!("Geocoding '{address}' failed: {e}");
                Err(ResolveError::Unavailable {
                    message: e.to_string(),
                })
            }
        }
    }

    async fn call(
        &self,
        address: &str,
        region_bias: Option<&str>,
        language: &str,
    ) -> Result<Option<GeocodedAddress>, GeocodeError> {
        tokio::time::timeout(
            self.timeout,
            self.geocoder.geocode(address, region_bias, language),
        )
        .await
        .map_err(|_| GeocodeError::Timeout {
            seconds: self.timeout.as_secs(),
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Scripted {
        Hit(f64, f64, Option<&'static str>),
        Miss,
        RateLimited,
        Broken,
        Hang,
    }

    /// Replays scripted outcomes; answers with a fixed hit once the script
    /// runs out.
    struct FakeGeocoder {
        calls: AtomicUsize,
        script: Mutex<VecDeque<Scripted>>,
    }

    impl FakeGeocoder {
        fn new(script: Vec<Scripted>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                script: Mutex::new(script.into()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Geocoder for FakeGeocoder {
        async fn geocode(
            &self,
            _address: &str,
            _region_bias: Option<&str>,
            _language: &str,
        ) -> Result<Option<GeocodedAddress>, GeocodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            match next.unwrap_or(Scripted::Hit(43.5183, -79.8774, Some("Milton, Ontario"))) {
                Scripted::Hit(lat, lng, name) => Ok(Some(GeocodedAddress {
                    coordinates: Coordinates::new(lat, lng).unwrap(),
                    display_name: name.map(String::from),
                })),
                Scripted::Miss => Ok(None),
                Scripted::RateLimited => Err(GeocodeError::RateLimited),
                Scripted::Broken => Err(GeocodeError::Status { status: 500 }),
                Scripted::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(None)
                }
            }
        }
    }

    fn cache_over(fake: &Arc<FakeGeocoder>) -> GeocodeCache {
        GeocodeCache::new(fake.clone(), &GeocoderConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn cosmetic_variants_share_one_lookup() {
        let fake = FakeGeocoder::new(vec![]);
        let cache = cache_over(&fake);

        let first = cache.resolve("123 Main St, Milton", None, "en").await.unwrap();
        let second = cache
            .resolve("  123 MAIN   st,  milton ", None, "en")
            .await
            .unwrap();

        assert_eq!(fake.calls(), 1);
        assert!(!first.cached);
        assert_eq!(first.display_name, "Milton, Ontario");
        assert!(second.cached);
        assert_eq!(second.coordinates, first.coordinates);
        assert_eq!(second.display_name, "  123 MAIN   st,  milton ");
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn entry_expires_after_ttl() {
        let fake = FakeGeocoder::new(vec![]);
        let cache = cache_over(&fake);

        cache.resolve("1 Front St", None, "en").await.unwrap();
        tokio::time::advance(Duration::from_secs(599)).await;
        cache.resolve("1 Front St", None, "en").await.unwrap();
        assert_eq!(fake.calls(), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        let refreshed = cache.resolve("1 Front St", None, "en").await.unwrap();
        assert_eq!(fake.calls(), 2);
        assert!(!refreshed.cached);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_once_after_rate_limit() {
        let fake = FakeGeocoder::new(vec![
            Scripted::RateLimited,
            Scripted::Hit(10.0, 20.0, None),
        ]);
        let cache = cache_over(&fake);

        let started = Instant::now();
        let resolved = cache.resolve("somewhere", Some("ca"), "en").await.unwrap();

        assert_eq!(fake.calls(), 2);
        assert!(started.elapsed() >= Duration::from_millis(1200));
        assert!((resolved.coordinates.latitude() - 10.0).abs() < f64::EPSILON);
        assert_eq!(resolved.display_name, "somewhere");
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_second_rate_limit() {
        let fake = FakeGeocoder::new(vec![Scripted::RateLimited, Scripted::RateLimited]);
        let cache = cache_over(&fake);

        let err = cache.resolve("somewhere", None, "en").await.unwrap_err();
        assert!(matches!(err, ResolveError::Unavailable { .. }));
        assert_eq!(fake.calls(), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn no_match_is_not_found_and_not_cached() {
        let fake = FakeGeocoder::new(vec![Scripted::Miss]);
        let cache = cache_over(&fake);

        assert_eq!(
            cache.resolve("nowhere", None, "en").await.unwrap_err(),
            ResolveError::NotFound
        );
        cache.resolve("nowhere", None, "en").await.unwrap();
        assert_eq!(fake.calls(), 2);
    }

    #[tokio::test]
    async fn provider_failure_is_unavailable_without_retry() {
        let fake = FakeGeocoder::new(vec![Scripted::Broken]);
        let cache = cache_over(&fake);

        let err = cache.resolve("anywhere", None, "en").await.unwrap_err();
        assert!(matches!(err, ResolveError::Unavailable { .. }));
        assert_eq!(fake.calls(), 1);
    }

    #[tokio::test]
    async fn blank_address_never_reaches_provider() {
        let fake = FakeGeocoder::new(vec![]);
        let cache = cache_over(&fake);

        assert_eq!(
            cache.resolve("   ", None, "en").await.unwrap_err(),
            ResolveError::EmptyAddress
        );
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_provider_times_out() {
        let fake = FakeGeocoder::new(vec![Scripted::Hang]);
        let cache = cache_over(&fake);

        let err = cache.resolve("slow street", None, "en").await.unwrap_err();
        assert_eq!(
            err,
            ResolveError::Unavailable {
                message: "Geocoding timed out after 12s".to_string()
            }
        );
    }
}

//! TTL response cache in front of any `LocalContentApi`.

use std::future::Future;
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::Cache;
use serde_json::Value;
use tracing::instrument;

use super::api::LocalContentApi;
use super::error::ContentApiError;
use super::params::QueryParams;

/// Default time-to-live of a cached response.
const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Default maximum number of cached responses.
const DEFAULT_MAX_CAPACITY: u64 = 1_000;

/// Cache sizing and expiry settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// TTL used when a call does not request its own.
    pub ttl: Duration,
    /// Maximum number of entries.
    pub max_capacity: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            max_capacity: DEFAULT_MAX_CAPACITY,
        }
    }
}

/// A cached response together with its own TTL.
#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    ttl: Duration,
}

/// Identifies one request: operation, encoded parameters and referrer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    op: &'static str,
    params: String,
    referer: Option<String>,
}

impl CacheKey {
    fn new(op: &'static str, params: &QueryParams, referer: Option<&str>) -> Self {
        Self {
            op,
            params: params.cache_key(),
            referer: referer.map(String::from),
        }
    }
}

/// Expires each entry after the TTL stored in it.
#[derive(Debug)]
struct PerEntryTtl;

impl Expiry<CacheKey, Entry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Wraps an API and serves repeated calls with identical parameters from
/// memory until their TTL runs out. Only successful responses are cached.
///
/// Concurrent misses on the same key share a single upstream request.
#[derive(Debug)]
pub struct CachedContentApi<A> {
    inner: A,
    cache: Cache<CacheKey, Entry>,
    default_ttl: Duration,
}

impl<A> CachedContentApi<A> {
    /// Wraps `inner` with a cache built from `settings`.
    #[must_use]
    pub fn new(inner: A, settings: &CacheSettings) -> Self {
        let cache = Cache::builder()
            .max_capacity(settings.max_capacity)
            .expire_after(PerEntryTtl)
            .build();
        Self {
            inner,
            cache,
            default_ttl: settings.ttl,
        }
    }

    /// The wrapped API.
    pub const fn inner(&self) -> &A {
        &self.inner
    }

    /// Drops every cached response.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    async fn get_or_fetch<F, Fut>(
        &self,
        key: CacheKey,
        ttl: Duration,
        fetch: F,
    ) -> Result<Value, ContentApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, ContentApiError>>,
    {
        let op = key.op;
        let entry = self
            .cache
            .try_get_with(key, async move {
                tracing::debug!(op, ttl_secs = ttl.as_secs(), "CRL API cache miss");
                fetch().await.map(|value| Entry { value, ttl })
            })
            .await
            .map_err(ContentApiError::from_shared)?;
        Ok(entry.value)
    }
}

impl<A: LocalContentApi + Sync> LocalContentApi for CachedContentApi<A> {
    #[instrument(skip_all)]
    async fn place_events(&self, place_id: &str) -> Result<Value, ContentApiError> {
        let key = CacheKey {
            op: "place_events",
            params: String::from(place_id),
            referer: None,
        };
        self.get_or_fetch(key, self.default_ttl, || self.inner.place_events(place_id))
            .await
    }

    #[instrument(skip_all)]
    async fn cities(
        &self,
        params: &QueryParams,
        referer: Option<&str>,
        ttl: u64,
    ) -> Result<Value, ContentApiError> {
        let key = CacheKey::new("cities", params, referer);
        let entry_ttl = if ttl == 0 {
            self.default_ttl
        } else {
            Duration::from_secs(ttl)
        };
        self.get_or_fetch(key, entry_ttl, || self.inner.cities(params, referer, ttl))
            .await
    }

    #[instrument(skip_all)]
    async fn places(
        &self,
        params: &QueryParams,
        referer: Option<&str>,
    ) -> Result<Value, ContentApiError> {
        let key = CacheKey::new("places", params, referer);
        self.get_or_fetch(key, self.default_ttl, || self.inner.places(params, referer))
            .await
    }

    #[instrument(skip_all)]
    async fn events_list(
        &self,
        params: &QueryParams,
        referer: Option<&str>,
    ) -> Result<Value, ContentApiError> {
        let key = CacheKey::new("events", params, referer);
        self.get_or_fetch(key, self.default_ttl, || {
            self.inner.events_list(params, referer)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    /// Counts calls and answers with the call number, failing while `fail` is set.
    #[derive(Debug, Default)]
    struct CountingApi {
        calls: AtomicUsize,
        fail: std::sync::atomic::AtomicBool,
        delay: Duration,
    }

    impl CountingApi {
        async fn next(&self) -> Result<Value, ContentApiError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(ContentApiError::Timeout {
                    url: String::from("https://api.example.org/v1/"),
                });
            }
            Ok(json!({ "call": n }))
        }

        fn count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl LocalContentApi for CountingApi {
        async fn place_events(&self, _place_id: &str) -> Result<Value, ContentApiError> {
            self.next().await
        }

        async fn cities(
            &self,
            _params: &QueryParams,
            _referer: Option<&str>,
            _ttl: u64,
        ) -> Result<Value, ContentApiError> {
            self.next().await
        }

        async fn places(
            &self,
            _params: &QueryParams,
            _referer: Option<&str>,
        ) -> Result<Value, ContentApiError> {
            self.next().await
        }

        async fn events_list(
            &self,
            _params: &QueryParams,
            _referer: Option<&str>,
        ) -> Result<Value, ContentApiError> {
            self.next().await
        }
    }

    #[tokio::test]
    async fn test_identical_params_hit_cache() {
        // Arrange
        let api = CachedContentApi::new(CountingApi::default(), &CacheSettings::default());
        let params = QueryParams::new().with("page", 1_i64).with("city", "msk");
        let reordered = QueryParams::new().with("city", "msk").with("page", 1_i64);

        // Act
        let first = api.events_list(&params, Some("r")).await.unwrap();
        let second = api.events_list(&reordered, Some("r")).await.unwrap();

        // Assert
        assert_eq!(first, second);
        assert_eq!(api.inner().count(), 1);
    }

    #[tokio::test]
    async fn test_different_params_or_referer_miss_cache() {
        // Arrange
        let api = CachedContentApi::new(CountingApi::default(), &CacheSettings::default());
        let params = QueryParams::new().with("page", 1_i64);
        let other = QueryParams::new().with("page", 2_i64);

        // Act
        api.places(&params, None).await.unwrap();
        api.places(&other, None).await.unwrap();
        api.places(&params, Some("https://example.org/")).await.unwrap();

        // Assert
        assert_eq!(api.inner().count(), 3);
    }

    #[tokio::test]
    async fn test_params_with_separators_do_not_collide() {
        // Arrange
        let api = CachedContentApi::new(CountingApi::default(), &CacheSettings::default());
        let packed = QueryParams::new().with("a", "1&b=2");
        let split = QueryParams::new().with("a", "1").with("b", "2");

        // Act
        let first = api.events_list(&packed, None).await.unwrap();
        let second = api.events_list(&split, None).await.unwrap();

        // Assert
        assert_ne!(first, second);
        assert_eq!(api.inner().count(), 2);
    }

    #[tokio::test]
    async fn test_missing_and_empty_referer_are_distinct() {
        // Arrange
        let api = CachedContentApi::new(CountingApi::default(), &CacheSettings::default());
        let params = QueryParams::new();

        // Act
        api.places(&params, None).await.unwrap();
        api.places(&params, Some("")).await.unwrap();

        // Assert
        assert_eq!(api.inner().count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_fetch() {
        // Arrange
        let inner = CountingApi {
            delay: Duration::from_millis(100),
            ..CountingApi::default()
        };
        let api = CachedContentApi::new(inner, &CacheSettings::default());
        let params = QueryParams::new().with("page", 1_i64);

        // Act
        let (first, second) = tokio::join!(
            api.events_list(&params, None),
            api.events_list(&params, None)
        );

        // Assert
        assert_eq!(first.unwrap(), second.unwrap());
        assert_eq!(api.inner().count(), 1);
    }

    #[tokio::test]
    async fn test_operations_do_not_share_entries() {
        // Arrange
        let api = CachedContentApi::new(CountingApi::default(), &CacheSettings::default());
        let params = QueryParams::new();

        // Act
        api.places(&params, None).await.unwrap();
        api.cities(&params, None, 0).await.unwrap();
        api.place_events("1").await.unwrap();
        api.place_events("1").await.unwrap();

        // Assert
        assert_eq!(api.inner().count(), 3);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        // Arrange
        let inner = CountingApi::default();
        inner.fail.store(true, Ordering::SeqCst);
        let api = CachedContentApi::new(inner, &CacheSettings::default());
        let params = QueryParams::new();

        // Act
        let failed = api.cities(&params, None, 0).await;
        api.inner().fail.store(false, Ordering::SeqCst);
        let recovered = api.cities(&params, None, 0).await;

        // Assert
        assert!(failed.unwrap_err().is_timeout());
        assert!(recovered.is_ok());
        assert_eq!(api.inner().count(), 2);
    }

    #[tokio::test]
    async fn test_cities_ttl_expires_entry() {
        // Arrange
        let api = CachedContentApi::new(CountingApi::default(), &CacheSettings::default());
        let params = QueryParams::new();

        // Act
        api.cities(&params, None, 1).await.unwrap();
        api.cities(&params, None, 1).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        api.cities(&params, None, 1).await.unwrap();

        // Assert
        assert_eq!(api.inner().count(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_all_forces_refetch() {
        // Arrange
        let api = CachedContentApi::new(CountingApi::default(), &CacheSettings::default());

        // Act
        api.place_events("7").await.unwrap();
        api.invalidate_all();
        api.place_events("7").await.unwrap();

        // Assert
        assert_eq!(api.inner().count(), 2);
    }

    #[test]
    fn test_default_settings() {
        // Arrange & Act
        let settings = CacheSettings::default();

        // Assert
        assert_eq!(settings.ttl, Duration::from_secs(300));
        assert_eq!(settings.max_capacity, 1_000);
    }
}

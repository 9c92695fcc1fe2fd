//! Cache orchestration for chart requests
//!
//! This module decides, per invocation, whether the chart of accounts comes
//! from the upstream finance system or the durable write-through cache, and
//! owns every durable-cache read and write. The flow for a request:
//!
//! - **Fetch**: call the upstream source, bounded by the configured
//!   timeout. On success, write-through the durable cache (skipping the
//!   write when the payload is unchanged, to limit version churn in the
//!   external store) and serve the fresh data.
//! - **Fallback**: on fetch failure (timeout, auth failure, malformed or
//!   empty payload), serve the most recent cache record and mark the
//!   response degraded. If the cache is also empty, the request fails with
//!   `UpstreamUnavailable`.
//!
//! The transform engine never touches the cache; it receives an
//! already-resolved chart from here. Each invocation performs at most one
//! upstream fetch and one durable write, with no retry loop.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::core::traits::{DurableCache, RawAccountSource};
use crate::core::transform::{transform, OutputMode, TransformConfig};
use crate::types::{CacheRecord, ChartError, ChartOrigin, OutputEntry, RawChartOfAccounts, RequestOptions};

/// A raw chart resolved from upstream or the durable cache
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedChart {
    /// The raw records backing the response
    pub raw: RawChartOfAccounts,

    /// Where the records came from
    pub origin: ChartOrigin,

    /// When the records were fetched from upstream (cache records keep
    /// their original fetch time)
    pub fetched_at: DateTime<Utc>,
}

/// A fully transformed chart ready for the HTTP layer
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPayload {
    /// Shaped, ordered output entries
    pub entries: Vec<OutputEntry>,

    /// Where the backing records came from; `DurableCache` means the
    /// response is degraded/stale
    pub origin: ChartOrigin,

    /// Fetch time of the backing records
    pub fetched_at: DateTime<Utc>,
}

/// Orchestrates upstream fetches, durable-cache traffic, and the transform
///
/// Generic over the collaborator seams so tests can substitute in-memory
/// stubs. Stateless across requests; every field is immutable after
/// construction.
pub struct ChartService<S, D> {
    source: S,
    cache: D,
    cache_key: String,
    fetch_timeout: Duration,
    transform_config: TransformConfig,
}

impl<S: RawAccountSource, D: DurableCache> ChartService<S, D> {
    /// Create a new chart service
    ///
    /// # Arguments
    ///
    /// * `source` - the upstream finance-system collaborator
    /// * `cache` - the durable write-through cache collaborator
    /// * `cache_key` - fixed key under which the raw chart is cached
    /// * `fetch_timeout` - bound on the upstream fetch, after which the
    ///   fetch is treated as failed
    /// * `transform_config` - immutable transform configuration
    pub fn new(
        source: S,
        cache: D,
        cache_key: impl Into<String>,
        fetch_timeout: Duration,
        transform_config: TransformConfig,
    ) -> Self {
        ChartService {
            source,
            cache,
            cache_key: cache_key.into(),
            fetch_timeout,
            transform_config,
        }
    }

    /// Serve a chart request: resolve the raw chart, then transform it
    ///
    /// # Errors
    ///
    /// Returns `UpstreamUnavailable` when the fetch fails and no cached
    /// chart exists. The transform itself never fails.
    pub async fn chart(
        &self,
        options: &RequestOptions,
        mode: OutputMode,
    ) -> Result<ChartPayload, ChartError> {
        let resolved = self.resolve_chart().await?;
        let entries = transform(&resolved.raw, options, mode, &self.transform_config);
        Ok(ChartPayload {
            entries,
            origin: resolved.origin,
            fetched_at: resolved.fetched_at,
        })
    }

    /// Resolve the raw chart from upstream, falling back to the cache
    ///
    /// Only fetch failures trigger the fallback; any other error class is
    /// propagated, since serving stale data would mask it.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamUnavailable` when both the upstream fetch and the
    /// cache fallback come up empty.
    pub async fn resolve_chart(&self) -> Result<ResolvedChart, ChartError> {
        match self.fetch_bounded().await {
            Ok(raw) => {
                self.write_through(&raw).await;
                Ok(ResolvedChart {
                    raw,
                    origin: ChartOrigin::Upstream,
                    fetched_at: Utc::now(),
                })
            }
            Err(fetch_err) if fetch_err.is_fetch_failure() => {
                warn!(error = %fetch_err, "upstream fetch failed, falling back to durable cache");
                self.fallback(fetch_err).await
            }
            Err(other) => Err(other),
        }
    }

    /// Force a fresh upstream fetch and durable-cache write
    ///
    /// Cache-warming operation: ignores any existing cache state and writes
    /// unconditionally. Serves no client payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails or the cache write fails; unlike
    /// the request path, a write failure here is surfaced because the write
    /// is the whole point of the operation.
    pub async fn refresh(&self) -> Result<CacheRecord, ChartError> {
        let raw = self.fetch_bounded().await?;
        let record = CacheRecord::new(raw);
        self.cache.write(&self.cache_key, &record).await?;
        info!(version = %record.version, "refreshed durable cache");
        Ok(record)
    }

    /// Invalidate the current durable cache entry
    ///
    /// Edge-cache invalidation is an external side effect; this core only
    /// requests it (by logging the need) and never performs it.
    ///
    /// # Errors
    ///
    /// Returns an error if the purge fails.
    pub async fn purge(&self) -> Result<(), ChartError> {
        self.cache.purge(&self.cache_key).await?;
        info!(key = %self.cache_key, "purged durable cache; edge cache invalidation requested");
        Ok(())
    }

    /// Fetch from upstream, bounded by the configured timeout
    ///
    /// An empty raw chart is treated as a fetch failure: serving an empty
    /// chart when a cached one exists would be worse than stale data.
    async fn fetch_bounded(&self) -> Result<RawChartOfAccounts, ChartError> {
        let raw = tokio::time::timeout(self.fetch_timeout, self.source.fetch_raw_accounts())
            .await
            .map_err(|_| ChartError::upstream_timeout(self.fetch_timeout.as_secs()))??;

        if raw.is_empty() {
            return Err(ChartError::malformed_upstream("empty chart of accounts"));
        }
        Ok(raw)
    }

    /// Write-through a freshly fetched chart
    ///
    /// Reads the current record first and skips the write when the payload
    /// is unchanged. Both read and write failures are non-fatal here: the
    /// fresh data is served regardless.
    async fn write_through(&self, raw: &RawChartOfAccounts) {
        let current = match self.cache.read(&self.cache_key).await {
            Ok(record) => record,
            Err(err) => {
                warn!(error = %err, "durable cache read failed before write-through");
                None
            }
        };

        if current.as_ref().is_some_and(|record| &record.raw == raw) {
            debug!("chart of accounts unchanged, skipping durable cache write");
            return;
        }

        let record = CacheRecord::new(raw.clone());
        match self.cache.write(&self.cache_key, &record).await {
            Ok(()) => debug!(version = %record.version, "wrote chart of accounts to durable cache"),
            Err(err) => warn!(error = %err, "durable cache write failed, serving response anyway"),
        }
    }

    /// Serve the most recent cache record after a fetch failure
    async fn fallback(&self, fetch_err: ChartError) -> Result<ResolvedChart, ChartError> {
        let record = match self.cache.read(&self.cache_key).await {
            Ok(record) => record,
            Err(read_err) => {
                warn!(error = %read_err, "durable cache read failed during fallback");
                None
            }
        };

        match record {
            Some(record) => {
                info!(
                    fetched_at = %record.fetched_at,
                    version = %record.version,
                    "serving stale chart of accounts from durable cache"
                );
                Ok(ResolvedChart {
                    raw: record.raw,
                    origin: ChartOrigin::DurableCache,
                    fetched_at: record.fetched_at,
                })
            }
            None => Err(ChartError::upstream_unavailable(fetch_err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AccountRecord;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Stub source returning queued responses in order
    struct StubSource {
        responses: Mutex<VecDeque<Result<RawChartOfAccounts, ChartError>>>,
    }

    impl StubSource {
        fn new(responses: Vec<Result<RawChartOfAccounts, ChartError>>) -> Self {
            StubSource {
                responses: Mutex::new(responses.into()),
            }
        }

        fn ok(raw: RawChartOfAccounts) -> Self {
            Self::new(vec![Ok(raw)])
        }

        fn failing() -> Self {
            Self::new(vec![Err(ChartError::upstream_unavailable(
                "connection refused",
            ))])
        }
    }

    #[async_trait]
    impl RawAccountSource for StubSource {
        async fn fetch_raw_accounts(&self) -> Result<RawChartOfAccounts, ChartError> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected extra fetch")
        }
    }

    /// Source that never completes, for timeout tests
    struct HangingSource;

    #[async_trait]
    impl RawAccountSource for HangingSource {
        async fn fetch_raw_accounts(&self) -> Result<RawChartOfAccounts, ChartError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    /// In-memory cache with programmable failure modes
    #[derive(Default)]
    struct MemoryCache {
        record: Mutex<Option<CacheRecord>>,
        fail_reads: bool,
        fail_writes: bool,
        writes: AtomicUsize,
    }

    impl MemoryCache {
        fn seeded(raw: RawChartOfAccounts) -> Self {
            MemoryCache {
                record: Mutex::new(Some(CacheRecord::new(raw))),
                ..MemoryCache::default()
            }
        }

        fn write_count(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DurableCache for MemoryCache {
        async fn read(&self, key: &str) -> Result<Option<CacheRecord>, ChartError> {
            if self.fail_reads {
                return Err(ChartError::cache_read_failed(key, "stub read failure"));
            }
            Ok(self.record.lock().unwrap().clone())
        }

        async fn write(&self, key: &str, record: &CacheRecord) -> Result<(), ChartError> {
            if self.fail_writes {
                return Err(ChartError::cache_write_failed(key, "stub write failure"));
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            *self.record.lock().unwrap() = Some(record.clone());
            Ok(())
        }

        async fn purge(&self, _key: &str) -> Result<(), ChartError> {
            *self.record.lock().unwrap() = None;
            Ok(())
        }
    }

    fn sample_raw() -> RawChartOfAccounts {
        vec![AccountRecord::new("990300", "Platform Infrastructure", true)]
    }

    fn service<S: RawAccountSource, D: DurableCache>(source: S, cache: D) -> ChartService<S, D> {
        ChartService::new(
            source,
            cache,
            "chart-of-accounts",
            Duration::from_secs(4),
            TransformConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_successful_fetch_writes_through() {
        let cache = MemoryCache::default();
        let service = service(StubSource::ok(sample_raw()), cache);

        let resolved = service.resolve_chart().await.unwrap();
        assert_eq!(resolved.origin, ChartOrigin::Upstream);
        assert_eq!(resolved.raw, sample_raw());

        let cached = service.cache.read("chart-of-accounts").await.unwrap();
        assert_eq!(cached.unwrap().raw, sample_raw());
    }

    #[tokio::test]
    async fn test_unchanged_payload_skips_write() {
        let cache = MemoryCache::seeded(sample_raw());
        let service = service(StubSource::ok(sample_raw()), cache);

        service.resolve_chart().await.unwrap();
        assert_eq!(service.cache.write_count(), 0);
    }

    #[tokio::test]
    async fn test_changed_payload_overwrites_cache() {
        let cache = MemoryCache::seeded(vec![AccountRecord::new("111111", "Old", true)]);
        let service = service(StubSource::ok(sample_raw()), cache);

        service.resolve_chart().await.unwrap();
        assert_eq!(service.cache.write_count(), 1);

        let cached = service.cache.read("chart-of-accounts").await.unwrap();
        assert_eq!(cached.unwrap().raw, sample_raw());
    }

    #[tokio::test]
    async fn test_fetch_failure_falls_back_to_cache() {
        let cache = MemoryCache::seeded(sample_raw());
        let service = service(StubSource::failing(), cache);

        let resolved = service.resolve_chart().await.unwrap();
        assert_eq!(resolved.origin, ChartOrigin::DurableCache);
        assert_eq!(resolved.raw, sample_raw());
    }

    #[tokio::test]
    async fn test_fetch_failure_with_empty_cache_fails() {
        let service = service(StubSource::failing(), MemoryCache::default());

        let result = service.resolve_chart().await;
        assert!(matches!(
            result.unwrap_err(),
            ChartError::UpstreamUnavailable { .. }
        ));
    }

    #[tokio::test]
    async fn test_fetch_failure_with_failing_cache_read_fails() {
        let cache = MemoryCache {
            fail_reads: true,
            ..MemoryCache::default()
        };
        let service = service(StubSource::failing(), cache);

        let result = service.resolve_chart().await;
        assert!(matches!(
            result.unwrap_err(),
            ChartError::UpstreamUnavailable { .. }
        ));
    }

    #[tokio::test]
    async fn test_non_fetch_errors_propagate_without_fallback() {
        // A misconfigured source is not an outage; stale data must not
        // mask it even when the cache has a chart to serve
        let cache = MemoryCache::seeded(sample_raw());
        let source = StubSource::new(vec![Err(ChartError::invalid_config(
            "COA_LOGIN_URL is not a valid URL",
        ))]);
        let service = service(source, cache);

        let result = service.resolve_chart().await;
        assert!(matches!(
            result.unwrap_err(),
            ChartError::InvalidConfig { .. }
        ));
    }

    #[tokio::test]
    async fn test_empty_upstream_payload_falls_back() {
        let cache = MemoryCache::seeded(sample_raw());
        let service = service(StubSource::ok(Vec::new()), cache);

        let resolved = service.resolve_chart().await.unwrap();
        assert_eq!(resolved.origin, ChartOrigin::DurableCache);
    }

    #[tokio::test]
    async fn test_cache_write_failure_still_serves_response() {
        let cache = MemoryCache {
            fail_writes: true,
            ..MemoryCache::default()
        };
        let service = service(StubSource::ok(sample_raw()), cache);

        let resolved = service.resolve_chart().await.unwrap();
        assert_eq!(resolved.origin, ChartOrigin::Upstream);
        assert_eq!(resolved.raw, sample_raw());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_times_out_and_falls_back() {
        let cache = MemoryCache::seeded(sample_raw());
        let service = service(HangingSource, cache);

        let resolved = service.resolve_chart().await.unwrap();
        assert_eq!(resolved.origin, ChartOrigin::DurableCache);
    }

    #[tokio::test]
    async fn test_fallback_scenario_includes_no_program() {
        // Spec fallback scenario: cached {"990300": "Platform Infrastructure"}
        // plus the default-included No Program entry
        let cache = MemoryCache::seeded(sample_raw());
        let service = service(StubSource::failing(), cache);

        let payload = service
            .chart(&RequestOptions::default(), OutputMode::Accounts)
            .await
            .unwrap();

        assert_eq!(payload.origin, ChartOrigin::DurableCache);
        let pairs: Vec<(&str, &str)> = payload
            .entries
            .iter()
            .map(|e| (e.code.as_str(), e.label.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("000000", "No Program"),
                ("990300", "Platform Infrastructure"),
            ]
        );
    }

    #[tokio::test]
    async fn test_refresh_writes_unconditionally() {
        let cache = MemoryCache::seeded(sample_raw());
        let service = service(StubSource::ok(sample_raw()), cache);

        // Identical payload would be skipped on the request path, but
        // refresh always writes
        let record = service.refresh().await.unwrap();
        assert_eq!(record.raw, sample_raw());
        assert_eq!(service.cache.write_count(), 1);
    }

    #[tokio::test]
    async fn test_refresh_surfaces_fetch_failure() {
        let service = service(StubSource::failing(), MemoryCache::default());
        assert!(service.refresh().await.is_err());
    }

    #[tokio::test]
    async fn test_purge_removes_cache_record() {
        let cache = MemoryCache::seeded(sample_raw());
        let service = service(StubSource::failing(), cache);

        service.purge().await.unwrap();
        let cached = service.cache.read("chart-of-accounts").await.unwrap();
        assert!(cached.is_none());
    }
}

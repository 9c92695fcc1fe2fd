//! Collaborator seams for the cache orchestrator
//!
//! This module defines the trait abstractions over the two external
//! collaborators the orchestrator talks to: the upstream finance system and
//! the durable write-through cache. Keeping these behind traits is what
//! makes the orchestrator testable with in-memory stubs and keeps the
//! transform engine free of any I/O.

use async_trait::async_trait;

use crate::types::{CacheRecord, ChartError, RawChartOfAccounts};

/// Source of raw chart-of-accounts records
///
/// Treated as an opaque fetch that may fail or be slow. The orchestrator
/// bounds each call with its configured timeout; retries, if any, are the
/// implementation's concern.
#[async_trait]
pub trait RawAccountSource: Send + Sync {
    /// Fetch the raw chart of accounts from the upstream system
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream system is unreachable, rejects the
    /// credentials, or returns a payload that cannot be parsed into
    /// account records.
    async fn fetch_raw_accounts(&self) -> Result<RawChartOfAccounts, ChartError>;
}

/// Write-through, versioned store of the last-known-good raw response
///
/// Keyed by a fixed cache key. Every write is a full overwrite of the
/// canonical record (last-writer-wins); history of prior versions is an
/// external capability of the backing store, not managed here.
#[async_trait]
pub trait DurableCache: Send + Sync {
    /// Read the most recent cache record, if any
    ///
    /// A missing key is `Ok(None)`, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable or the read fails.
    async fn read(&self, key: &str) -> Result<Option<CacheRecord>, ChartError>;

    /// Overwrite the cache record for the given key
    ///
    /// # Errors
    ///
    /// Returns an error if the write does not complete; the caller treats
    /// this as non-fatal for the current response.
    async fn write(&self, key: &str, record: &CacheRecord) -> Result<(), ChartError>;

    /// Remove the cache record for the given key
    ///
    /// Purging a key that does not exist is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal fails.
    async fn purge(&self, key: &str) -> Result<(), ChartError>;
}

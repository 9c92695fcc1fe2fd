//! Account-related types for the chart-of-accounts API
//!
//! This module defines the raw account records as fetched from the upstream
//! finance system, the shaped output entries produced by the transform
//! engine, and the cache record persisted to the durable store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single raw account record from the upstream chart of accounts
///
/// Immutable once fetched; the canonical identity is `code`. Raw charts
/// routinely contain multiple records sharing a significant code prefix
/// (sub-tracking variants) as well as inactive records, so codes are not
/// unique in raw form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    /// Fixed-width numeric account code, e.g. "12345601"
    pub code: String,

    /// Human-friendly account name, e.g. "Platform Infrastructure"
    pub name: String,

    /// Whether the account is currently active and assignable
    pub active: bool,
}

impl AccountRecord {
    /// Create a new account record
    pub fn new(code: impl Into<String>, name: impl Into<String>, active: bool) -> Self {
        AccountRecord {
            code: code.into(),
            name: name.into(),
            active,
        }
    }
}

/// The raw chart of accounts, ordered as retrieved from the upstream
/// system or the durable cache
pub type RawChartOfAccounts = Vec<AccountRecord>;

/// A single shaped output entry
///
/// The `label` is the friendly account name in accounts mode, or the
/// composed tag string `"{name} / {code}"` in tags mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputEntry {
    pub code: String,
    pub label: String,
}

impl OutputEntry {
    pub fn new(code: impl Into<String>, label: impl Into<String>) -> Self {
        OutputEntry {
            code: code.into(),
            label: label.into(),
        }
    }
}

/// The record persisted to the durable cache
///
/// Created or fully overwritten on every successful upstream fetch, removed
/// only by an explicit purge. Prior versions remain addressable through the
/// external store's own history mechanism; this core only tracks the
/// current version id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// The raw upstream response, unmodified
    pub raw: RawChartOfAccounts,

    /// When the raw chart was fetched from upstream
    pub fetched_at: DateTime<Utc>,

    /// Opaque version id for this write
    pub version: Uuid,
}

impl CacheRecord {
    /// Create a cache record for a freshly fetched chart
    ///
    /// Stamps the record with the current time and a new version id.
    pub fn new(raw: RawChartOfAccounts) -> Self {
        CacheRecord {
            raw,
            fetched_at: Utc::now(),
            version: Uuid::new_v4(),
        }
    }
}

/// Where the raw chart backing a response came from
///
/// Reported to the HTTP layer so degraded (cache-fallback) responses can be
/// marked for downstream consumers without altering the payload shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartOrigin {
    /// Freshly fetched from the upstream finance system
    Upstream,

    /// Served from the durable cache after an upstream failure
    DurableCache,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_record_stamps_version_and_time() {
        let raw = vec![AccountRecord::new("990300", "Platform Infrastructure", true)];
        let a = CacheRecord::new(raw.clone());
        let b = CacheRecord::new(raw);

        assert_ne!(a.version, b.version);
        assert_eq!(a.raw, b.raw);
    }

    #[test]
    fn test_cache_record_roundtrips_through_json() {
        let record = CacheRecord::new(vec![
            AccountRecord::new("123456", "Duplicate 1", true),
            AccountRecord::new("54321", "Inactive", false),
        ]);

        let json = serde_json::to_string(&record).unwrap();
        let parsed: CacheRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}

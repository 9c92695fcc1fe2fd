//! Error types for the chart-of-accounts API
//!
//! This module defines all error types that can occur while resolving and
//! transforming the chart of accounts.
//!
//! # Error Categories
//!
//! - **Upstream Errors**: the finance system is unreachable, timed out, or
//!   returned a payload that cannot be parsed into account records
//! - **Cache Errors**: the durable cache could not be read or written;
//!   write failures are non-fatal for the current response
//! - **Configuration Errors**: a required environment variable is missing
//!   or malformed at startup
//!
//! Malformed query parameters are intentionally not represented here: the
//! options parser is total and degrades per-option to defaults.

use thiserror::Error;

/// Main error type for the chart-of-accounts service
///
/// This enum represents all possible errors that can occur while serving a
/// chart request. Each variant includes relevant context to help diagnose
/// and resolve the issue.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChartError {
    /// The upstream fetch failed and no durable fallback exists
    ///
    /// This is the only fatal error for a chart request; it surfaces to the
    /// caller as a 503.
    #[error("upstream unavailable and no cached chart exists: {message}")]
    UpstreamUnavailable {
        /// Description of the upstream failure
        message: String,
    },

    /// The upstream fetch succeeded but the payload could not be parsed
    ///
    /// Treated like a fetch failure: the orchestrator falls back to the
    /// durable cache.
    #[error("malformed upstream payload: {message}")]
    MalformedUpstreamData {
        /// Description of the parse failure
        message: String,
    },

    /// The upstream fetch did not complete within the configured timeout
    ///
    /// Treated like a fetch failure: the orchestrator falls back to the
    /// durable cache.
    #[error("upstream fetch timed out after {timeout_secs}s")]
    UpstreamTimeout {
        /// The timeout that elapsed, in seconds
        timeout_secs: u64,
    },

    /// The durable cache could not be read
    ///
    /// Only fatal when it coincides with an upstream failure; a successful
    /// fetch is served regardless.
    #[error("durable cache read failed for key '{key}': {message}")]
    CacheReadFailed {
        /// Cache key that failed to read
        key: String,
        /// Description of the read failure
        message: String,
    },

    /// The durable cache could not be written
    ///
    /// Non-fatal for the current response: the freshly fetched data is
    /// still served and the failure is logged.
    #[error("durable cache write failed for key '{key}': {message}")]
    CacheWriteFailed {
        /// Cache key that failed to write
        key: String,
        /// Description of the write failure
        message: String,
    },

    /// A required configuration value is missing or malformed
    ///
    /// Fatal at startup; never occurs while serving requests.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration problem
        message: String,
    },
}

// Helper functions for creating common errors

impl ChartError {
    /// Create an UpstreamUnavailable error
    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        ChartError::UpstreamUnavailable {
            message: message.into(),
        }
    }

    /// Create a MalformedUpstreamData error
    pub fn malformed_upstream(message: impl Into<String>) -> Self {
        ChartError::MalformedUpstreamData {
            message: message.into(),
        }
    }

    /// Create an UpstreamTimeout error
    pub fn upstream_timeout(timeout_secs: u64) -> Self {
        ChartError::UpstreamTimeout { timeout_secs }
    }

    /// Create a CacheReadFailed error
    pub fn cache_read_failed(key: &str, message: impl Into<String>) -> Self {
        ChartError::CacheReadFailed {
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// Create a CacheWriteFailed error
    pub fn cache_write_failed(key: &str, message: impl Into<String>) -> Self {
        ChartError::CacheWriteFailed {
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// Create an InvalidConfig error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        ChartError::InvalidConfig {
            message: message.into(),
        }
    }

    /// Whether this error counts as an upstream fetch failure
    ///
    /// Fetch failures trigger the durable-cache fallback path in the
    /// orchestrator.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            ChartError::UpstreamUnavailable { .. }
                | ChartError::MalformedUpstreamData { .. }
                | ChartError::UpstreamTimeout { .. }
        )
    }
}

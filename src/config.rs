//! Service configuration
//!
//! Configuration is loaded from environment variables with sensible
//! defaults for development; only the upstream credentials are required.
//! The resulting [`AppConfig`] is immutable and passed explicitly into the
//! components that need it, never held as ambient state.

use std::collections::HashMap;

use crate::core::TransformConfig;
use crate::source::UpstreamConfig;
use crate::types::ChartError;

/// Top-level service configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP server binds to
    pub bind: String,

    /// Directory for the filesystem durable cache
    pub cache_dir: String,

    /// Fixed key the raw chart is cached under
    pub cache_key: String,

    /// Edge-cache TTL for fresh responses, in seconds
    pub ttl_secs: u64,

    /// Edge-cache TTL for degraded responses, in seconds
    pub stale_ttl_secs: u64,

    /// Bound on the upstream fetch, in seconds
    pub fetch_timeout_secs: u64,

    /// Transform configuration
    pub transform: TransformConfig,

    /// Upstream client configuration
    pub upstream: UpstreamConfig,
}

impl AppConfig {
    /// Load configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` when a required variable is missing.
    ///
    /// Environment variables:
    /// - `COA_ORG`, `COA_USERNAME`, `COA_PASSWORD` (required) - upstream
    ///   credentials; populating these from a secrets store is the
    ///   deployment's concern
    /// - `COA_BIND` - bind address (default: `0.0.0.0:3000`)
    /// - `COA_CACHE_DIR` - durable cache directory (default: `./cache`)
    /// - `COA_CACHE_KEY` - cache key (default: `chart-of-accounts`)
    /// - `COA_TTL_SECS` - fresh-response edge TTL (default: 600)
    /// - `COA_STALE_TTL_SECS` - degraded-response edge TTL (default: 60)
    /// - `COA_FETCH_TIMEOUT_SECS` - upstream fetch bound (default: 11)
    /// - `COA_CODES_TO_OMIT` - comma-separated codes to drop (default: empty)
    /// - `COA_NO_PROGRAM_CODE` - synthetic code (default: `000000`)
    /// - `COA_OTHER_CODE` - synthetic code (default: `000001`)
    /// - `COA_SIGNIFICANT_DIGITS` - significant prefix length (default: 6)
    /// - `COA_DEDUP_ALWAYS_ON` - `true` to dedup without the query flag
    /// - `COA_SEGMENT` - upstream segment name (default: `Program`)
    /// - `COA_LOGIN_URL`, `COA_SEGMENTS_URL`, `COA_ACCOUNTS_URL`,
    ///   `COA_LOGOUT_URL` - upstream endpoints
    pub fn from_env() -> Result<Self, ChartError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Load configuration from an explicit variable map
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ChartError> {
        let org = required(vars, "COA_ORG")?;
        let username = required(vars, "COA_USERNAME")?;
        let password = required(vars, "COA_PASSWORD")?;

        let transform = TransformConfig {
            codes_to_omit: vars
                .get("COA_CODES_TO_OMIT")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|c| !c.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            no_program_code: string_or(vars, "COA_NO_PROGRAM_CODE", "000000"),
            other_code: string_or(vars, "COA_OTHER_CODE", "000001"),
            significant_digits: number_or(vars, "COA_SIGNIFICANT_DIGITS", 6) as usize,
            dedup_always_on: bool_or(vars, "COA_DEDUP_ALWAYS_ON", false),
        };

        let upstream = UpstreamConfig {
            login_url: string_or(
                vars,
                "COA_LOGIN_URL",
                "https://login.mip.com/api/v1/sso/mipadv/login",
            ),
            segments_url: string_or(
                vars,
                "COA_SEGMENTS_URL",
                "https://api.mip.com/api/coa/segments",
            ),
            accounts_url: string_or(
                vars,
                "COA_ACCOUNTS_URL",
                "https://api.mip.com/api/coa/segments/accounts",
            ),
            logout_url: string_or(
                vars,
                "COA_LOGOUT_URL",
                "https://api.mip.com/api/security/logout",
            ),
            org,
            username,
            password,
            segment_name: string_or(vars, "COA_SEGMENT", "Program"),
        };

        Ok(AppConfig {
            bind: string_or(vars, "COA_BIND", "0.0.0.0:3000"),
            cache_dir: string_or(vars, "COA_CACHE_DIR", "./cache"),
            cache_key: string_or(vars, "COA_CACHE_KEY", "chart-of-accounts"),
            ttl_secs: number_or(vars, "COA_TTL_SECS", 600),
            stale_ttl_secs: number_or(vars, "COA_STALE_TTL_SECS", 60),
            fetch_timeout_secs: number_or(vars, "COA_FETCH_TIMEOUT_SECS", 11),
            transform,
            upstream,
        })
    }
}

fn required(vars: &HashMap<String, String>, key: &str) -> Result<String, ChartError> {
    vars.get(key)
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| ChartError::invalid_config(format!("{key} must be set")))
}

fn string_or(vars: &HashMap<String, String>, key: &str, default: &str) -> String {
    vars.get(key)
        .filter(|v| !v.is_empty())
        .cloned()
        .unwrap_or_else(|| default.to_string())
}

fn number_or(vars: &HashMap<String, String>, key: &str, default: u64) -> u64 {
    vars.get(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn bool_or(vars: &HashMap<String, String>, key: &str, default: bool) -> bool {
    vars.get(key)
        .map(|v| v.to_lowercase() == "true")
        .unwrap_or(default)
}

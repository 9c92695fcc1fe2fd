//! HTTP client for the upstream finance system
//!
//! Implements the fetch as the upstream API requires it: log in with the
//! organization credentials to obtain an access token, list the chart
//! segments to find the configured segment id, fetch the accounts for that
//! segment, and log out. Logout always runs, even when the fetch fails:
//! logging in a second time without logging out locks the API account.
//!
//! Transient failures are retried with backoff. The fetch calls get a short
//! exponential schedule; logout gets a longer one, since an abandoned
//! session locks the account and is worth waiting out a network blip for.
//!
//! Credential values arrive through [`UpstreamConfig`]; retrieving them
//! from a secrets store is the deployment's concern, not this client's.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::RawAccountSource;
use crate::types::{AccountRecord, ChartError, RawChartOfAccounts};

/// Delays between fetch attempts, in seconds (exponential)
const FETCH_BACKOFF_SECS: &[u64] = &[1, 2, 4];

/// Delays between logout attempts, in seconds (fibonacci)
const LOGOUT_BACKOFF_SECS: &[u64] = &[1, 1, 2, 3, 5, 8];

/// Run an operation with a bounded backoff schedule
///
/// The operation runs once, then once more after each delay in the
/// schedule until it succeeds. The last error is returned when the
/// schedule is exhausted.
async fn with_backoff<T, F, Fut>(delays: &[u64], mut op: F) -> Result<T, ChartError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ChartError>>,
{
    let mut last_err = match op().await {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    for &delay in delays {
        warn!(error = %last_err, delay_secs = delay, "upstream call failed, retrying");
        tokio::time::sleep(Duration::from_secs(delay)).await;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => last_err = err,
        }
    }

    Err(last_err)
}

/// Configuration for the upstream client
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Login endpoint (POST, returns the access token)
    pub login_url: String,

    /// Chart-segments endpoint (GET)
    pub segments_url: String,

    /// Segment-accounts endpoint (GET)
    pub accounts_url: String,

    /// Logout endpoint (POST)
    pub logout_url: String,

    /// Organization name sent with the login request
    pub org: String,

    /// API username
    pub username: String,

    /// API password
    pub password: String,

    /// Segment whose accounts make up the chart, e.g. "Program"
    pub segment_name: String,
}

/// Upstream finance-system client
pub struct HttpAccountSource {
    client: reqwest::Client,
    config: UpstreamConfig,
}

impl HttpAccountSource {
    /// Create a client for the given upstream configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: UpstreamConfig) -> Result<Self, ChartError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(4))
            .build()
            .map_err(|e| ChartError::invalid_config(e.to_string()))?;
        Ok(HttpAccountSource { client, config })
    }

    /// Log in and obtain an access token, retrying transient failures
    async fn login(&self) -> Result<String, ChartError> {
        info!("logging in to upstream API");
        with_backoff(FETCH_BACKOFF_SECS, move || self.try_login()).await
    }

    async fn try_login(&self) -> Result<String, ChartError> {
        let credentials = LoginRequest {
            username: &self.config.username,
            password: &self.config.password,
            org: &self.config.org,
        };

        let response = self
            .client
            .post(&self.config.login_url)
            .json(&credentials)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ChartError::upstream_unavailable(e.to_string()))?;

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| ChartError::malformed_upstream(e.to_string()))?;
        Ok(login.access_token)
    }

    /// Log out, best-effort
    ///
    /// Retried on a longer schedule than the fetch calls: an abandoned
    /// session locks the API account on the next login, so a transient
    /// failure here is worth waiting out. The final failure is logged but
    /// never propagated; the fetch result stands either way.
    async fn logout(&self, token: &str) {
        info!("logging out of upstream API");
        let result = with_backoff(LOGOUT_BACKOFF_SECS, move || self.try_logout(token)).await;
        if let Err(err) = result {
            warn!(error = %err, "upstream logout failed, session left open");
        }
    }

    async fn try_logout(&self, token: &str) -> Result<(), ChartError> {
        self.client
            .post(&self.config.logout_url)
            .header("Authorization-Token", token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ChartError::upstream_unavailable(e.to_string()))?;
        Ok(())
    }

    /// Find the id of the configured segment, retrying transient failures
    async fn segment_id(&self, token: &str) -> Result<i64, ChartError> {
        debug!(segment = %self.config.segment_name, "listing chart segments");
        let segments = with_backoff(FETCH_BACKOFF_SECS, move || self.try_segments(token)).await?;
        find_segment_id(&segments, &self.config.segment_name)
    }

    async fn try_segments(&self, token: &str) -> Result<SegmentListResponse, ChartError> {
        let response = self
            .client
            .get(&self.config.segments_url)
            .header("Authorization-Token", token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ChartError::upstream_unavailable(e.to_string()))?;

        response
            .json()
            .await
            .map_err(|e| ChartError::malformed_upstream(e.to_string()))
    }

    /// Fetch the accounts for the given segment, retrying transient failures
    async fn segment_accounts(
        &self,
        token: &str,
        segment_id: i64,
    ) -> Result<RawChartOfAccounts, ChartError> {
        debug!(segment_id, "fetching chart of accounts");
        let accounts = with_backoff(FETCH_BACKOFF_SECS, move || self.try_accounts(token)).await?;
        Ok(map_segment_accounts(&accounts, segment_id))
    }

    async fn try_accounts(&self, token: &str) -> Result<AccountListResponse, ChartError> {
        let response = self
            .client
            .get(&self.config.accounts_url)
            .header("Authorization-Token", token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ChartError::upstream_unavailable(e.to_string()))?;

        response
            .json()
            .await
            .map_err(|e| ChartError::malformed_upstream(e.to_string()))
    }
}

#[async_trait]
impl RawAccountSource for HttpAccountSource {
    async fn fetch_raw_accounts(&self) -> Result<RawChartOfAccounts, ChartError> {
        let token = self.login().await?;

        // Hold the fetch result so logout runs on both paths
        let result = match self.segment_id(&token).await {
            Ok(segment_id) => self.segment_accounts(&token, segment_id).await,
            Err(err) => Err(err),
        };

        self.logout(&token).await;
        result
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    org: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(rename = "AccessToken")]
    access_token: String,
}

// The upstream API reuses the key `COA_SEGID` both as the top-level key
// mapped to the list of definitions and as a sub-key within each definition
// carrying the specific segment id.

#[derive(Debug, Deserialize)]
struct SegmentListResponse {
    #[serde(rename = "COA_SEGID")]
    segments: Vec<SegmentDefinition>,
}

#[derive(Debug, Deserialize)]
struct SegmentDefinition {
    #[serde(rename = "TITLE")]
    title: String,
    #[serde(rename = "COA_SEGID")]
    id: i64,
}

#[derive(Debug, Deserialize)]
struct AccountListResponse {
    #[serde(rename = "COA_SEGID")]
    accounts: Vec<AccountDefinition>,
}

#[derive(Debug, Deserialize)]
struct AccountDefinition {
    #[serde(rename = "COA_SEGID")]
    segment_id: i64,
    #[serde(rename = "COA_CODE")]
    code: String,
    #[serde(rename = "COA_TITLE")]
    title: String,
    #[serde(rename = "COA_STATUS")]
    status: String,
}

/// Find the id of the named segment in the segment listing
fn find_segment_id(segments: &SegmentListResponse, name: &str) -> Result<i64, ChartError> {
    segments
        .segments
        .iter()
        .find(|s| s.title == name)
        .map(|s| s.id)
        .ok_or_else(|| ChartError::malformed_upstream(format!("segment '{name}' not found")))
}

/// Map the account listing to raw records for one segment
///
/// Status "A" marks an active account; the inactive filter itself belongs
/// to the transform, so inactive records are kept with `active = false`.
fn map_segment_accounts(accounts: &AccountListResponse, segment_id: i64) -> RawChartOfAccounts {
    accounts
        .accounts
        .iter()
        .filter(|a| a.segment_id == segment_id)
        .map(|a| AccountRecord::new(&a.code, &a.title, a.status == "A"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment_fixture() -> SegmentListResponse {
        serde_json::from_str(
            r#"{"COA_SEGID": [
                {"TITLE": "GL", "COA_SEGID": 1},
                {"TITLE": "Program", "COA_SEGID": 2}
            ]}"#,
        )
        .unwrap()
    }

    fn account_fixture() -> AccountListResponse {
        serde_json::from_str(
            r#"{"COA_SEGID": [
                {"COA_SEGID": 2, "COA_CODE": "990300", "COA_TITLE": "Platform Infrastructure", "COA_STATUS": "A"},
                {"COA_SEGID": 2, "COA_CODE": "54321", "COA_TITLE": "Inactive", "COA_STATUS": "I"},
                {"COA_SEGID": 1, "COA_CODE": "700000", "COA_TITLE": "GL Account", "COA_STATUS": "A"}
            ]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_find_segment_id_by_title() {
        assert_eq!(find_segment_id(&segment_fixture(), "Program").unwrap(), 2);
    }

    #[test]
    fn test_missing_segment_is_malformed_upstream() {
        let result = find_segment_id(&segment_fixture(), "Fund");
        assert!(matches!(
            result.unwrap_err(),
            ChartError::MalformedUpstreamData { .. }
        ));
    }

    #[test]
    fn test_map_accounts_filters_to_segment() {
        let raw = map_segment_accounts(&account_fixture(), 2);
        assert_eq!(
            raw,
            vec![
                AccountRecord::new("990300", "Platform Infrastructure", true),
                AccountRecord::new("54321", "Inactive", false),
            ]
        );
    }

    #[test]
    fn test_login_response_shape() {
        let login: LoginResponse =
            serde_json::from_str(r#"{"AccessToken": "abc123"}"#).unwrap();
        assert_eq!(login.access_token, "abc123");
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_returns_first_success_immediately() {
        let attempts = std::cell::Cell::new(0u32);

        let result = with_backoff(FETCH_BACKOFF_SECS, || {
            attempts.set(attempts.get() + 1);
            async { Ok("token") }
        })
        .await;

        assert_eq!(result.unwrap(), "token");
        assert_eq!(attempts.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_recovers_from_transient_failure() {
        let attempts = std::cell::Cell::new(0u32);

        let result = with_backoff(FETCH_BACKOFF_SECS, || {
            attempts.set(attempts.get() + 1);
            let attempt = attempts.get();
            async move {
                if attempt < 2 {
                    Err(ChartError::upstream_unavailable("connection reset"))
                } else {
                    Ok("token")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "token");
        assert_eq!(attempts.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_exhausts_schedule_and_returns_last_error() {
        let attempts = std::cell::Cell::new(0u32);

        let result: Result<(), ChartError> = with_backoff(FETCH_BACKOFF_SECS, || {
            attempts.set(attempts.get() + 1);
            async { Err(ChartError::upstream_unavailable("connection refused")) }
        })
        .await;

        assert!(matches!(
            result.unwrap_err(),
            ChartError::UpstreamUnavailable { .. }
        ));
        // One initial attempt plus one per scheduled delay
        assert_eq!(attempts.get() as usize, FETCH_BACKOFF_SECS.len() + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_schedule_outlasts_fetch_schedule() {
        // The logout schedule waits longer in total than the fetch schedule,
        // since an abandoned session locks the account
        let fetch_total: u64 = FETCH_BACKOFF_SECS.iter().sum();
        let logout_total: u64 = LOGOUT_BACKOFF_SECS.iter().sum();
        assert!(logout_total > fetch_total);
    }
}

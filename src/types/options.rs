//! Request options parsed from query-string parameters
//!
//! The parser is a total function: any unrecognized or malformed value
//! degrades to the per-option default rather than failing the request.
//! The upstream-facing API gateway strips cookies and headers, so the
//! query string fully determines the options.

use std::collections::HashMap;

/// Validated, typed projection of the query-string parameters
///
/// Every field has a well-defined default so that the empty query string is
/// always valid. Boolean parameters follow the "on/yes/true" convention of
/// the consuming provisioning tooling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    /// Include the synthetic "Other" entry (`show_other_code`)
    pub include_other_code: bool,

    /// Include the synthetic "No Program" entry (negated `hide_no_program_code`)
    pub include_no_program_code: bool,

    /// Include inactive account codes (`show_inactive_codes`)
    pub include_inactive: bool,

    /// Codes to move to the front of the output, in the given order
    /// (`priority_codes`, comma-separated)
    pub priority_codes: Vec<String>,

    /// Truncate the output to this many entries; 0 means unlimited (`limit`)
    pub limit: usize,

    /// Opt in to significant-prefix deduplication in accounts mode
    /// (`enable_code_filter`)
    pub enable_code_filter: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        RequestOptions {
            include_other_code: false,
            include_no_program_code: true,
            include_inactive: false,
            priority_codes: Vec::new(),
            limit: 0,
            enable_code_filter: false,
        }
    }
}

impl RequestOptions {
    /// Parse request options from a query-string map
    ///
    /// Absent keys take their defaults. Malformed values fail closed: an
    /// unparseable `limit` becomes 0, a boolean with an unrecognized value
    /// becomes false. This method never fails.
    pub fn from_query(params: &HashMap<String, String>) -> Self {
        RequestOptions {
            include_other_code: param_bool(params, "show_other_code"),
            include_no_program_code: !param_bool(params, "hide_no_program_code"),
            include_inactive: param_bool(params, "show_inactive_codes"),
            priority_codes: param_code_list(params, "priority_codes"),
            limit: param_limit(params, "limit"),
            enable_code_filter: param_bool(params, "enable_code_filter"),
        }
    }
}

/// Parse a boolean parameter
///
/// True only when the value case-insensitively matches one of
/// `on`, `yes`, `true`; absence or any other value is false.
fn param_bool(params: &HashMap<String, String>, key: &str) -> bool {
    match params.get(key) {
        Some(value) => matches!(value.to_lowercase().as_str(), "on" | "yes" | "true"),
        None => false,
    }
}

/// Parse a comma-separated list of codes
///
/// Entries are trimmed, empty entries discarded, order preserved, and the
/// first occurrence wins for duplicates.
fn param_code_list(params: &HashMap<String, String>, key: &str) -> Vec<String> {
    let Some(value) = params.get(key) else {
        return Vec::new();
    };

    let mut codes: Vec<String> = Vec::new();
    for entry in value.split(',') {
        let code = entry.trim();
        if code.is_empty() || codes.iter().any(|c| c == code) {
            continue;
        }
        codes.push(code.to_string());
    }
    codes
}

/// Parse a non-negative integer parameter, degrading to 0 on failure
fn param_limit(params: &HashMap<String, String>, key: &str) -> usize {
    let Some(value) = params.get(key) else {
        return 0;
    };

    match value.trim().parse::<usize>() {
        Ok(limit) => limit,
        Err(_) => {
            tracing::debug!(%key, %value, "ignoring malformed integer parameter");
            0
        }
    }
}

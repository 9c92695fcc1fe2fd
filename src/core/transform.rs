//! Pure transform pipeline for the chart of accounts
//!
//! This module turns a raw chart of accounts plus parsed request options
//! into the shaped, ordered output served by the API. The pipeline runs in
//! a fixed order:
//!
//! 1. Drop inactive records (tags mode drops them unconditionally)
//! 2. Drop records whose code is configured to be omitted
//! 3. Deduplicate by significant code prefix
//! 4. Inject the synthetic "No Program" / "Other" entries
//! 5. Shape entries for the requested mode
//! 6. Order: synthetics, then priority codes, then ascending numeric
//! 7. Apply the output limit
//!
//! The transform is a pure function over its inputs: no I/O, no shared
//! state, and identical inputs always yield identical, order-stable output.
//! Malformed records (non-numeric codes) pass through rather than failing.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::types::{AccountRecord, OutputEntry, RequestOptions};

/// Characters disallowed by the downstream tag consumers; stripped from
/// names in both modes so the two listings stay consistent.
static DISALLOWED_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\d\w\s.:/=+\-@]+").expect("sanitizer regex is valid"));

/// Maximum length of the name portion of a tag label; the composed tag
/// value must stay under the 256-character tag limit.
const TAG_NAME_MAX_LEN: usize = 245;

/// Output shaping mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Emit `{code, name}` pairs for the accounts listing
    Accounts,

    /// Emit `{code, "{name} / {code}"}` tag strings; inactive codes are
    /// excluded unconditionally since tags are only meaningful for
    /// currently assignable programs
    Tags,
}

/// Immutable transform configuration
///
/// Constructed once at startup and passed explicitly into the transform;
/// never ambient state.
#[derive(Debug, Clone)]
pub struct TransformConfig {
    /// Codes dropped from the output unconditionally, matched against both
    /// the full code and its significant prefix
    pub codes_to_omit: HashSet<String>,

    /// Code of the synthetic "No Program" entry
    pub no_program_code: String,

    /// Code of the synthetic "Other" entry
    pub other_code: String,

    /// Number of leading digits that carry semantic identity; trailing
    /// digits are sub-tracking discriminators
    pub significant_digits: usize,

    /// When set, accounts mode deduplicates even without
    /// `enable_code_filter` in the request
    pub dedup_always_on: bool,
}

impl Default for TransformConfig {
    fn default() -> Self {
        TransformConfig {
            codes_to_omit: HashSet::new(),
            no_program_code: "000000".to_string(),
            other_code: "000001".to_string(),
            significant_digits: 6,
            dedup_always_on: false,
        }
    }
}

impl TransformConfig {
    /// The significant prefix of a code
    ///
    /// The leading `significant_digits` characters, or the whole code when
    /// it is shorter (or slicing would split a character).
    fn significant_prefix<'a>(&self, code: &'a str) -> &'a str {
        code.get(..self.significant_digits).unwrap_or(code)
    }
}

/// Transform a raw chart of accounts into shaped, ordered output entries
///
/// This is the single entry point of the transform engine. It never fails:
/// well-formed input always produces a complete, internally consistent
/// result, and malformed codes pass through unfiltered.
pub fn transform(
    raw: &[AccountRecord],
    options: &RequestOptions,
    mode: OutputMode,
    config: &TransformConfig,
) -> Vec<OutputEntry> {
    // Steps 1-2: drop inactive and omitted records
    let include_inactive = options.include_inactive && mode == OutputMode::Accounts;
    let mut records: Vec<AccountRecord> = raw
        .iter()
        .filter(|r| r.active || include_inactive)
        .filter(|r| !is_omitted(r, config))
        .cloned()
        .collect();

    // Step 3: deduplicate by significant prefix; the output code becomes
    // the truncated prefix. Tags identity is the prefix, so tags mode
    // always deduplicates.
    let dedup = mode == OutputMode::Tags || config.dedup_always_on || options.enable_code_filter;
    if dedup {
        records = dedup_by_prefix(records, config);
    }

    // Step 4: inject synthetic entries, overriding same-code records
    if options.include_no_program_code {
        inject_synthetic(&mut records, &config.no_program_code, "No Program");
    }
    if options.include_other_code {
        inject_synthetic(&mut records, &config.other_code, "Other");
    }

    // Step 5: shape by mode
    let mut entries: Vec<OutputEntry> = records.iter().map(|r| shape(r, mode)).collect();

    // Step 6: order, then step 7: limit
    entries = order_entries(entries, options, config);
    if options.limit > 0 {
        entries.truncate(options.limit);
    }

    entries
}

/// Whether a record is configured to be omitted
///
/// Matches against the full code and the significant prefix, so omitting
/// "123456" also drops its sub-tracking variants.
fn is_omitted(record: &AccountRecord, config: &TransformConfig) -> bool {
    config.codes_to_omit.contains(&record.code)
        || config
            .codes_to_omit
            .contains(config.significant_prefix(&record.code))
}

/// Deduplicate records by significant prefix, first record wins
///
/// The surviving record's code is truncated to the prefix. Input order is
/// stable, so the tie-break is deterministic.
fn dedup_by_prefix(records: Vec<AccountRecord>, config: &TransformConfig) -> Vec<AccountRecord> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut deduped = Vec::with_capacity(records.len());

    for mut record in records {
        let prefix = config.significant_prefix(&record.code).to_string();
        if !seen.insert(prefix.clone()) {
            tracing::debug!(code = %record.code, %prefix, "dropping duplicate of significant prefix");
            continue;
        }
        record.code = prefix;
        deduped.push(record);
    }

    deduped
}

/// Inject a synthetic entry, replacing any existing record with the same code
fn inject_synthetic(records: &mut Vec<AccountRecord>, code: &str, name: &str) {
    records.retain(|r| r.code != code);
    records.push(AccountRecord::new(code, name, true));
}

/// Shape a single record for the requested output mode
fn shape(record: &AccountRecord, mode: OutputMode) -> OutputEntry {
    let name = sanitize_name(&record.name);
    match mode {
        OutputMode::Accounts => OutputEntry::new(&record.code, name),
        OutputMode::Tags => {
            let name = truncate_chars(&name, TAG_NAME_MAX_LEN);
            OutputEntry::new(&record.code, format!("{} / {}", name, record.code))
        }
    }
}

/// Strip characters the downstream tag consumers reject
fn sanitize_name(name: &str) -> String {
    DISALLOWED_NAME_CHARS.replace_all(name, "").into_owned()
}

/// Truncate a string to at most `max` characters on a char boundary
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Order entries: synthetics first, then priority codes in the given
/// order, then the remainder ascending by numeric code
///
/// The synthetic No-Program/Other codes are implicitly prioritized ahead
/// of any explicit priority codes. Non-numeric codes sort after numeric
/// ones, lexicographically.
fn order_entries(
    entries: Vec<OutputEntry>,
    options: &RequestOptions,
    config: &TransformConfig,
) -> Vec<OutputEntry> {
    let mut remaining = entries;
    remaining.sort_by_key(|e| numeric_sort_key(&e.code));

    let mut front_codes: Vec<&str> = vec![&config.no_program_code, &config.other_code];
    front_codes.extend(
        options
            .priority_codes
            .iter()
            .map(String::as_str)
            .filter(|c| *c != config.no_program_code && *c != config.other_code),
    );

    let mut ordered = Vec::with_capacity(remaining.len());
    for code in front_codes {
        if let Some(pos) = remaining.iter().position(|e| e.code == code) {
            ordered.push(remaining.remove(pos));
        }
    }
    ordered.extend(remaining);
    ordered
}

/// Sort key placing numeric codes first in ascending order, then
/// non-numeric codes lexicographically
fn numeric_sort_key(code: &str) -> (u8, u64, String) {
    match code.parse::<u64>() {
        Ok(n) => (0, n, code.to_string()),
        Err(_) => (1, 0, code.to_string()),
    }
}

//! Core data types for the chart-of-accounts API
//!
//! This module defines the account records fetched from the upstream finance
//! system, the typed request options parsed from query strings, the cache
//! record persisted to the durable store, and the error taxonomy used
//! throughout the service.

pub mod account;
pub mod error;
pub mod options;

pub use account::{AccountRecord, CacheRecord, ChartOrigin, OutputEntry, RawChartOfAccounts};
pub use error::ChartError;
pub use options::RequestOptions;

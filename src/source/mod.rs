//! Raw account source implementations
//!
//! The orchestrator only sees the [`crate::core::RawAccountSource`] seam;
//! this module provides the HTTP client for the upstream finance system.

pub mod http;

pub use http::{HttpAccountSource, UpstreamConfig};

//! Chart-of-Accounts API Library
//! # Overview
//!
//! This library serves a transformed chart of accounts derived from a
//! third-party finance system, optimized for high edge-cache hit rates and
//! resilience to upstream outages.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (AccountRecord, RequestOptions, errors)
//! - [`core`] - Business logic components:
//!   - [`core::transform`] - the pure transform pipeline
//!   - [`core::orchestrator`] - fetch/fallback/write-through orchestration
//!   - [`core::traits`] - collaborator seams for the upstream source and
//!     the durable cache
//! - [`source`] - HTTP client for the upstream finance system
//! - [`cache`] - filesystem-backed durable cache
//! - [`http`] - axum router and handlers
//! - [`config`] - environment-based configuration
//! - [`cli`] - CLI argument parsing
//!
//! # Caching Protocol
//!
//! Two independent tiers with distinct consistency guarantees:
//!
//! - **Edge cache** (external): a request-path cache keyed by path that
//!   serves hits without invoking this service at all; bounded by the
//!   `Cache-Control` max-age this service emits.
//! - **Durable cache**: a write-through store of the last-known-good raw
//!   upstream response, overwritten on every successful fetch and used as
//!   the fallback source of truth during upstream outages.

// Module declarations
pub mod cache;
pub mod cli;
pub mod config;
pub mod core;
pub mod http;
pub mod source;
pub mod types;

pub use cache::FsCache;
pub use config::AppConfig;
pub use core::{transform, ChartPayload, ChartService, DurableCache, OutputMode, RawAccountSource, TransformConfig};
pub use http::{router, AppState};
pub use source::{HttpAccountSource, UpstreamConfig};
pub use types::{AccountRecord, CacheRecord, ChartError, ChartOrigin, OutputEntry, RequestOptions};

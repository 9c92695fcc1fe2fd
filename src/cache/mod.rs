//! Durable cache implementations
//!
//! The orchestrator only sees the [`crate::core::DurableCache`] seam; this
//! module provides the filesystem-backed implementation used by the server
//! binary.

pub mod fs;

pub use fs::FsCache;

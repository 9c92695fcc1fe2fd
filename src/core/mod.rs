//! Business logic components
//!
//! - [`traits`] - collaborator seams (upstream source, durable cache)
//! - [`transform`] - the pure transform pipeline
//! - [`orchestrator`] - per-request fetch/fallback/write-through flow

pub mod orchestrator;
pub mod traits;
pub mod transform;

pub use orchestrator::{ChartPayload, ChartService, ResolvedChart};
pub use traits::{DurableCache, RawAccountSource};
pub use transform::{transform, OutputMode, TransformConfig};

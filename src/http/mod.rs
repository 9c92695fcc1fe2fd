//! HTTP surface: axum router, handlers, and error mapping

pub mod error;
pub mod routes;

pub use error::ApiError;
pub use routes::{router, AppState};

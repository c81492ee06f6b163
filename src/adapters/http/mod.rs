//! HTTP adapter (axum). Exposes the use cases as JSON endpoints.

pub mod error;
pub mod handlers;
pub mod router;

pub use error::AppError;
pub use router::{AppState, build_router};

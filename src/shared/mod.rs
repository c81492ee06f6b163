//! Cross-cutting pieces shared by adapters and use cases.

pub mod config;

pub use config::{AggregationOptions, AppConfig, GhlClientConfig};

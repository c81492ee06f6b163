//! GoHighLevel CRM adapters. Implement CrmGateway.
//!
//! `GhlGateway` talks to the real REST API; `MockCrmGateway` serves canned data.

pub mod client;
pub mod mapper;
pub mod mock_gateway;

pub use client::GhlGateway;
pub use mock_gateway::{MockCrmGateway, MockRecording};

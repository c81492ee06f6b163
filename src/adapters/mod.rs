//! Infrastructure adapters. Implement ports.
//!
//! CRM REST client, recording storage, HTTP server, terminal UI. Map errors to DomainError.

pub mod ghl;
pub mod http;
pub mod storage;
pub mod ui;

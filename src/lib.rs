//! ghl-recordings: GoHighLevel call-recordings dashboard backend with Hexagonal Architecture.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod shared;
pub mod usecases;

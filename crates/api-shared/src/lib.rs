//! # API Shared
//!
//! Shared definitions for the CareCard APIs.
//!
//! Contains:
//! - JSON request and response types (`types` module), with OpenAPI schemas
//! - Shared services like `HealthService`
//!
//! Used by `api-rest` and the workspace's main binary.

pub mod health;
pub mod types;

pub use health::HealthService;
pub use types::*;

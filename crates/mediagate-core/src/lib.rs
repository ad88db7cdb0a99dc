//! `mediagate` Core Library
//!
//! Shared functionality for `mediagate` components:
//! - Mapping between web media resources and OS permissions
//! - Wire types exchanged with the embedded web layer
//! - Configuration resolution and hierarchy
//! - Common error types

pub mod config;
pub mod error;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod resource;
pub mod tracing_init;
pub mod web;

pub use config::Config;
pub use error::{Error, Result};
pub use resource::{MediaResource, OsPermission};

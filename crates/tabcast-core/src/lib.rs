//! tabcast Core Library
//!
//! Shared functionality for tabcast components:
//! - Configuration resolution (settings file + environment)
//! - Common error types
//! - Tracing/logging initialization

pub mod config;
pub mod error;
pub mod tracing_init;

pub use config::Config;
pub use error::{Error, Result};
pub use tracing_init::init_tracing;

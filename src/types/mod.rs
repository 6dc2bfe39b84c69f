//! Core types for protofix.
//!
//! - **Errors**: Application error types with thiserror derives
//! - **Config**: Configuration structures for the compiler, post-processor, and logging

mod config;
mod errors;

pub use config::{CompilerConfig, Config, ObservabilityConfig, PostProcessConfig};
pub use errors::{Error, Result};

//! Domain model for probe-scope
//!
//! This module contains core domain types and errors that provide:
//! - A single value representation for both event streams
//! - An ordered property bag with explicit merge semantics
//! - Structured error handling

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{ArgType, Pid, Properties, Value};

pub use errors::{CaptureError, ConfigError, ToolError, TraceLogError};

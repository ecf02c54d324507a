//! Structured error types for probe-scope
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! None of these are recovered from; the binary reports them and exits.

use super::types::ArgType;
use std::path::PathBuf;
use thiserror::Error;

/// Probe descriptor does not agree with the discovered probe schema
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Probe not found: {0}")]
    ProbeNotFound(String),

    #[error("Invalid argument position for {probe}.{arg}: {position} (probe has {count} slots)")]
    InvalidPosition { probe: String, arg: String, position: usize, count: usize },

    #[error("Invalid type for {probe}.{arg}: {ty}")]
    InvalidType { probe: String, arg: String, ty: ArgType },
}

/// A capture line of a known probe could not be decoded
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Unexpected argument {arg} for probe {probe}")]
    UnexpectedArgument { probe: String, arg: String },

    #[error("Malformed argument {token:?} for probe {probe}")]
    MalformedArgument { probe: String, token: String },

    #[error("Invalid value {value:?} for {probe}.{arg}")]
    InvalidValue { probe: String, arg: String, value: String },
}

#[derive(Error, Debug)]
pub enum TraceLogError {
    #[error("Unknown tracepoint id: {0}")]
    UnknownTracepoint(u32),

    #[error("Unknown argument type {ty} for tracepoint {tpoint}")]
    UnknownArgType { tpoint: String, ty: u32 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// An external helper (source lister, live-attachment helper) failed
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited abnormally ({status})")]
    Failed { tool: String, status: std::process::ExitStatus },

    #[error("Failed to prepare probe script {path}: {source}")]
    Script {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

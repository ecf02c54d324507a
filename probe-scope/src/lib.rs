//! # Probe Scope - USDT-assisted SPDK trace annotation
//!
//! SPDK writes a high-volume tracepoint log about itself, but its entries
//! only carry raw pointers for the objects involved. Probe Scope captures a
//! second, low-volume stream of USDT probe firings with bpftrace, rebuilds
//! object lifetimes from it and prints the trace log with those pointers
//! expanded into the objects' properties.
//!
//! ## Architecture Overview
//!
//! ```text
//!   source tree ──▶ probes::registry ──▶ probes::descriptor ──▶ bpftrace script
//!                                              │                      │
//!                                              ▼                      ▼ (probes::record)
//!                                       probes::capture ◀──── captured probe output
//!                                              │
//!                                              ▼
//!                                     lifetime::tracker ──┐
//!                                                         ▼
//!   spdk_trace --json ──▶ trace_data ──────────────▶ report ──▶ stdout
//! ```
//!
//! ## Module Structure
//!
//! - [`probes`]: probe discovery, descriptors, script generation, capture parsing, recording
//! - [`trace_data`]: JSON trace log loading
//! - [`lifetime`]: object kind configuration and lifetime reconstruction
//! - [`report`]: annotation merging and line formatting
//! - [`domain`]: shared value types and errors
//! - [`cli`]: command-line arguments
//!
//! ## Typical Usage
//!
//! ```bash
//! # Record probe firings while the target runs (Ctrl+C to stop)
//! sudo ./probe-scope --record <PID> > probes.txt
//!
//! # Annotate the trace log taken from the same run
//! ./probe-scope --input trace.json --bpftrace probes.txt
//! ```

pub mod cli;
pub mod domain;
pub mod lifetime;
pub mod probes;
pub mod report;
pub mod trace_data;

//! Probe side of the pipeline
//!
//! - `registry`: discover which probes exist in the instrumented source tree
//! - `descriptor`: typed probe definitions, validation and script generation
//! - `capture`: parse captured probe output into sorted entries
//! - `record`: drive the live-attachment helper

pub mod capture;
pub mod descriptor;
pub mod record;
pub mod registry;

pub use capture::{parse, ProbeEntry};
pub use descriptor::{ProbeArgument, ProbeDescriptor, ProbeSet, TSC_ARG};
pub use record::record;
pub use registry::{discover, GitLister, ProbeRegistry, SourceLister};

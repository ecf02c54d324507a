//! Probe schema discovery
//!
//! Scans the instrumented program's source tree for `SPDK_DTRACE_PROBE*_TICKS`
//! invocations and records how many argument slots each probe exposes.
//! Slot 0 is always the tick counter the `_TICKS` macros inject, so a
//! probe invoked with N arguments after its name has N + 1 slots.

use log::{debug, info};
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use crate::domain::ToolError;

/// File defining the probe macros themselves; never scanned
pub const EXCLUDED_FILE: &str = "include/spdk_internal/usdt.h";

/// Lists the candidate source files under a root directory
///
/// Returned paths are relative to `root`.
pub trait SourceLister {
    fn list(&self, root: &Path) -> Result<Vec<PathBuf>, ToolError>;
}

/// Lists files tracked by git (`git ls-files`)
#[derive(Debug, Default, Clone, Copy)]
pub struct GitLister;

impl SourceLister for GitLister {
    fn list(&self, root: &Path) -> Result<Vec<PathBuf>, ToolError> {
        let output = Command::new("git")
            .arg("-C")
            .arg(root)
            .arg("ls-files")
            .output()
            .map_err(|source| ToolError::Spawn { tool: "git ls-files".to_string(), source })?;

        if !output.status.success() {
            return Err(ToolError::Failed {
                tool: "git ls-files".to_string(),
                status: output.status,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .collect())
    }
}

/// Probe name -> number of argument slots (including the tick counter)
#[derive(Debug, Clone, Default)]
pub struct ProbeRegistry {
    probes: HashMap<String, usize>,
}

impl ProbeRegistry {
    /// Number of slots for `probe`, or `None` if it was never discovered
    #[must_use]
    pub fn arg_count(&self, probe: &str) -> Option<usize> {
        self.probes.get(probe).copied()
    }

    #[must_use]
    pub fn contains(&self, probe: &str) -> bool {
        self.probes.contains_key(probe)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.probes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// Probes sorted by name
    #[must_use]
    pub fn sorted(&self) -> Vec<(&str, usize)> {
        let mut probes: Vec<_> = self.probes.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        probes.sort_unstable();
        probes
    }
}

impl FromIterator<(String, usize)> for ProbeRegistry {
    fn from_iter<I: IntoIterator<Item = (String, usize)>>(iter: I) -> Self {
        Self { probes: iter.into_iter().collect() }
    }
}

fn probe_macro() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"SPDK_DTRACE_PROBE\d*_TICKS\(").expect("valid probe regex"))
}

/// Discover every probe under `root`
///
/// # Errors
/// Fails if the source lister fails. Individual unreadable files are skipped.
pub fn discover(root: &Path, lister: &dyn SourceLister) -> Result<ProbeRegistry, ToolError> {
    let mut probes = HashMap::new();

    for file in lister.list(root)? {
        if file == Path::new(EXCLUDED_FILE) {
            continue;
        }
        let Ok(source) = std::fs::read_to_string(root.join(&file)) else {
            debug!("Skipping unreadable source file {}", file.display());
            continue;
        };
        for (name, count) in scan_source(&source) {
            debug!("Found probe {name} ({count} slots) in {}", file.display());
            probes.insert(name, count);
        }
    }

    info!("Discovered {} probes under {}", probes.len(), root.display());
    Ok(ProbeRegistry { probes })
}

/// Extract `(probe name, slot count)` pairs from one source file
#[must_use]
pub fn scan_source(source: &str) -> Vec<(String, usize)> {
    probe_macro()
        .find_iter(source)
        .filter_map(|m| parse_invocation(&source[m.end()..]))
        .collect()
}

/// Parse the text following a macro's opening parenthesis
///
/// Counts top-level comma-delimited items, so nested calls such as
/// `spdk_thread_get_id(group->thread)` count once. An invocation whose closing
/// parenthesis is missing gets a count of 0.
fn parse_invocation(args: &str) -> Option<(String, usize)> {
    let mut depth = 0usize;
    let mut items = 1;
    let mut name_end = None;
    let mut closed = false;

    for (i, c) in args.char_indices() {
        match c {
            '(' => depth += 1,
            ')' if depth == 0 => {
                name_end.get_or_insert(i);
                closed = true;
                break;
            }
            ')' => depth -= 1,
            ',' if depth == 0 => {
                name_end.get_or_insert(i);
                items += 1;
            }
            _ => {}
        }
    }

    let name = args[..name_end.unwrap_or(args.len())].trim();
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    Some((name.to_string(), if closed { items } else { 0 }))
}

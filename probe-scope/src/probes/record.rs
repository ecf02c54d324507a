//! Live probe recording
//!
//! Hands the generated script to the attachment helper (`scripts/bpftrace.sh
//! <pid> <script>`), which resolves the target executable, attaches and
//! streams probe output to our stdout until it is stopped.

use log::{info, warn};
use std::io::Write;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{ExitStatus, Stdio};

use super::descriptor::ProbeSet;
use crate::domain::{Pid, ToolError};

/// Run the attachment helper against `pid` until it exits or Ctrl+C
///
/// The probe script lives in a temporary file that is removed when this
/// returns, whichever way it returns. An operator interrupt is a normal stop.
///
/// # Errors
/// Fails if the script cannot be written, the helper cannot be started, or
/// the helper exits unsuccessfully for any reason other than an interrupt.
pub async fn record(probes: &ProbeSet, helper: &Path, pid: Pid) -> Result<(), ToolError> {
    let mut script = tempfile::Builder::new()
        .prefix("probe-scope-")
        .suffix(".bt")
        .tempfile()?;
    let path = script.path().to_path_buf();
    if let Err(source) = script.write_all(probes.generate().as_bytes()) {
        return Err(ToolError::Script { path, source });
    }
    script.flush().map_err(|source| ToolError::Script { path, source })?;

    let tool = helper.display().to_string();
    info!("Recording {pid} with {tool} ({})", script.path().display());

    let mut child = tokio::process::Command::new(helper)
        .arg(pid.0.to_string())
        .arg(script.path())
        .stdin(Stdio::null())
        .spawn()
        .map_err(|source| ToolError::Spawn { tool: tool.clone(), source })?;

    // Ctrl+C reaches the helper through the process group; we only need to
    // survive it and wait for the helper to wind down. A second Ctrl+C kills
    // a helper that ignores the first.
    let mut interrupted = false;
    let mut killed = false;

    let status = loop {
        tokio::select! {
            status = child.wait() => break status?,
            _ = tokio::signal::ctrl_c(), if !killed => {
                if interrupted {
                    warn!("Interrupted again, killing {tool}");
                    child.start_kill()?;
                    killed = true;
                } else {
                    info!("Interrupted, waiting for {tool} to exit");
                    interrupted = true;
                }
            }
        }
    };

    if status.success() || interrupted || stopped_by_interrupt(status) {
        Ok(())
    } else {
        Err(ToolError::Failed { tool, status })
    }
}

/// Killed by SIGINT, or a shell wrapper reporting it as `128 + SIGINT`
fn stopped_by_interrupt(status: ExitStatus) -> bool {
    status.signal() == Some(libc::SIGINT) || status.code() == Some(128 + libc::SIGINT)
}

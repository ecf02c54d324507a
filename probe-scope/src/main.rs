//! # probe-scope - Main Entry Point
//!
//! Three modes:
//! - **Generate** (`-g`): print the bpftrace script
//! - **Record** (`-r <PID>`): attach to a running process and stream probe output
//! - **Annotate** (default): print the trace log, annotated from `-b <FILE>` if given

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use std::io::IsTerminal;

use probe_scope::cli::Args;
use probe_scope::domain::Pid;
use probe_scope::lifetime::{builtin_kinds, descriptors, LifetimeTracker, ObjectKind, ObjectTracker};
use probe_scope::probes::{self, GitLister, ProbeEntry, ProbeSet};
use probe_scope::report::Reporter;
use probe_scope::trace_data::Trace;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.to_string().to_lowercase().contains("missing required argument") {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

#[tokio::main(flavor = "current_thread")]
async fn run() -> Result<()> {
    let args = Args::parse();
    let kinds = builtin_kinds();

    // Descriptor validation happens before any other work
    let registry = probes::discover(&args.root, &GitLister)
        .with_context(|| format!("Failed to discover probes in {}", args.root.display()))?;
    let probe_set =
        ProbeSet::bind(descriptors(&kinds), &registry).context("Invalid probe configuration")?;

    if args.generate {
        print!("{}", probe_set.generate());
        return Ok(());
    }

    if let Some(pid) = args.record {
        let helper = args.helper_path();
        probes::record(&probe_set, &helper, Pid(pid))
            .await
            .with_context(|| format!("Failed to record probes from {}", Pid(pid)))?;
        return Ok(());
    }

    let entries = load_capture(&args, &probe_set)?;
    let trace = load_trace(&args)?;
    let reporter = Reporter::new(build_trackers(kinds, &entries));

    reporter.print(trace, &mut std::io::stdout().lock())
}

fn load_capture(args: &Args, probe_set: &ProbeSet) -> Result<Vec<ProbeEntry>> {
    let Some(path) = &args.bpftrace else {
        info!("No probe capture given, printing trace without annotations");
        return Ok(Vec::new());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read probe capture {}", path.display()))?;
    probes::parse(&raw, probe_set)
        .with_context(|| format!("Failed to parse probe capture {}", path.display()))
}

fn load_trace(args: &Args) -> Result<Trace> {
    if let Some(path) = &args.input {
        return Trace::from_file(path)
            .with_context(|| format!("Failed to load trace log {}", path.display()));
    }

    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        bail!(
            "Missing required argument: --input\n\n\
             Pass a trace log with --input <FILE> or pipe one on stdin.\n\
             Run 'probe-scope --help' for more options"
        );
    }
    Trace::from_reader(stdin.lock()).context("Failed to load trace log from stdin")
}

fn build_trackers(kinds: Vec<ObjectKind>, entries: &[ProbeEntry]) -> Vec<Box<dyn ObjectTracker>> {
    kinds
        .into_iter()
        .map(|kind| Box::new(LifetimeTracker::new(kind, entries)) as Box<dyn ObjectTracker>)
        .collect()
}

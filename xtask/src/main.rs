use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use probe_scope::lifetime::{builtin_kinds, descriptors};
use probe_scope::probes::{discover, GitLister, ProbeSet};

#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Parser)]
enum Cmd {
    /// List every probe found in an SPDK source tree
    Probes {
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// Write the bpftrace script to a file
    GenScript {
        #[arg(long, default_value = ".")]
        root: PathBuf,
        #[arg(long, default_value = "probe-scope.bt")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Cmd::Probes { root } => list_probes(&root)?,
        Cmd::GenScript { root, out } => gen_script(&root, &out)?,
    }

    Ok(())
}

fn list_probes(root: &Path) -> Result<()> {
    let registry = discover(root, &GitLister).context("Failed to discover probes")?;
    let kinds = builtin_kinds();

    for (name, slots) in registry.sorted() {
        let used = kinds.iter().any(|k| k.role_of(name).is_some());
        println!("{name:48} {slots:2} {}", if used { "*" } else { "" });
    }
    println!("\n{} probes (* = used by probe-scope)", registry.len());

    Ok(())
}

fn gen_script(root: &Path, out: &Path) -> Result<()> {
    let registry = discover(root, &GitLister).context("Failed to discover probes")?;
    let probes = ProbeSet::bind(descriptors(&builtin_kinds()), &registry)
        .context("Probe configuration does not match the source tree")?;

    std::fs::write(out, probes.generate())
        .with_context(|| format!("Failed to write {}", out.display()))?;

    println!("✓ bpftrace script written");
    println!("  Output: {}", out.display());
    println!("  Probes: {}", probes.iter().count());

    Ok(())
}

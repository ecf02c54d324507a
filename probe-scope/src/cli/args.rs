//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "probe-scope",
    about = "Annotate SPDK trace logs with object lifetimes reconstructed from USDT probes",
    after_help = "\
EXAMPLES:
    probe-scope -g                                Print the bpftrace script
    sudo probe-scope -r 1234 > probes.txt         Record probes from PID 1234
    spdk_trace -j ... | probe-scope -b probes.txt Annotate a trace log"
)]
pub struct Args {
    /// JSON trace log (read from stdin when omitted)
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Print the generated bpftrace script and exit
    #[arg(short, long, conflicts_with = "record")]
    pub generate: bool,

    /// Attach probes to a running process and print their output
    #[arg(short, long, value_name = "PID")]
    pub record: Option<u32>,

    /// Previously recorded probe output used for annotation
    #[arg(short, long, value_name = "FILE")]
    pub bpftrace: Option<PathBuf>,

    /// Source tree scanned for probe definitions
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub root: PathBuf,

    /// Live-attachment helper (default: <ROOT>/scripts/bpftrace.sh)
    #[arg(long, value_name = "FILE")]
    pub helper: Option<PathBuf>,
}

impl Args {
    /// Helper script used by `--record`
    #[must_use]
    pub fn helper_path(&self) -> PathBuf {
        self.helper.clone().unwrap_or_else(|| self.root.join("scripts/bpftrace.sh"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["probe-scope", "-i", "trace.json"]).unwrap();
        assert_eq!(args.input, Some(PathBuf::from("trace.json")));
        assert!(!args.generate);
        assert_eq!(args.helper_path(), PathBuf::from("./scripts/bpftrace.sh"));
    }

    #[test]
    fn test_record_and_generate_conflict() {
        assert!(Args::try_parse_from(["probe-scope", "-g", "-r", "1"]).is_err());
    }

    #[test]
    fn test_offline_annotation() {
        let args =
            Args::try_parse_from(["probe-scope", "--bpftrace", "probes.txt", "--root", "/src/spdk"])
                .unwrap();
        assert_eq!(args.bpftrace, Some(PathBuf::from("probes.txt")));
        assert_eq!(args.helper_path(), PathBuf::from("/src/spdk/scripts/bpftrace.sh"));
    }
}

//! Annotated trace report
//!
//! One line per trace log entry:
//!
//! ```text
//! lcore  timestamp(us)  poller  tracepoint  size: N  id: X  time: T  args...
//! ```
//!
//! Arguments with object annotations render as `name(k=v, ...)`, the rest as
//! `name: value`. Lines are written as soon as each entry is read.

// Tick arithmetic is done in f64 for display
#![allow(clippy::cast_precision_loss)]

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::io::Write;

use crate::domain::Properties;
use crate::lifetime::ObjectTracker;
use crate::trace_data::{Trace, TraceEntry};

/// Annotations for one entry, keyed by argument name
pub type Annotations = HashMap<String, Properties>;

/// Converts ticks into microseconds relative to a fixed origin
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    pub origin: u64,
    pub tsc_rate: f64,
}

impl Clock {
    /// Microseconds between the origin and `tsc`
    #[must_use]
    pub fn timestamp_us(&self, tsc: u64) -> f64 {
        let delta = i128::from(tsc) - i128::from(self.origin);
        self.ticks_to_us_signed(delta)
    }

    /// A tick count as a duration in microseconds
    #[must_use]
    pub fn duration_us(&self, ticks: u64) -> f64 {
        self.ticks_to_us_signed(i128::from(ticks))
    }

    fn ticks_to_us_signed(&self, ticks: i128) -> f64 {
        ticks as f64 * 1e6 / self.tsc_rate
    }
}

/// Merges annotations from every registered tracker into the report
pub struct Reporter {
    trackers: Vec<Box<dyn ObjectTracker>>,
}

impl Reporter {
    #[must_use]
    pub fn new(trackers: Vec<Box<dyn ObjectTracker>>) -> Self {
        Self { trackers }
    }

    /// Collect annotations from all trackers; later trackers win on key clashes
    #[must_use]
    pub fn annotations(&self, entry: &TraceEntry) -> Annotations {
        let mut merged = Annotations::new();
        for (arg, props) in self.trackers.iter().filter_map(|t| t.annotate(entry)) {
            merged.entry(arg.to_string()).or_default().merge(props);
        }
        merged
    }

    /// Consume `trace` and write one report line per entry to `out`
    ///
    /// The first entry's tsc is the time origin.
    ///
    /// # Errors
    /// Fails on trace log lookup errors or when `out` cannot be written.
    pub fn print(&self, trace: Trace, out: &mut impl Write) -> Result<()> {
        let tsc_rate = trace.tsc_rate();
        let mut origin: Option<Clock> = None;

        for entry in trace.into_entries() {
            let entry = entry.context("Failed to read trace entry")?;
            let clock = *origin.get_or_insert(Clock { origin: entry.tsc, tsc_rate });
            let line = format_entry(&entry, clock, &self.annotations(&entry));
            writeln!(out, "{line}").context("Failed to write report line")?;
        }
        out.flush()?;
        Ok(())
    }
}

/// Render one entry
#[must_use]
pub fn format_entry(entry: &TraceEntry, clock: Clock, annotations: &Annotations) -> String {
    let blank_size = " ".repeat("size: ".len() + 6);

    let fields = [
        Some(format!("{:3}", entry.lcore)),
        Some(format!("{:16.3}", clock.timestamp_us(entry.tsc))),
        Some(entry.poller.as_ref().map_or_else(|| " ".repeat(3), |p| format!("{p:3}"))),
        Some(format!("{:24}", entry.tpoint.name)),
        Some(entry.size.map_or(blank_size, |s| format!("size: {s:6}"))),
        entry.object_id.as_ref().map(|id| format!("id: {id:8}")),
        entry.time.map(|t| format!("time: {:<8.3}", clock.duration_us(t))),
        Some(render_args(entry, annotations)),
    ];

    fields.into_iter().flatten().collect::<Vec<_>>().join(" ").trim_end().to_string()
}

fn render_args(entry: &TraceEntry, annotations: &Annotations) -> String {
    entry
        .tpoint
        .args
        .iter()
        .zip(&entry.args)
        .map(|(decl, (name, value))| match annotations.get(name) {
            Some(props) => format!("{name}({props})"),
            None => format!("{name}: {}", value.render(decl.ty)),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ArgType, Value};
    use crate::trace_data::{Tracepoint, TracepointArgument};
    use std::rc::Rc;

    fn entry(tsc: u64) -> TraceEntry {
        TraceEntry {
            lcore: 2,
            tpoint: Rc::new(Tracepoint {
                name: "RDMA_REQ_NEW".to_string(),
                id: 1,
                new_object: true,
                args: vec![
                    TracepointArgument { name: "qpair".to_string(), ty: ArgType::Pointer },
                    TracepointArgument { name: "qd".to_string(), ty: ArgType::Integer },
                ],
            }),
            tsc,
            poller: None,
            size: None,
            object_id: None,
            object_ptr: None,
            time: None,
            args: vec![("qpair".to_string(), Value::Int(0xaa)), ("qd".to_string(), Value::Int(4))],
        }
    }

    const CLOCK: Clock = Clock { origin: 1000, tsc_rate: 1_000_000_000.0 };

    #[test]
    fn test_minimal_line() {
        let line = format_entry(&entry(1000), CLOCK, &Annotations::new());
        assert_eq!(
            line,
            format!("  2            0.000     {:24} {} qpair: 0xaa, qd: 4", "RDMA_REQ_NEW", " ".repeat(12))
        );
    }

    #[test]
    fn test_all_optional_fields() {
        let mut e = entry(1500);
        e.poller = Some("p01".to_string());
        e.size = Some(4096);
        e.object_id = Some("r12".to_string());
        e.time = Some(2000);
        let line = format_entry(&e, CLOCK, &Annotations::new());
        assert_eq!(
            line,
            "  2            0.500 p01 RDMA_REQ_NEW             size:   4096 id: r12      \
             time: 2.000    qpair: 0xaa, qd: 4"
        );
    }

    #[test]
    fn test_annotated_argument() {
        let mut annotations = Annotations::new();
        annotations.insert(
            "qpair".to_string(),
            [("ptr", Value::from("0xaa")), ("thread", Value::Int(1))].into_iter().collect(),
        );
        let line = format_entry(&entry(1000), CLOCK, &annotations);
        assert!(line.ends_with("qpair(ptr=0xaa, thread=1), qd: 4"));
    }

    #[test]
    fn test_timestamp_resolution() {
        let first = format_entry(&entry(1000), CLOCK, &Annotations::new());
        let second = format_entry(&entry(1001), CLOCK, &Annotations::new());
        let later = format_entry(&entry(1500), CLOCK, &Annotations::new());
        let ts = |line: &str| line.split_whitespace().nth(1).unwrap().parse::<f64>().unwrap();
        assert!((ts(&second) - ts(&first) - 0.001).abs() < 1e-9);
        assert!((ts(&later) - ts(&first) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_timestamp_before_origin() {
        assert!((CLOCK.timestamp_us(500) + 0.5).abs() < 1e-9);
    }
}

//! Object lifetime reconstruction
//!
//! Turns the sorted probe entries into `[begin, end]` tsc windows per object
//! pointer, then matches trace log entries against those windows.
//!
//! Pointers get reused once an object is freed, so several lifetimes may
//! share a pointer. When windows for the same pointer overlap, the lifetime
//! created first wins.
//!
//! # Performance
//!
//! - Construction: O(creations × entries) forward scans
//! - `annotate()`: O(lifetimes) linear scan per trace entry

use log::{debug, info};

use super::config::{ObjectKind, Role};
use crate::domain::{Properties, Value};
use crate::probes::{ProbeEntry, TSC_ARG};
use crate::trace_data::TraceEntry;

/// Something that can attach object properties to trace log entries
pub trait ObjectTracker {
    /// Properties for one of `entry`'s arguments, keyed by that argument's name
    ///
    /// Returns `None` when the entry's tracepoint is not one this tracker
    /// cares about, or when no known object matches.
    fn annotate(&self, entry: &TraceEntry) -> Option<(&str, &Properties)>;
}

/// Reconstructed lifetime of one object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lifetime {
    pub begin: u64,
    /// `None` while the object was still alive at the end of the capture
    pub end: Option<u64>,
    pub ptr: u64,
    pub properties: Properties,
}

impl Lifetime {
    /// Inclusive on both ends
    #[must_use]
    pub fn contains(&self, tsc: u64) -> bool {
        self.begin <= tsc && self.end.is_none_or(|end| tsc <= end)
    }
}

/// Tracker for any [`ObjectKind`]
#[derive(Debug)]
pub struct LifetimeTracker {
    kind: ObjectKind,
    lifetimes: Vec<Lifetime>,
}

impl LifetimeTracker {
    /// Build lifetimes from probe entries sorted by tsc
    #[must_use]
    pub fn new(kind: ObjectKind, entries: &[ProbeEntry]) -> Self {
        let lifetimes = reconstruct(&kind, entries);
        info!("Reconstructed {} {} lifetimes", lifetimes.len(), kind.subject);
        Self { kind, lifetimes }
    }

    #[must_use]
    pub fn lifetimes(&self) -> &[Lifetime] {
        &self.lifetimes
    }

    #[must_use]
    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }
}

impl ObjectTracker for LifetimeTracker {
    fn annotate(&self, entry: &TraceEntry) -> Option<(&str, &Properties)> {
        if !self.kind.tracepoints.iter().any(|t| *t == entry.tpoint.name) {
            return None;
        }
        let ptr = entry.arg(&self.kind.subject)?.as_int()?;

        self.lifetimes
            .iter()
            .find(|l| l.ptr == ptr && l.contains(entry.tsc))
            .map(|l| (self.kind.subject.as_str(), &l.properties))
    }
}

fn pointer_of(kind: &ObjectKind, entry: &ProbeEntry) -> Option<u64> {
    entry.arg(&kind.pointer).and_then(Value::as_int)
}

/// Copy every argument except the tick counter and the pointer into `props`
fn copy_properties(kind: &ObjectKind, entry: &ProbeEntry, props: &mut Properties) {
    let Some(binding) = kind.binding(&entry.name) else {
        return;
    };
    // Declaration order keeps the rendered properties stable
    for arg in &binding.probe.args {
        if arg.name == TSC_ARG || arg.name == kind.pointer {
            continue;
        }
        if let Some(value) = entry.arg(&arg.name) {
            props.insert(arg.name.as_str(), value.clone());
        }
    }
}

fn reconstruct(kind: &ObjectKind, entries: &[ProbeEntry]) -> Vec<Lifetime> {
    let mut lifetimes = Vec::new();

    for (i, created) in entries.iter().enumerate() {
        if kind.role_of(&created.name) != Some(Role::Create) {
            continue;
        }
        let Some(ptr) = pointer_of(kind, created) else {
            debug!("{} entry at tsc {} has no {}", created.name, created.tsc, kind.pointer);
            continue;
        };

        let removed = entries[i + 1..].iter().position(|e| {
            kind.role_of(&e.name) == Some(Role::Remove) && pointer_of(kind, e) == Some(ptr)
        });
        let (stop, end) = match removed {
            Some(offset) => (i + 1 + offset, Some(entries[i + 1 + offset].tsc)),
            None => (entries.len(), None),
        };

        let mut properties = Properties::new();
        properties.insert("ptr", format!("0x{ptr:x}"));
        copy_properties(kind, created, &mut properties);

        for attached in &entries[i..stop] {
            if kind.role_of(&attached.name) == Some(Role::Attach)
                && pointer_of(kind, attached) == Some(ptr)
            {
                copy_properties(kind, attached, &mut properties);
            }
        }

        let lifetime = Lifetime { begin: created.tsc, end, ptr, properties };
        debug!("{} lifetime: {lifetime:?}", kind.subject);
        lifetimes.push(lifetime);
    }

    lifetimes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifetime::config::nvmf_qpair;
    use crate::trace_data::{Tracepoint, TracepointArgument};
    use crate::domain::ArgType;
    use std::collections::HashMap;
    use std::rc::Rc;

    fn probe(name: &str, tsc: u64, args: &[(&str, Value)]) -> ProbeEntry {
        let mut map: HashMap<String, Value> =
            args.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect();
        map.insert("tsc".to_string(), Value::Int(tsc));
        ProbeEntry { name: name.to_string(), tsc, args: map }
    }

    fn created(tsc: u64, ptr: u64, thread: u64) -> ProbeEntry {
        probe("nvmf_poll_group_add_qpair", tsc, &[("qpair", Value::Int(ptr)), ("thread", Value::Int(thread))])
    }

    fn removed(tsc: u64, ptr: u64) -> ProbeEntry {
        probe("nvmf_poll_group_remove_qpair", tsc, &[("qpair", Value::Int(ptr)), ("thread", Value::Int(1))])
    }

    fn attached(tsc: u64, ptr: u64, qid: u64, subnqn: &str, hostnqn: &str) -> ProbeEntry {
        probe(
            "nvmf_ctrlr_add_qpair",
            tsc,
            &[
                ("qpair", Value::Int(ptr)),
                ("qid", Value::Int(qid)),
                ("subnqn", Value::from(subnqn)),
                ("hostnqn", Value::from(hostnqn)),
            ],
        )
    }

    fn trace_entry(tpoint: &str, tsc: u64, qpair: u64) -> TraceEntry {
        TraceEntry {
            lcore: 0,
            tpoint: Rc::new(Tracepoint {
                name: tpoint.to_string(),
                id: 1,
                new_object: false,
                args: vec![TracepointArgument { name: "qpair".to_string(), ty: ArgType::Pointer }],
            }),
            tsc,
            poller: None,
            size: None,
            object_id: None,
            object_ptr: None,
            time: None,
            args: vec![("qpair".to_string(), Value::Int(qpair))],
        }
    }

    #[test]
    fn test_closed_lifetime() {
        let entries = vec![
            created(10, 0xaa, 1),
            attached(12, 0xaa, 3, "nqnA", "hostA"),
            removed(50, 0xaa),
        ];
        let tracker = LifetimeTracker::new(nvmf_qpair(), &entries);

        let (arg, props) = tracker.annotate(&trace_entry("RDMA_REQ_NEW", 20, 0xaa)).unwrap();
        assert_eq!(arg, "qpair");
        assert_eq!(props.to_string(), "ptr=0xaa, thread=1, qid=3, subnqn=nqnA, hostnqn=hostA");
        assert_eq!(props.get("thread"), Some(&Value::Int(1)));
        assert_eq!(props.get("qid"), Some(&Value::Int(3)));

        assert_eq!(tracker.lifetimes()[0].end, Some(50));
        assert!(tracker.annotate(&trace_entry("RDMA_REQ_NEW", 51, 0xaa)).is_none());
        assert!(tracker.annotate(&trace_entry("RDMA_REQ_NEW", 9, 0xaa)).is_none());
        // window is inclusive
        assert!(tracker.annotate(&trace_entry("RDMA_REQ_NEW", 50, 0xaa)).is_some());
    }

    #[test]
    fn test_open_lifetime() {
        let tracker = LifetimeTracker::new(nvmf_qpair(), &[created(10, 0xbb, 2)]);
        assert_eq!(tracker.lifetimes()[0].end, None);
        let (_, props) = tracker.annotate(&trace_entry("TCP_REQ_NEW", u64::MAX, 0xbb)).unwrap();
        assert_eq!(props.to_string(), "ptr=0xbb, thread=2");
    }

    #[test]
    fn test_unknown_pointer_not_annotated() {
        let tracker = LifetimeTracker::new(nvmf_qpair(), &[created(10, 0xaa, 1)]);
        assert!(tracker.annotate(&trace_entry("RDMA_REQ_NEW", 20, 0xcc)).is_none());
    }

    #[test]
    fn test_irrelevant_tracepoint_not_annotated() {
        let tracker = LifetimeTracker::new(nvmf_qpair(), &[created(10, 0xaa, 1)]);
        assert!(tracker.annotate(&trace_entry("BDEV_IO_START", 20, 0xaa)).is_none());
    }

    #[test]
    fn test_removal_must_match_pointer() {
        let entries = vec![created(10, 0xaa, 1), removed(20, 0xbb), removed(30, 0xaa)];
        let tracker = LifetimeTracker::new(nvmf_qpair(), &entries);
        assert_eq!(tracker.lifetimes()[0].end, Some(30));
    }

    #[test]
    fn test_attach_outside_window_ignored() {
        let entries = vec![
            created(10, 0xaa, 1),
            removed(20, 0xaa),
            attached(30, 0xaa, 7, "late", "late"),
        ];
        let tracker = LifetimeTracker::new(nvmf_qpair(), &entries);
        assert_eq!(tracker.lifetimes()[0].properties.get("qid"), None);
    }

    #[test]
    fn test_repeated_attach_last_write_wins() {
        let entries = vec![
            created(10, 0xaa, 1),
            attached(11, 0xaa, 1, "nqnA", "hostA"),
            attached(12, 0xaa, 2, "nqnB", "hostA"),
        ];
        let tracker = LifetimeTracker::new(nvmf_qpair(), &entries);
        let props = &tracker.lifetimes()[0].properties;
        assert_eq!(props.get("qid"), Some(&Value::Int(2)));
        assert_eq!(props.get("subnqn"), Some(&Value::from("nqnB")));
    }

    #[test]
    fn test_reused_pointer_gets_separate_lifetimes() {
        let entries = vec![
            created(10, 0xaa, 1),
            removed(20, 0xaa),
            created(30, 0xaa, 2),
            removed(40, 0xaa),
        ];
        let tracker = LifetimeTracker::new(nvmf_qpair(), &entries);
        assert_eq!(tracker.lifetimes().len(), 2);

        let (_, props) = tracker.annotate(&trace_entry("RDMA_REQ_NEW", 35, 0xaa)).unwrap();
        assert_eq!(props.get("thread"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_overlapping_windows_first_created_wins() {
        // Second creation before the first removal: both windows cover tsc 25
        let entries = vec![
            created(10, 0xaa, 1),
            created(20, 0xaa, 2),
            removed(30, 0xaa),
            removed(40, 0xaa),
        ];
        let tracker = LifetimeTracker::new(nvmf_qpair(), &entries);
        assert_eq!(tracker.lifetimes()[0].end, Some(30));
        assert_eq!(tracker.lifetimes()[1].end, Some(30));

        let (_, props) = tracker.annotate(&trace_entry("RDMA_REQ_NEW", 25, 0xaa)).unwrap();
        assert_eq!(props.get("thread"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_lifetimes_are_well_formed() {
        let entries = vec![
            created(10, 0xaa, 1),
            created(11, 0xbb, 1),
            removed(15, 0xaa),
            created(16, 0xaa, 1),
        ];
        let tracker = LifetimeTracker::new(nvmf_qpair(), &entries);
        assert_eq!(tracker.lifetimes().len(), 3);
        assert!(tracker.lifetimes().iter().all(|l| l.end.is_none_or(|end| l.begin <= end)));
    }
}

//! Object kind configuration
//!
//! Which probes create, extend and end an object's lifetime, and which trace
//! log tracepoints refer to that object, is data. Supporting a new object
//! kind means adding an [`ObjectKind`] here, not a new tracker.

use crate::domain::ArgType;
use crate::probes::{ProbeArgument, ProbeDescriptor};

/// What a probe firing means for the object it names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Object comes alive; seeds its properties
    Create,
    /// Adds properties to a live object; may fire repeatedly
    Attach,
    /// Object is gone
    Remove,
}

/// A probe bound to a role
///
/// Every argument other than the tick counter and the pointer argument is
/// copied into the object's properties when the probe fires in the
/// `Create` or `Attach` role.
#[derive(Debug, Clone)]
pub struct RoleBinding {
    pub role: Role,
    pub probe: ProbeDescriptor,
}

/// A kind of pointer-identified object tracked across both streams
#[derive(Debug, Clone)]
pub struct ObjectKind {
    /// Trace log argument holding the object pointer; annotations are keyed by it
    pub subject: String,
    /// Probe argument holding the object pointer
    pub pointer: String,
    /// Trace log tracepoints whose `subject` argument refers to this object
    pub tracepoints: Vec<String>,
    pub bindings: Vec<RoleBinding>,
}

impl ObjectKind {
    /// Probe names bound to `role`
    pub fn probes_for(&self, role: Role) -> impl Iterator<Item = &str> {
        self.bindings.iter().filter(move |b| b.role == role).map(|b| b.probe.name.as_str())
    }

    #[must_use]
    pub fn role_of(&self, probe: &str) -> Option<Role> {
        self.bindings.iter().find(|b| b.probe.name == probe).map(|b| b.role)
    }

    #[must_use]
    pub fn binding(&self, probe: &str) -> Option<&RoleBinding> {
        self.bindings.iter().find(|b| b.probe.name == probe)
    }
}

/// Probe descriptors needed by `kinds`, without duplicates
#[must_use]
pub fn descriptors(kinds: &[ObjectKind]) -> Vec<ProbeDescriptor> {
    let mut out: Vec<ProbeDescriptor> = Vec::new();
    for binding in kinds.iter().flat_map(|k| &k.bindings) {
        if !out.iter().any(|d| d.name == binding.probe.name) {
            out.push(binding.probe.clone());
        }
    }
    out
}

const NVMF_REQUEST_TRACEPOINTS: &[&str] = &[
    "RDMA_REQ_NEW",
    "RDMA_REQ_NEED_BUFFER",
    "RDMA_REQ_TX_PENDING_C2H",
    "RDMA_REQ_TX_PENDING_H2C",
    "RDMA_REQ_TX_H2C",
    "RDMA_REQ_RDY_TO_EXECUTE",
    "RDMA_REQ_EXECUTING",
    "RDMA_REQ_EXECUTED",
    "RDMA_REQ_RDY_TO_COMPL",
    "RDMA_REQ_COMPLETING_C2H",
    "RDMA_REQ_COMPLETING",
    "RDMA_REQ_COMPLETED",
    "TCP_REQ_NEW",
    "TCP_REQ_NEED_BUFFER",
    "TCP_REQ_WAIT_ZCPY_START",
    "TCP_REQ_ZCPY_START_CPL",
    "TCP_REQ_TX_H_TO_C",
    "TCP_REQ_RDY_TO_EXECUTE",
    "TCP_REQ_EXECUTING",
    "TCP_REQ_WAIT_ZCPY_CMT",
    "TCP_REQ_EXECUTED",
    "TCP_REQ_RDY_TO_COMPLETE",
    "TCP_REQ_TRANSFER_C2H",
    "TCP_REQ_AWAIT_ZCPY_RLS",
    "TCP_REQ_COMPLETED",
    "TCP_REQ_AWAIT_R2T_ACK",
];

/// NVMe-oF queue pair: added to a poll group, attached to a controller,
/// removed from the poll group
#[must_use]
pub fn nvmf_qpair() -> ObjectKind {
    let int = |name: &str, pos| ProbeArgument::new(name, pos, ArgType::Integer);
    let text = |name: &str, pos| ProbeArgument::new(name, pos, ArgType::Text);

    ObjectKind {
        subject: "qpair".to_string(),
        pointer: "qpair".to_string(),
        tracepoints: NVMF_REQUEST_TRACEPOINTS.iter().map(ToString::to_string).collect(),
        bindings: vec![
            RoleBinding {
                role: Role::Create,
                probe: ProbeDescriptor::new(
                    "nvmf_poll_group_add_qpair",
                    vec![ProbeArgument::tsc(), int("qpair", 1), int("thread", 2)],
                ),
            },
            RoleBinding {
                role: Role::Remove,
                probe: ProbeDescriptor::new(
                    "nvmf_poll_group_remove_qpair",
                    vec![ProbeArgument::tsc(), int("qpair", 1), int("thread", 2)],
                ),
            },
            RoleBinding {
                role: Role::Attach,
                probe: ProbeDescriptor::new(
                    "nvmf_ctrlr_add_qpair",
                    vec![
                        ProbeArgument::tsc(),
                        int("qpair", 1),
                        int("qid", 2),
                        text("subnqn", 3),
                        text("hostnqn", 4),
                    ],
                ),
            },
        ],
    }
}

/// Every object kind known to the tool
#[must_use]
pub fn builtin_kinds() -> Vec<ObjectKind> {
    vec![nvmf_qpair()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qpair_roles() {
        let kind = nvmf_qpair();
        assert_eq!(kind.role_of("nvmf_poll_group_add_qpair"), Some(Role::Create));
        assert_eq!(kind.role_of("nvmf_ctrlr_add_qpair"), Some(Role::Attach));
        assert_eq!(kind.role_of("nvmf_poll_group_remove_qpair"), Some(Role::Remove));
        assert_eq!(kind.role_of("nvmf_tgt_add_transport"), None);
        assert_eq!(kind.probes_for(Role::Create).collect::<Vec<_>>(), ["nvmf_poll_group_add_qpair"]);
    }

    #[test]
    fn test_descriptors_deduplicated() {
        let kinds = vec![nvmf_qpair(), nvmf_qpair()];
        let descs = descriptors(&kinds);
        assert_eq!(descs.len(), 3);
        assert!(descs.iter().all(|d| d.arg("tsc").is_some_and(|a| a.position == 0)));
    }
}

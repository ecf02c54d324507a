//! Typed probe definitions and bpftrace script generation

use std::fmt::Write as _;

use super::registry::ProbeRegistry;
use crate::domain::{ArgType, ConfigError};

/// Name of the tick counter argument every `_TICKS` probe carries in slot 0
pub const TSC_ARG: &str = "tsc";

/// One named argument of a probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeArgument {
    pub name: String,
    /// bpftrace `argN` slot; slot 0 is the tick counter
    pub position: usize,
    pub ty: ArgType,
}

impl ProbeArgument {
    pub fn new(name: impl Into<String>, position: usize, ty: ArgType) -> Self {
        Self { name: name.into(), position, ty }
    }

    /// The tick counter argument at slot 0
    #[must_use]
    pub fn tsc() -> Self {
        Self::new(TSC_ARG, 0, ArgType::Integer)
    }
}

/// A probe and its arguments, in declaration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeDescriptor {
    pub name: String,
    pub args: Vec<ProbeArgument>,
}

impl ProbeDescriptor {
    pub fn new(name: impl Into<String>, args: Vec<ProbeArgument>) -> Self {
        Self { name: name.into(), args }
    }

    #[must_use]
    pub fn arg(&self, name: &str) -> Option<&ProbeArgument> {
        self.args.iter().find(|a| a.name == name)
    }

    /// Check this descriptor against the discovered probe schema
    ///
    /// # Errors
    /// Returns the first mismatch found.
    pub fn validate(&self, registry: &ProbeRegistry) -> Result<(), ConfigError> {
        let count = registry
            .arg_count(&self.name)
            .ok_or_else(|| ConfigError::ProbeNotFound(self.name.clone()))?;

        for arg in &self.args {
            if arg.position >= count {
                return Err(ConfigError::InvalidPosition {
                    probe: self.name.clone(),
                    arg: arg.name.clone(),
                    position: arg.position,
                    count,
                });
            }
            if !matches!(arg.ty, ArgType::Integer | ArgType::Text) {
                return Err(ConfigError::InvalidType {
                    probe: self.name.clone(),
                    arg: arg.name.clone(),
                    ty: arg.ty,
                });
            }
        }
        Ok(())
    }

    /// bpftrace stanza printing `<probe>: <arg>=<value>, ...`, or just
    /// `<probe>` when there are no arguments
    ///
    /// `__EXE__` is left for the attachment helper to replace with the
    /// target's executable.
    #[must_use]
    pub fn stanza(&self) -> String {
        let mut out = format!("usdt:__EXE__:{} {{\n", self.name);
        if self.args.is_empty() {
            let _ = writeln!(out, "\tprintf(\"{}\\n\");", self.name);
        } else {
            let fmt = self
                .args
                .iter()
                .map(|a| {
                    let spec = if a.ty == ArgType::Text { "%s" } else { "%llx" };
                    format!("{}={spec}", a.name)
                })
                .collect::<Vec<_>>()
                .join(", ");
            let values = self
                .args
                .iter()
                .map(|a| {
                    if a.ty == ArgType::Text {
                        format!("str(arg{})", a.position)
                    } else {
                        format!("arg{}", a.position)
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(out, "\tprintf(\"{}: {fmt}\\n\", {values});", self.name);
        }
        out.push_str("}\n");
        out
    }
}

/// A set of probe descriptors that passed validation
///
/// Only constructible through [`ProbeSet::bind`], so holding one means every
/// descriptor names a real probe with in-range, supported arguments.
#[derive(Debug, Clone)]
pub struct ProbeSet {
    descriptors: Vec<ProbeDescriptor>,
}

impl ProbeSet {
    /// Validate `descriptors` against `registry`
    ///
    /// # Errors
    /// Fails on the first descriptor that does not match the schema.
    pub fn bind(
        descriptors: Vec<ProbeDescriptor>,
        registry: &ProbeRegistry,
    ) -> Result<Self, ConfigError> {
        for desc in &descriptors {
            desc.validate(registry)?;
        }
        Ok(Self { descriptors })
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ProbeDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProbeDescriptor> {
        self.descriptors.iter()
    }

    /// Full bpftrace script, one stanza per descriptor
    #[must_use]
    pub fn generate(&self) -> String {
        self.descriptors.iter().map(ProbeDescriptor::stanza).collect::<Vec<_>>().join("\n")
    }
}

//! Trace log model
//!
//! Loads the JSON trace log written by `spdk_trace --json`:
//!
//! ```text
//! { "tsc_rate": 2100000000,
//!   "tpoints": [ { "name", "id", "new_object", "args": [ { "name", "type" } ] } ],
//!   "entries": [ { "tpoint", "lcore", "tsc", "size"?, "poller"?,
//!                  "object"?: { "id"?, "value"?, "time"? }, "args"?: [ ... ] } ] }
//! ```
//!
//! The schema is resolved up front; entries are turned into [`TraceEntry`]
//! values one at a time as [`TraceEntries`] is iterated.

use log::warn;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;
use std::rc::Rc;

use crate::domain::{ArgType, TraceLogError, Value};

/// Declared argument of a tracepoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracepointArgument {
    pub name: String,
    pub ty: ArgType,
}

/// Tracepoint schema entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tracepoint {
    pub name: String,
    pub id: u32,
    pub new_object: bool,
    pub args: Vec<TracepointArgument>,
}

/// A single trace log record with its arguments keyed by declared name
#[derive(Debug, Clone)]
pub struct TraceEntry {
    pub lcore: u32,
    pub tpoint: Rc<Tracepoint>,
    pub tsc: u64,
    pub poller: Option<String>,
    pub size: Option<u64>,
    pub object_id: Option<String>,
    pub object_ptr: Option<u64>,
    /// Ticks since the object was created
    pub time: Option<u64>,
    pub args: Vec<(String, Value)>,
}

impl TraceEntry {
    #[must_use]
    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

#[derive(Debug, Deserialize)]
struct RawTrace {
    tsc_rate: f64,
    #[serde(default)]
    tpoints: Vec<RawTracepoint>,
    #[serde(default)]
    entries: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawTracepoint {
    name: String,
    id: u32,
    #[serde(default)]
    new_object: bool,
    #[serde(default)]
    args: Vec<RawTracepointArg>,
}

#[derive(Debug, Deserialize)]
struct RawTracepointArg {
    name: String,
    #[serde(rename = "type")]
    ty: u32,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    tpoint: u32,
    lcore: u32,
    tsc: u64,
    size: Option<u64>,
    poller: Option<String>,
    object: Option<RawObject>,
    #[serde(default)]
    args: Vec<JsonValue>,
}

#[derive(Debug, Deserialize)]
struct RawObject {
    id: Option<String>,
    value: Option<u64>,
    time: Option<u64>,
}

/// Argument type codes used by the trace library
fn arg_type(tpoint: &str, code: u32) -> Result<ArgType, TraceLogError> {
    match code {
        0 => Ok(ArgType::Integer),
        1 => Ok(ArgType::Pointer),
        2 => Ok(ArgType::Text),
        ty => Err(TraceLogError::UnknownArgType { tpoint: tpoint.to_string(), ty }),
    }
}

fn json_to_value(json: JsonValue) -> Value {
    match json {
        JsonValue::Number(n) => n.as_u64().map_or_else(|| Value::Str(n.to_string()), Value::Int),
        JsonValue::String(s) => Value::Str(s),
        other => Value::Str(other.to_string()),
    }
}

/// Loaded trace log
#[derive(Debug)]
pub struct Trace {
    tsc_rate: f64,
    tpoints: HashMap<u32, Rc<Tracepoint>>,
    entries: Vec<RawEntry>,
}

impl Trace {
    /// Parse a trace log document
    ///
    /// # Errors
    /// Fails on malformed JSON or an unknown argument type code.
    pub fn from_reader(reader: impl Read) -> Result<Self, TraceLogError> {
        let raw: RawTrace = serde_json::from_reader(reader)?;

        let mut tpoints = HashMap::new();
        for tp in raw.tpoints {
            let args = tp
                .args
                .into_iter()
                .map(|a| Ok(TracepointArgument { ty: arg_type(&tp.name, a.ty)?, name: a.name }))
                .collect::<Result<Vec<_>, TraceLogError>>()?;
            tpoints.insert(
                tp.id,
                Rc::new(Tracepoint { name: tp.name, id: tp.id, new_object: tp.new_object, args }),
            );
        }

        Ok(Self { tsc_rate: raw.tsc_rate, tpoints, entries: raw.entries })
    }

    /// Load a trace log from disk
    ///
    /// # Errors
    /// See [`Trace::from_reader`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TraceLogError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Ticks per second
    #[must_use]
    pub fn tsc_rate(&self) -> f64 {
        self.tsc_rate
    }

    #[must_use]
    pub fn tracepoint(&self, id: u32) -> Option<&Tracepoint> {
        self.tpoints.get(&id).map(Rc::as_ref)
    }

    /// Consume the trace into its entry sequence
    #[must_use]
    pub fn into_entries(self) -> TraceEntries {
        TraceEntries {
            tpoints: self.tpoints,
            raw: self.entries.into_iter(),
            mismatched: HashSet::new(),
        }
    }
}

/// Forward-only sequence of trace entries, produced on demand
#[derive(Debug)]
pub struct TraceEntries {
    tpoints: HashMap<u32, Rc<Tracepoint>>,
    raw: std::vec::IntoIter<RawEntry>,
    mismatched: HashSet<u32>,
}

impl TraceEntries {
    fn convert(&mut self, raw: RawEntry) -> Result<TraceEntry, TraceLogError> {
        let tpoint = self
            .tpoints
            .get(&raw.tpoint)
            .cloned()
            .ok_or(TraceLogError::UnknownTracepoint(raw.tpoint))?;

        // Extra or missing values are dropped by the zip
        if raw.args.len() != tpoint.args.len() && self.mismatched.insert(tpoint.id) {
            warn!(
                "Tracepoint {} declares {} args but entry carries {}",
                tpoint.name,
                tpoint.args.len(),
                raw.args.len()
            );
        }
        let args = tpoint
            .args
            .iter()
            .zip(raw.args)
            .map(|(decl, value)| (decl.name.clone(), json_to_value(value)))
            .collect();

        let object = raw.object.unwrap_or(RawObject { id: None, value: None, time: None });

        Ok(TraceEntry {
            lcore: raw.lcore,
            tpoint,
            tsc: raw.tsc,
            poller: raw.poller,
            size: raw.size,
            object_id: object.id,
            object_ptr: object.value,
            time: object.time,
            args,
        })
    }
}

impl Iterator for TraceEntries {
    type Item = Result<TraceEntry, TraceLogError>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = self.raw.next()?;
        Some(self.convert(raw))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.raw.size_hint()
    }
}

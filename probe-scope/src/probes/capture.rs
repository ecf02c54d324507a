//! Parsing of captured bpftrace output
//!
//! Lines look like `<probe>: key=value, key=value`, or a bare `<probe>` for
//! probes declared without arguments. Anything else (bpftrace
//! banners, `Attaching N probes...`, lines from probes we did not generate)
//! is noise and gets dropped.

use log::{debug, info};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

use super::descriptor::{ProbeSet, TSC_ARG};
use crate::domain::{ArgType, CaptureError, Value};

/// One probe firing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeEntry {
    pub name: String,
    pub tsc: u64,
    pub args: HashMap<String, Value>,
}

impl ProbeEntry {
    #[must_use]
    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }
}

fn capture_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\w+)(?:: (.*))?$").expect("valid capture regex"))
}

/// Parse a whole capture into entries sorted by tsc
///
/// The sort is stable, so entries with equal tsc keep capture order. The
/// whole capture is held in memory for sorting.
///
/// # Errors
/// Fails when a known probe's line carries an undeclared or undecodable
/// argument.
pub fn parse(raw: &str, probes: &ProbeSet) -> Result<Vec<ProbeEntry>, CaptureError> {
    let mut entries = Vec::new();
    let mut skipped = 0usize;

    for line in raw.lines() {
        match parse_line(line, probes)? {
            Some(entry) => entries.push(entry),
            None => {
                debug!("Skipping capture line: {line}");
                skipped += 1;
            }
        }
    }

    entries.sort_by_key(|e| e.tsc);
    info!("Parsed {} probe entries ({skipped} lines skipped)", entries.len());
    Ok(entries)
}

/// Parse one line; `Ok(None)` for noise and unknown probes
///
/// # Errors
/// See [`parse`].
pub fn parse_line(line: &str, probes: &ProbeSet) -> Result<Option<ProbeEntry>, CaptureError> {
    let Some(caps) = capture_line().captures(line.trim_end()) else {
        return Ok(None);
    };
    let name = &caps[1];
    let Some(desc) = probes.get(name) else {
        return Ok(None);
    };
    let fields = match caps.get(2) {
        Some(fields) => fields.as_str(),
        None if desc.args.is_empty() => "",
        None => return Ok(None),
    };

    let mut args = HashMap::new();
    for token in fields.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let (key, raw) = token.split_once('=').ok_or_else(|| CaptureError::MalformedArgument {
            probe: name.to_string(),
            token: token.to_string(),
        })?;
        let key = key.trim();
        let arg = desc.arg(key).ok_or_else(|| CaptureError::UnexpectedArgument {
            probe: name.to_string(),
            arg: key.to_string(),
        })?;

        let value = match arg.ty {
            ArgType::Text => Value::Str(strip_quotes(raw.trim()).to_string()),
            _ => Value::Int(parse_hex(raw.trim()).ok_or_else(|| CaptureError::InvalidValue {
                probe: name.to_string(),
                arg: key.to_string(),
                value: raw.to_string(),
            })?),
        };
        args.insert(key.to_string(), value);
    }

    // Probes without a tick counter sort to the front
    let tsc = args.get(TSC_ARG).and_then(Value::as_int).unwrap_or(0);
    Ok(Some(ProbeEntry { name: name.to_string(), tsc, args }))
}

fn parse_hex(raw: &str) -> Option<u64> {
    let digits = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")).unwrap_or(raw);
    u64::from_str_radix(digits, 16).ok()
}

/// Strip one layer of matching surrounding quotes
fn strip_quotes(raw: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = raw.strip_prefix(quote).and_then(|s| s.strip_suffix(quote)) {
            return inner;
        }
    }
    raw
}

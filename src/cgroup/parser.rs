//! Parsers for the cgroup v2 interface files read by [`super::CgroupHandler`].
//!
//! Three layouts are supported:
//!
//! - flat keyed files such as `cpu.stat` and `memory.stat` (`key value` per line),
//! - nested keyed files such as `io.stat` (`device key=value key=value ...` per line,
//!   summed over devices),
//! - single value files such as `memory.current` and `memory.max`, where `max`
//!   stands for "unlimited".
//!
//! # Example
//!
//! ```rust
//! use cadmon::cgroup::parser;
//!
//! let data = "usage_usec 100\nuser_usec 60\nsystem_usec 40\n";
//! let values = parser::parse_flat_keyed(&mut data.as_bytes()).unwrap();
//! assert_eq!(values["usage_usec"], 100);
//!
//! let limit = parser::parse_single_value(&mut "max\n".as_bytes()).unwrap();
//! assert_eq!(limit, None);
//! ```

use std::collections::HashMap;
use std::collections::hash_map;
use std::io::BufRead;
use std::num::ParseIntError;

use crate::info::CpuSpec;

/// Default CFS period in microseconds when `cpu.max` omits it.
const DEFAULT_CPU_PERIOD: u64 = 100_000;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("duplicate field '{field}' at line {line}")]
    DuplicateField { field: String, line: usize },

    #[error("invalid value for '{key}' at line {line}: '{value}': {source}")]
    InvalidKeyValue {
        key: String,
        value: String,
        line: usize,
        #[source]
        source: ParseIntError,
    },

    #[error("invalid value at line {line}: '{value}': {source}")]
    InvalidValue {
        value: String,
        line: usize,
        #[source]
        source: ParseIntError,
    },

    #[error("error during I/O: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ParseError>;

/// Parses `key value` lines. Lines without a value are skipped; duplicate keys are rejected.
pub fn parse_flat_keyed<R: BufRead>(buf: &mut R) -> Result<HashMap<String, u64>> {
    let mut values = HashMap::new();
    let mut line = String::new();
    let mut lineno = 0;

    while buf.read_line(&mut line)? != 0 {
        lineno += 1;
        let mut parts = line.split_whitespace();
        if let (Some(key), Some(raw)) = (parts.next(), parts.next()) {
            let value = parse_key_value(key, raw, lineno)?;
            match values.entry(key.to_owned()) {
                hash_map::Entry::Occupied(_) => {
                    return Err(ParseError::DuplicateField {
                        field: key.to_owned(),
                        line: lineno,
                    });
                }
                hash_map::Entry::Vacant(entry) => {
                    entry.insert(value);
                }
            }
        }
        line.clear();
    }

    Ok(values)
}

/// Parses `<device> key=value ...` lines, summing each key over all devices.
///
/// Tokens without `=` are ignored.
pub fn parse_nested_keyed<R: BufRead>(buf: &mut R) -> Result<HashMap<String, u64>> {
    let mut values: HashMap<String, u64> = HashMap::new();
    let mut line = String::new();
    let mut lineno = 0;

    while buf.read_line(&mut line)? != 0 {
        lineno += 1;
        for (key, raw) in line
            .split_whitespace()
            .skip(1)
            .filter_map(|part| part.split_once('='))
        {
            let value = parse_key_value(key, raw, lineno)?;
            let total = values.entry(key.to_owned()).or_default();
            *total = total.saturating_add(value);
        }
        line.clear();
    }

    Ok(values)
}

/// Parses a file holding a single number or `max`.
///
/// Returns `Ok(None)` for `max` and for an empty file.
pub fn parse_single_value<R: BufRead>(buf: &mut R) -> Result<Option<u64>> {
    let mut line = String::new();
    buf.read_line(&mut line)?;
    let raw = line.trim();
    if raw.is_empty() || raw == "max" {
        return Ok(None);
    }

    raw.parse::<u64>()
        .map(Some)
        .map_err(|source| ParseError::InvalidValue {
            value: raw.to_owned(),
            line: 1,
            source,
        })
}

/// Parses `cpu.max`, formatted as `<quota|max> [period]`.
pub fn parse_cpu_max<R: BufRead>(buf: &mut R) -> Result<CpuSpec> {
    let mut line = String::new();
    buf.read_line(&mut line)?;
    let mut parts = line.split_whitespace();

    let quota = match parts.next() {
        None | Some("max") => None,
        Some(raw) => Some(raw.parse::<u64>().map_err(|source| ParseError::InvalidValue {
            value: raw.to_owned(),
            line: 1,
            source,
        })?),
    };
    let period = match parts.next() {
        None => DEFAULT_CPU_PERIOD,
        Some(raw) => raw.parse::<u64>().map_err(|source| ParseError::InvalidValue {
            value: raw.to_owned(),
            line: 1,
            source,
        })?,
    };

    Ok(CpuSpec { quota, period })
}

fn parse_key_value(key: &str, raw: &str, line: usize) -> Result<u64> {
    raw.parse::<u64>()
        .map_err(|source| ParseError::InvalidKeyValue {
            key: key.to_owned(),
            value: raw.to_owned(),
            line,
            source,
        })
}

//! Parser for the `-test` output of a line-protocol monitoring tool.
//!
//! Only measurement lines are understood:
//!
//! ```text
//! > ping,url=www.google.com average_response_ms=2.596,packets_received=1i 1454321712994367057
//! ```
//!
//! Every other line (banners, plugin headers, blank lines) yields nothing.
//! The parser never fails; malformed parts are skipped silently.

use serde::{Deserialize, Serialize};

/// Prefix of every plugin name produced by this parser.
pub const SOURCE_TOOL: &str = "telegraf";

const LINE_MARKER: &str = ">";

/// A single time-series point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    /// `telegraf.<measurement>`.
    pub plugin: String,
    /// Chart-qualified series name, never empty.
    pub gauge: String,
    /// Decimal rendering of the value with any integer suffix removed.
    pub value: String,
}

/// Parses one line of output into zero or more metrics.
pub fn parse_line(line: &str) -> Vec<Metric> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.first() != Some(&LINE_MARKER) || tokens.len() != 4 {
        return Vec::new();
    }

    let mut meta = tokens[1].split(',').filter(|s| !s.is_empty());
    let Some(base) = meta.next() else {
        return Vec::new();
    };
    let tags: Vec<&str> = meta.collect();
    // Untagged measurements are not reported.
    if tags.is_empty() {
        return Vec::new();
    }

    let suffix = chart_suffix(&tags);
    let plugin = format!("{}.{}", SOURCE_TOOL, base);

    tokens[2]
        .split(',')
        .filter_map(split_field)
        .map(|(key, raw)| Metric {
            plugin: plugin.clone(),
            gauge: format!("{}{}.{}", base, suffix, clean_name(key)),
            value: normalize_value(raw),
        })
        .filter(|m| !m.gauge.is_empty())
        .collect()
}

/// Parses a whole block of output, line by line.
pub fn parse_output(output: &str) -> Vec<Metric> {
    output.lines().flat_map(parse_line).collect()
}

/// `url=www.google.com` → `url:wwwgooglecom`; `host*` tags are ignored.
fn chart_suffix(tags: &[&str]) -> String {
    tags.iter()
        .filter(|tag| !tag.starts_with("host"))
        .copied()
        .collect::<Vec<_>>()
        .join("|")
        .replace('.', "")
        .replace('=', ":")
}

fn split_field(field: &str) -> Option<(&str, &str)> {
    let parts: Vec<&str> = field.split('=').filter(|s| !s.is_empty()).collect();
    match parts.as_slice() {
        [key, value] => Some((key, value)),
        _ => None,
    }
}

/// `average_response_ms` → `average.response.ms`.
///
/// Names with more than two segments and names with at most two are joined
/// the same way; the branches are kept apart so either can diverge later.
#[allow(clippy::if_same_then_else)]
fn clean_name(key: &str) -> String {
    let segments: Vec<&str> = key.split('_').filter(|s| !s.is_empty()).collect();
    if segments.len() > 2 {
        segments.join(".")
    } else {
        segments.join(".")
    }
}

/// Canonical decimal for floats; otherwise drop an `i`/`u` integer suffix.
fn normalize_value(raw: &str) -> String {
    match raw.parse::<f64>() {
        Ok(v) => format!("{}", v),
        Err(_) => raw
            .strip_suffix('i')
            .or_else(|| raw.strip_suffix('u'))
            .unwrap_or(raw)
            .to_string(),
    }
}

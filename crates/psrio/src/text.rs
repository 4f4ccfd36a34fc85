//! Line-oriented text headers.
//!
//! Two modes share this module:
//!
//! - **Table-driven** ([`parse_table`]/[`write_table`]): `description = value`
//!   lines whose description is looked up in a [`TextTable`]. INF and
//!   BESTPROF headers use this mode. Lines that match nothing are kept as
//!   free-text notes.
//! - **Positional** ([`parse_positional`]): `key value [fit] [error]` lines
//!   with the value type taken from a [`ParSchema`] or guessed. PAR files use
//!   this mode.

use std::collections::HashMap;
use std::sync::OnceLock;

use log::debug;
use regex_lite::Regex;

use crate::error::{Error, Result};
use crate::record::HeaderRecord;
use crate::value::{format_float, parse_float, Value};

/// How a text value converts to a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Str,
    Int,
    Float,
    /// `1` or `0` (any non-zero integer is true).
    Flag,
    /// `quantity +/- error`, stored as `<name>` and `<name>err`.
    Measured,
    /// `p   (~N sigma)`, stored as `<name>` and `<name>sigma`.
    Significance,
}

/// One row of a [`TextTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextField {
    pub description: &'static str,
    pub name: &'static str,
    pub kind: TextKind,
}

impl TextField {
    pub const fn new(description: &'static str, name: &'static str, kind: TextKind) -> Self {
        TextField {
            description,
            name,
            kind,
        }
    }
}

/// Description → field table plus the line layout of one text format.
#[derive(Debug, Clone, Copy)]
pub struct TextTable {
    pub fields: &'static [TextField],
    /// Leading comment character stripped before matching (`#` for BESTPROF).
    pub comment: Option<char>,
    /// Column width the description is padded to on write.
    pub width: usize,
    /// Text between the padded description and the separator on write.
    pub gap: &'static str,
    /// Whether a literal `N/A` decodes to [`Value::Null`].
    pub allow_null: bool,
    /// Flag field after which `On/Off bin pair` lines may appear.
    pub breaks: Option<&'static str>,
    /// Heading that introduces the free-text notes block.
    pub notes_heading: Option<&'static str>,
}

impl TextTable {
    pub fn by_description(&self, description: &str) -> Option<&'static TextField> {
        self.fields.iter().find(|f| f.description == description)
    }

    /// The first (canonical) row for `name`.
    pub fn by_name(&self, name: &str) -> Option<&'static TextField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A decoded text header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextHeader {
    pub record: HeaderRecord,
    pub onoffs: Vec<(i64, i64)>,
    pub notes: Vec<String>,
}

const ONOFF_PREFIX: &str = "On/Off bin pair";
const MEASURED_SUFFIX: &str = "err";
const SIGMA_SUFFIX: &str = "sigma";

fn measured_regex() -> &'static Regex {
    static MEASURED_ONCE: OnceLock<Regex> = OnceLock::new();
    MEASURED_ONCE.get_or_init(|| Regex::new(r"^(\S+)\s+\+/-\s+(\S+)$").unwrap())
}

fn significance_regex() -> &'static Regex {
    static SIGNIFICANCE_ONCE: OnceLock<Regex> = OnceLock::new();
    SIGNIFICANCE_ONCE.get_or_init(|| Regex::new(r"^(\S+)\s+\(~\s*(\S+)\s+sigma\)$").unwrap())
}

/// Split a line at the first `=` or `<` that has whitespace on both sides.
///
/// A separator at the very end of the line yields an empty value.
fn split_line(line: &str) -> Option<(&str, &str)> {
    let bytes = line.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b != b'=' && b != b'<' {
            continue;
        }
        let before = i > 0 && bytes[i - 1].is_ascii_whitespace();
        let after = i + 1 == bytes.len() || bytes[i + 1].is_ascii_whitespace();
        if before && after {
            return Some((line[..i].trim(), line[i + 1..].trim()));
        }
    }
    None
}

fn parse_int(field: &str, raw: &str, line: usize) -> Result<i64> {
    raw.parse()
        .map_err(|_| Error::convert(field, raw, Some(line)))
}

fn parse_f64(field: &str, raw: &str, line: usize) -> Result<f64> {
    parse_float(raw).ok_or_else(|| Error::convert(field, raw, Some(line)))
}

fn convert_into(
    record: &mut HeaderRecord,
    field: &TextField,
    raw: &str,
    table: &TextTable,
    line: usize,
) -> Result<()> {
    if table.allow_null && raw == "N/A" {
        record.insert(field.name, Value::Null);
        return Ok(());
    }
    let value = match field.kind {
        TextKind::Str => Value::Str(raw.to_string()),
        TextKind::Int => Value::Int64(parse_int(field.name, raw, line)?),
        TextKind::Float => Value::Float64(parse_f64(field.name, raw, line)?),
        TextKind::Flag => Value::Bool(parse_int(field.name, raw, line)? != 0),
        TextKind::Measured => match measured_regex().captures(raw) {
            Some(caps) => {
                let err = parse_f64(field.name, &caps[2], line)?;
                record.insert(field.name, Value::Float64(parse_f64(field.name, &caps[1], line)?));
                record.insert(format!("{}{MEASURED_SUFFIX}", field.name), Value::Float64(err));
                return Ok(());
            }
            None => Value::Float64(parse_f64(field.name, raw, line)?),
        },
        TextKind::Significance => {
            let caps = significance_regex()
                .captures(raw)
                .ok_or_else(|| Error::convert(field.name, raw, Some(line)))?;
            let sigma = parse_f64(field.name, &caps[2], line)?;
            record.insert(field.name, Value::Float64(parse_f64(field.name, &caps[1], line)?));
            record.insert(format!("{}{SIGMA_SUFFIX}", field.name), Value::Float64(sigma));
            return Ok(());
        }
    };
    record.insert(field.name, value);
    Ok(())
}

fn parse_onoff(raw: &str, line: usize) -> Result<(i64, i64)> {
    let (a, b) = raw
        .split_once(',')
        .ok_or_else(|| Error::convert("onoffs", raw, Some(line)))?;
    Ok((
        parse_int("onoffs", a.trim(), line)?,
        parse_int("onoffs", b.trim(), line)?,
    ))
}

/// Decode a table-driven text header.
///
/// Line numbers in errors are 1-based.
pub fn parse_table(text: &str, table: &TextTable) -> Result<TextHeader> {
    let mut out = TextHeader::default();
    let mut in_notes = false;

    for (idx, raw_line) in text.lines().enumerate() {
        let lineno = idx + 1;
        let mut line = raw_line.trim();
        if let Some(c) = table.comment {
            line = line.strip_prefix(c).unwrap_or(line).trim_start();
        }
        if line.is_empty() {
            continue;
        }
        if in_notes {
            out.notes.push(line.to_string());
            continue;
        }
        if table.notes_heading == Some(line) {
            in_notes = true;
            continue;
        }
        let Some((description, value)) = split_line(line) else {
            out.notes.push(line.to_string());
            continue;
        };
        if let Some(field) = table.by_description(description) {
            convert_into(&mut out.record, field, value, table, lineno)?;
            continue;
        }
        let breaks_seen = table
            .breaks
            .and_then(|name| out.record.get_bool(name))
            .unwrap_or(false);
        if breaks_seen && description.starts_with(ONOFF_PREFIX) {
            out.onoffs.push(parse_onoff(value, lineno)?);
        } else {
            debug!("unrecognised header line {lineno} kept as a note");
            out.notes.push(line.to_string());
        }
    }
    Ok(out)
}

/// The text form of `value` for a field of `kind`.
fn render(record: &HeaderRecord, field: &TextField, value: &Value) -> String {
    match (field.kind, value) {
        (_, Value::Null) => "N/A".to_string(),
        (TextKind::Measured, v) => {
            let key = format!("{}{MEASURED_SUFFIX}", field.name);
            match record.get_f64(&key) {
                Some(err) => format!("{} +/- {}", number(v), format_float(err)),
                None => number(v),
            }
        }
        (TextKind::Significance, v) => {
            let key = format!("{}{SIGMA_SUFFIX}", field.name);
            let sigma = record.get_f64(&key).unwrap_or(0.0);
            format!("{}   (~{} sigma)", number(v), format_float(sigma))
        }
        (_, v) => v.to_string(),
    }
}

fn number(v: &Value) -> String {
    match v.as_f64() {
        Some(f) => format_float(f),
        None => v.to_string(),
    }
}

/// Encode a table-driven text header.
///
/// Fields are written in record order using each field's canonical
/// description. Record keys with no table row (such as the `err` and
/// `sigma` halves of split values) are not written on their own.
pub fn write_table(header: &TextHeader, table: &TextTable) -> String {
    let prefix = match table.comment {
        Some(c) => format!("{c} "),
        None => " ".to_string(),
    };
    let width = table.width;
    let gap = table.gap;
    let mut lines = Vec::new();

    for (key, value) in &header.record {
        let Some(field) = table.by_name(key) else {
            continue;
        };
        let sep = if field.kind == TextKind::Significance { '<' } else { '=' };
        let rendered = render(&header.record, field, value);
        lines.push(format!(
            "{prefix}{:<width$}{gap}{sep}  {rendered}",
            field.description
        ));
        if table.breaks == Some(field.name) && value.as_bool() == Some(true) {
            for (i, (a, b)) in header.onoffs.iter().enumerate() {
                let description = format!("{ONOFF_PREFIX} #{:>3}", i + 1);
                let pair = format!("{a:<11}, {b}");
                lines.push(format!("{prefix}{description:<width$}{gap}=  {pair}"));
            }
        }
    }

    if let Some(heading) = table.notes_heading {
        lines.push(format!("{prefix}{heading}"));
        for note in &header.notes {
            lines.push(format!("    {note}"));
        }
    }

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

/// Known keys of a positional (`key value`) text format and their types.
#[derive(Debug, Clone, Copy)]
pub struct ParSchema {
    pub strings: &'static [&'static str],
    pub integers: &'static [&'static str],
    pub floats: &'static [&'static str],
}

impl ParSchema {
    /// Convert `raw` for `key`.
    ///
    /// Known keys use their declared type. Others are guessed: a `:` keeps
    /// the text as a string (sexagesimal angles and similar), then integer,
    /// then float (Fortran `D` exponents accepted), then string. The guess
    /// is approximate; an all-digit identifier becomes an integer unless
    /// the key is listed in `strings`.
    pub fn classify(&self, key: &str, raw: &str, line: Option<usize>) -> Result<Value> {
        if self.strings.contains(&key) {
            return Ok(Value::Str(raw.to_string()));
        }
        if self.integers.contains(&key) {
            return raw
                .parse()
                .map(Value::Int64)
                .map_err(|_| Error::convert(key, raw, line));
        }
        if self.floats.contains(&key) {
            return parse_float(raw)
                .map(Value::Float64)
                .ok_or_else(|| Error::convert(key, raw, line));
        }
        Ok(guess(raw))
    }
}

fn guess(raw: &str) -> Value {
    if raw.contains(':') {
        return Value::Str(raw.to_string());
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Int64(i);
    }
    match parse_float(raw) {
        Some(f) if raw.bytes().any(|b| b.is_ascii_digit()) => Value::Float64(f),
        _ => Value::Str(raw.to_string()),
    }
}

/// Suffix appended to a key to store its uncertainty.
pub const ERROR_SUFFIX: &str = "_ERR";

/// A decoded positional text file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionalText {
    pub record: HeaderRecord,
    pub fits: HashMap<String, i64>,
}

/// Decode `key value [fit] [error]` lines.
///
/// With two tokens after the key the second is the error; with three or
/// more the second is the fit flag and the last is the error. Errors are
/// stored under `<KEY>_ERR`.
pub fn parse_positional(text: &str, schema: &ParSchema) -> Result<PositionalText> {
    let mut out = PositionalText::default();
    for (idx, line) in text.lines().enumerate() {
        let lineno = Some(idx + 1);
        let mut tokens = line.split_whitespace();
        let Some(key) = tokens.next() else {
            continue;
        };
        let rest: Vec<&str> = tokens.collect();
        let Some(&raw) = rest.first() else {
            debug!("key {key:?} on line {} has no value", idx + 1);
            out.record.insert(key, Value::Str(String::new()));
            continue;
        };
        out.record.insert(key, schema.classify(key, raw, lineno)?);
        if rest.len() >= 3 {
            let fit = rest[1]
                .parse()
                .map_err(|_| Error::convert(key, rest[1], lineno))?;
            out.fits.insert(key.to_string(), fit);
        }
        if rest.len() >= 2 {
            let err_raw = rest[rest.len() - 1];
            let err = parse_float(err_raw)
                .map(Value::Float64)
                .unwrap_or_else(|| guess(err_raw));
            out.record.insert(format!("{key}{ERROR_SUFFIX}"), err);
        }
    }
    Ok(out)
}

/// Encode `key value [fit] [error]` lines in record order.
pub fn write_positional(parsed: &PositionalText) -> String {
    let mut text = String::new();
    for (key, value) in &parsed.record {
        if let Some(base) = key.strip_suffix(ERROR_SUFFIX) {
            if parsed.record.contains(base) {
                continue;
            }
        }
        let mut line = format!("{key:<12} {value}");
        let err = parsed.record.get(&format!("{key}{ERROR_SUFFIX}"));
        if let Some(fit) = parsed.fits.get(key) {
            line.push_str(&format!(" {fit}"));
        }
        if let Some(err) = err {
            line.push_str(&format!(" {err}"));
        }
        text.push_str(line.trim_end());
        text.push('\n');
    }
    text
}

//! Value conversion between host types and SQLite storage classes
//!
//! SQLite stores only five storage classes: NULL, INTEGER, REAL, TEXT and BLOB.
//! Every richer value the import pipeline handles collapses to one of them:
//!
//! | Value       | Stored  | Form                                          |
//! |-------------|---------|-----------------------------------------------|
//! | timestamp   | TEXT    | UTC RFC 3339 with `Z`, whole seconds          |
//! | date        | TEXT    | `YYYY-MM-DD`                                  |
//! | boolean     | INTEGER | `1` / `0`                                     |
//! | IP address  | TEXT    | canonical address, malformed input → NULL     |
//! | blob        | BLOB    | raw bytes, empty or blank input → NULL        |
//! | JSON        | TEXT    | compact JSON                                  |
//!
//! The `format_*` / `to_blob` / `to_json` functions encode, the `to_*` /
//! `from_json` functions decode. [`Value`] ties both directions together and
//! binds directly as a statement parameter.

use std::net::IpAddr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use ipnet::IpNet;
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{DatabaseError, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";
/// Offset-less layouts read as UTC: ISO-8601 without a zone and SQLite's
/// `datetime()` / `strftime('%Y-%m-%d %H:%M:%f')` output
const NAIVE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

// =============================================================================
// Encoding
// =============================================================================

/// Format a timestamp as UTC ISO-8601 text, truncated to whole seconds
pub fn format_datetime<Tz: TimeZone>(value: Option<&DateTime<Tz>>) -> Option<String> {
    value.map(|v| {
        v.with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Secs, true)
    })
}

/// Anything that has a calendar date
pub trait CalendarDate {
    fn calendar_date(&self) -> NaiveDate;
}

impl CalendarDate for NaiveDate {
    fn calendar_date(&self) -> NaiveDate {
        *self
    }
}

impl<Tz: TimeZone> CalendarDate for DateTime<Tz> {
    fn calendar_date(&self) -> NaiveDate {
        self.with_timezone(&Utc).date_naive()
    }
}

/// Format a date (or the UTC date of a timestamp) as ISO-8601 text
pub fn format_date<D: CalendarDate + ?Sized>(value: Option<&D>) -> Option<String> {
    value.map(|v| v.calendar_date().format(DATE_FORMAT).to_string())
}

pub fn format_boolean(value: Option<bool>) -> Option<i64> {
    value.map(i64::from)
}

/// Normalize an IP address to its canonical text form
///
/// A CIDR string stores its network address. Blank or malformed input maps to
/// `None` instead of failing, and surrounding whitespace counts as malformed:
/// legacy source data carries unparseable values that must not abort an
/// import run.
pub fn format_ip_address(value: Option<&str>) -> Option<String> {
    let raw = value?;
    if raw.trim().is_empty() {
        return None;
    }

    if let Ok(addr) = raw.parse::<IpAddr>() {
        return Some(addr.to_string());
    }

    match raw.parse::<IpNet>() {
        Ok(net) => Some(net.network().to_string()),
        Err(e) => {
            debug!("Dropping malformed IP address '{}': {}", raw, e);
            None
        }
    }
}

/// Prepare bytes for BLOB storage; empty or whitespace-only input is `None`
pub fn to_blob(value: Option<&[u8]>) -> Option<Vec<u8>> {
    let bytes = value?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    Some(bytes.to_vec())
}

/// Serialize a structured value to compact JSON text
pub fn to_json<T: Serialize + ?Sized>(value: Option<&T>) -> Result<Option<String>> {
    value
        .map(|v| serde_json::to_string(v).map_err(|e| DatabaseError::codec("json", e)))
        .transpose()
}

// =============================================================================
// Decoding
// =============================================================================

fn present(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|t| !t.is_empty())
}

/// Parse ISO-8601 text back into a UTC timestamp
///
/// Text without an offset is read as UTC.
pub fn to_datetime(text: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    let Some(text) = present(text) else {
        return Ok(None);
    };

    let offset_err = match DateTime::parse_from_rfc3339(text) {
        Ok(dt) => return Ok(Some(dt.with_timezone(&Utc))),
        Err(e) => e,
    };

    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| Some(naive.and_utc()))
        .ok_or_else(|| DatabaseError::codec("timestamp", format!("'{}': {}", text, offset_err)))
}

pub fn to_date(text: Option<&str>) -> Result<Option<NaiveDate>> {
    let Some(text) = present(text) else {
        return Ok(None);
    };

    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .map(Some)
        .map_err(|e| DatabaseError::codec("date", format!("'{}': {}", text, e)))
}

/// Stored `1` (or `1.0` from a REAL column) is true; every other value,
/// NULL included, is false
pub fn to_boolean(value: &SqlValue) -> bool {
    match value {
        SqlValue::Integer(i) => *i == 1,
        SqlValue::Real(r) => *r == 1.0,
        _ => false,
    }
}

pub fn from_json<T: DeserializeOwned>(text: Option<&str>) -> Result<Option<T>> {
    text.map(|t| serde_json::from_str(t).map_err(|e| DatabaseError::codec("json", e)))
        .transpose()
}

// =============================================================================
// Value
// =============================================================================

/// The kinds of value the import pipeline reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Integer,
    Real,
    Boolean,
    Date,
    Timestamp,
    Blob,
    Json,
    IpAddress,
}

impl ValueKind {
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Text => "text",
            ValueKind::Integer => "integer",
            ValueKind::Real => "real",
            ValueKind::Boolean => "boolean",
            ValueKind::Date => "date",
            ValueKind::Timestamp => "timestamp",
            ValueKind::Blob => "blob",
            ValueKind::Json => "json",
            ValueKind::IpAddress => "ip address",
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A host-level value passed into or read out of a database
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Blob(Vec<u8>),
    Json(serde_json::Value),
    /// Raw address text; normalized (or dropped) when encoded
    IpAddress(String),
}

fn or_null<T>(value: Option<T>, wrap: impl FnOnce(T) -> SqlValue) -> SqlValue {
    value.map(wrap).unwrap_or(SqlValue::Null)
}

fn storage_class(value: &SqlValue) -> &'static str {
    match value {
        SqlValue::Null => "null",
        SqlValue::Integer(_) => "integer",
        SqlValue::Real(_) => "real",
        SqlValue::Text(_) => "text",
        SqlValue::Blob(_) => "blob",
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Convert to the primitive SQLite stores
    pub fn encode(&self) -> SqlValue {
        match self {
            Value::Null => SqlValue::Null,
            Value::Text(s) => SqlValue::Text(s.clone()),
            Value::Integer(i) => SqlValue::Integer(*i),
            Value::Real(r) => SqlValue::Real(*r),
            Value::Boolean(b) => or_null(format_boolean(Some(*b)), SqlValue::Integer),
            Value::Date(d) => or_null(format_date(Some(d)), SqlValue::Text),
            Value::Timestamp(t) => or_null(format_datetime(Some(t)), SqlValue::Text),
            Value::Blob(bytes) => or_null(to_blob(Some(bytes.as_slice())), SqlValue::Blob),
            // Display for serde_json::Value is compact and cannot fail
            Value::Json(json) => SqlValue::Text(json.to_string()),
            Value::IpAddress(raw) => or_null(format_ip_address(Some(raw.as_str())), SqlValue::Text),
        }
    }

    /// Rebuild a value of `kind` from its stored primitive
    ///
    /// Stored NULL decodes to [`Value::Null`] for every kind.
    pub fn decode(kind: ValueKind, stored: &SqlValue) -> Result<Value> {
        let mismatch = || {
            DatabaseError::codec(
                kind.name(),
                format!("unexpected {} storage", storage_class(stored)),
            )
        };

        let value = match (kind, stored) {
            (_, SqlValue::Null) => Value::Null,
            (ValueKind::Boolean, v) => Value::Boolean(to_boolean(v)),
            (ValueKind::Integer, SqlValue::Integer(i)) => Value::Integer(*i),
            (ValueKind::Real, SqlValue::Real(r)) => Value::Real(*r),
            (ValueKind::Real, SqlValue::Integer(i)) => Value::Real(*i as f64),
            (ValueKind::Blob, SqlValue::Blob(b)) => Value::Blob(b.clone()),
            (ValueKind::Blob, SqlValue::Text(t)) => Value::Blob(t.as_bytes().to_vec()),
            (ValueKind::Text, SqlValue::Text(t)) => Value::Text(t.clone()),
            (ValueKind::IpAddress, SqlValue::Text(t)) => Value::IpAddress(t.clone()),
            (ValueKind::Date, SqlValue::Text(t)) => {
                to_date(Some(t.as_str()))?.map(Value::Date).unwrap_or(Value::Null)
            }
            (ValueKind::Timestamp, SqlValue::Text(t)) => to_datetime(Some(t.as_str()))?
                .map(Value::Timestamp)
                .unwrap_or(Value::Null),
            (ValueKind::Json, SqlValue::Text(t)) => from_json(Some(t.as_str()))?
                .map(Value::Json)
                .unwrap_or(Value::Null),
            _ => return Err(mismatch()),
        };
        Ok(value)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Owned(self.encode()))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Value {
    fn from(v: DateTime<Tz>) -> Self {
        Value::Timestamp(v.with_timezone(&Utc))
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Blob(v.to_vec())
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl From<IpAddr> for Value {
    fn from(v: IpAddr) -> Self {
        Value::IpAddress(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

//! Decoding of raw Redis entries into [`LogRecord`]s.
//!
//! Both source shapes are reduced to a JSON object and go through the same
//! field lookup, so the accepted aliases are identical for list elements and
//! hash keys.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use crate::models::{LogLevel, LogRecord};

const LEVEL_FIELDS: &[&str] = &["log_level", "level"];
const SERVICE_FIELDS: &[&str] = &["service", "username"];
const TIMESTAMP_FIELDS: &[&str] = &["datetime", "timestamp"];
const METADATA_FIELD: &str = "metadata";

/// An undecoded entry as read from Redis.
#[derive(Debug, Clone, PartialEq)]
pub enum RawEntry {
    /// Element of the log list, with its position in the list
    Json { index: usize, bytes: Vec<u8> },
    /// All fields of one hash key
    Hash {
        key: String,
        fields: HashMap<String, Vec<u8>>,
    },
    /// A matching key that does not hold a hash
    Unreadable { key: String, reason: String },
}

impl RawEntry {
    /// Identifier of the record this entry would produce
    pub fn record_id(&self) -> String {
        match self {
            RawEntry::Json { index, .. } => index.to_string(),
            RawEntry::Hash { key, .. } | RawEntry::Unreadable { key, .. } => {
                match key.split_once(':') {
                    Some((_, suffix)) if !suffix.is_empty() => suffix.to_string(),
                    _ => key.clone(),
                }
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("{0}")]
    Unreadable(String),

    #[error("entry is not a JSON object")]
    NotAnObject,

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("{0}")]
    InvalidLevel(String),

    #[error("unparsable timestamp {0:?}")]
    InvalidTimestamp(String),
}

/// Result of decoding a batch of raw entries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decoded {
    pub records: Vec<LogRecord>,
    pub skipped: usize,
}

/// Decode every entry, dropping (and counting) the ones that fail.
pub fn decode_all(entries: &[RawEntry], connection_id: i64) -> Decoded {
    let mut decoded = Decoded::default();

    for entry in entries {
        match decode_entry(entry, connection_id) {
            Ok(record) => decoded.records.push(record),
            Err(e) => {
                log::warn!("Skipping log entry {}: {}", entry.record_id(), e);
                decoded.skipped += 1;
            }
        }
    }

    decoded
}

pub fn decode_entry(entry: &RawEntry, connection_id: i64) -> Result<LogRecord, DecodeError> {
    let fields = match entry {
        RawEntry::Json { bytes, .. } => {
            match serde_json::from_str::<Value>(std::str::from_utf8(bytes)?)? {
                Value::Object(map) => map,
                _ => return Err(DecodeError::NotAnObject),
            }
        }
        RawEntry::Hash { fields, .. } => hash_to_object(fields)?,
        RawEntry::Unreadable { reason, .. } => return Err(DecodeError::Unreadable(reason.clone())),
    };

    decode_fields(entry.record_id(), &fields, connection_id)
}

/// Hash fields are flat strings; only `metadata` carries nested JSON.
fn hash_to_object(fields: &HashMap<String, Vec<u8>>) -> Result<Map<String, Value>, DecodeError> {
    fields
        .iter()
        .map(|(name, raw)| {
            let text = std::str::from_utf8(raw)?;
            let value = if name == METADATA_FIELD {
                match serde_json::from_str::<Value>(text) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        log::debug!("Ignoring undecodable metadata: {}", e);
                        Value::Null
                    }
                }
            } else {
                Value::String(text.to_string())
            };
            Ok((name.clone(), value))
        })
        .collect()
}

fn decode_fields(
    id: String,
    fields: &Map<String, Value>,
    connection_id: i64,
) -> Result<LogRecord, DecodeError> {
    let level = first_text(fields, LEVEL_FIELDS).ok_or(DecodeError::MissingField("log_level"))?;
    let level: LogLevel = level.parse().map_err(DecodeError::InvalidLevel)?;

    let message = first_text(fields, &["message"]).ok_or(DecodeError::MissingField("message"))?;
    let service =
        first_text(fields, SERVICE_FIELDS).ok_or(DecodeError::MissingField("username"))?;

    let raw_timestamp =
        first_text(fields, TIMESTAMP_FIELDS).ok_or(DecodeError::MissingField("datetime"))?;
    let timestamp = parse_timestamp(&raw_timestamp)
        .ok_or_else(|| DecodeError::InvalidTimestamp(raw_timestamp.clone()))?;

    let metadata = match fields.get(METADATA_FIELD) {
        Some(Value::Object(map)) => Some(map.clone()),
        _ => None,
    };

    Ok(LogRecord {
        id,
        connection_id,
        event_id: first_text(fields, &["event_id"]),
        level,
        message,
        service,
        timestamp,
        metadata,
    })
}

/// First non-empty value among `names`, numbers rendered as text.
fn first_text(fields: &Map<String, Value>, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| match fields.get(*name) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Accepts RFC 3339, naive `date time` forms (read as UTC), bare dates and
/// epoch milliseconds.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }

    if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
        return raw
            .parse::<i64>()
            .ok()
            .and_then(DateTime::from_timestamp_millis);
    }

    None
}

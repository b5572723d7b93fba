//! Event list post-processing: date normalization and place flattening.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::{Map, Value};

use super::error::ContentApiError;

/// Datetime formats carrying an explicit offset, tried after RFC 3339.
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Datetime formats without an offset (interpreted as UTC).
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parses an API timestamp.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff][+HH:MM]`,
/// `YYYY-MM-DDTHH:MM:SS[.fff]` and `YYYY-MM-DD` (midnight).
/// Values without an offset are taken as UTC.
///
/// # Errors
///
/// Returns the last parse error if no format matches.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    let s = raw.trim();

    let mut last_err = match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => return Ok(dt),
        Err(e) => e,
    };

    for fmt in OFFSET_FORMATS {
        match DateTime::parse_from_str(s, fmt) {
            Ok(dt) => return Ok(dt),
            Err(e) => last_err = e,
        }
    }

    for fmt in NAIVE_FORMATS {
        match NaiveDateTime::parse_from_str(s, fmt) {
            Ok(dt) => return Ok(dt.and_utc().fixed_offset()),
            Err(e) => last_err = e,
        }
    }

    match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        Ok(date) => Ok(date.and_time(NaiveTime::MIN).and_utc().fixed_offset()),
        Err(_) => Err(last_err),
    }
}

/// Normalizes every item of the `events` array in place.
///
/// For each item: `nearest` and `latest` are popped and re-inserted as
/// parsed RFC 3339 timestamps, `latest` becomes `null` when it is empty or
/// equal to the raw `nearest`, and `event_place.slug` / `event_place.name`
/// are copied to `place_slug` / `place_name`.
///
/// Bodies without an `events` array and non-object items are left as-is.
///
/// # Errors
///
/// Returns `ContentApiError::Date` if a date field cannot be parsed.
pub fn normalize_events(body: &mut Value) -> Result<(), ContentApiError> {
    let Some(events) = body.get_mut("events").and_then(Value::as_array_mut) else {
        return Ok(());
    };

    for item in events.iter_mut() {
        if let Some(fields) = item.as_object_mut() {
            normalize_item(fields)?;
        }
    }
    Ok(())
}

/// Non-empty string content of a raw date field.
fn raw_date(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn to_timestamp_value(field: &'static str, raw: &str) -> Result<Value, ContentApiError> {
    let parsed = parse_timestamp(raw).map_err(|source| ContentApiError::Date {
        field,
        value: String::from(raw),
        source,
    })?;
    Ok(Value::String(parsed.to_rfc3339()))
}

fn normalize_item(fields: &mut Map<String, Value>) -> Result<(), ContentApiError> {
    let nearest_raw = fields.remove("nearest");
    let latest_raw = fields.remove("latest");
    let nearest = raw_date(nearest_raw.as_ref());
    let latest = raw_date(latest_raw.as_ref());

    if let Some(raw) = nearest {
        fields.insert(
            String::from("nearest"),
            to_timestamp_value("nearest", raw)?,
        );
    }

    let latest_value = match latest {
        Some(raw) if Some(raw) != nearest => to_timestamp_value("latest", raw)?,
        _ => Value::Null,
    };
    fields.insert(String::from("latest"), latest_value);

    let place = fields.get("event_place").and_then(Value::as_object);
    let slug = place
        .and_then(|p| p.get("slug"))
        .cloned()
        .unwrap_or(Value::Null);
    let name = place
        .and_then(|p| p.get("name"))
        .cloned()
        .unwrap_or(Value::Null);
    fields.insert(String::from("place_slug"), slug);
    fields.insert(String::from("place_name"), name);

    Ok(())
}

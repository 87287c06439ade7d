//! Persisted user records and the credential database document.
//!
//! The whole store is one JSON document shaped like:
//!
//! ```json
//! { "users": { "alice": { "registered": "...", "preferences": {...}, "context": {...} } } }
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

/// Free-form preference object. Keys are unique; values are any JSON value.
pub type Preferences = Map<String, Value>;

/// Instructions every new profile starts with. The consuming agent reads these
/// to decide how to lay out a briefing.
pub const DEFAULT_INSTRUCTIONS: &str = "Format each story as \"**HEADLINE** - one sentence on why it matters\". \
Group stories by section, lead with the most important item, and keep the briefing under 300 words.";

/// Returns the preference object a fresh or reset profile holds.
pub fn default_preferences() -> Preferences {
    let mut prefs = Preferences::new();
    prefs.insert(
        "instructions".to_string(),
        Value::String(DEFAULT_INSTRUCTIONS.to_string()),
    );
    prefs
}

/// A single user's stored profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Creation time. Written once, never changed afterwards.
    ///
    /// A hand-edited record without a readable timestamp is stamped with the load time.
    #[serde(default = "Utc::now", deserialize_with = "lenient_timestamp")]
    pub registered: DateTime<Utc>,

    #[serde(default, deserialize_with = "object_or_empty")]
    pub preferences: Preferences,

    #[serde(
        default,
        deserialize_with = "optional_object",
        skip_serializing_if = "Option::is_none"
    )]
    pub context: Option<Map<String, Value>>,
}

impl UserRecord {
    /// Builds a record registered at `now` with the default preferences and no context.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            registered: now,
            preferences: default_preferences(),
            context: None,
        }
    }
}

/// The full credential document: username -> record.
///
/// A `BTreeMap` keeps the file output stable across writes.
///
/// Records are read one by one: a record that is not a JSON object is dropped with a
/// warning and the rest of the document still loads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialDatabase {
    #[serde(default, deserialize_with = "tolerant_users")]
    pub users: BTreeMap<String, UserRecord>,
}

/// Accepts any JSON value for `preferences`, keeping it only if it is an object.
///
/// A hand-edited file with e.g. `"preferences": "dark"` would otherwise make the
/// whole document unreadable and drop every other user with it.
fn object_or_empty<'de, D>(deserializer: D) -> std::result::Result<Preferences, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Preferences::new()),
        other => {
            warn!(
                "Ignoring non-object preferences value in credential file: {}",
                other
            );
            Ok(Preferences::new())
        },
    }
}

/// Like `object_or_empty`, but keeps "absent" (`null`) apart from "empty".
fn optional_object<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Map<String, Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Object(map) => Ok(Some(map)),
        Value::Null => Ok(None),
        other => {
            warn!("Ignoring non-object context value in credential file: {}", other);
            Ok(Some(Map::new()))
        },
    }
}

/// Reads `registered` from RFC 3339, a naive ISO 8601 date-time (taken as UTC), a bare
/// date (midnight UTC) or Unix seconds. Anything else falls back to the current time.
fn lenient_timestamp<'de, D>(
    deserializer: D,
) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match parse_timestamp(&value) {
        Some(when) => Ok(when),
        None => {
            warn!(
                "Unreadable registration time {} in credential file; using the current time",
                value
            );
            Ok(Utc::now())
        },
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    if let Some(secs) = value.as_i64() {
        return Utc.timestamp_opt(secs, 0).single();
    }
    let raw = value.as_str()?.trim();

    if let Ok(when) = DateTime::parse_from_rfc3339(raw) {
        return Some(when.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn tolerant_users<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, UserRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Value::deserialize(deserializer)? {
        Value::Object(map) => map,
        Value::Null => return Ok(BTreeMap::new()),
        other => {
            warn!("Ignoring non-object users value in credential file: {}", other);
            return Ok(BTreeMap::new());
        },
    };

    let mut users = BTreeMap::new();
    for (name, value) in raw {
        if !value.is_object() {
            warn!("Dropping record for {}: expected an object, got {}", name, value);
            continue;
        }
        match serde_json::from_value::<UserRecord>(value) {
            Ok(record) => {
                users.insert(name, record);
            },
            Err(e) => warn!("Dropping unreadable record for {}: {}", name, e),
        }
    }
    Ok(users)
}

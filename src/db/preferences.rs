//! Validated preference operations layered on the credential store.

use super::credentials::{CredentialRepository, CredentialStore};
use crate::error::{AppError, Result};
use crate::models::{Preferences, UserRecord};
use serde_json::Value;
use tracing::debug;

pub struct PreferenceAccessor<'a, R: CredentialRepository> {
    store: &'a CredentialStore<R>,
}

impl<'a, R: CredentialRepository> PreferenceAccessor<'a, R> {
    pub fn new(store: &'a CredentialStore<R>) -> Self {
        Self { store }
    }

    /// Current preferences of `user` (`{}` if the record carries none).
    pub fn get(&self, user: &str) -> Result<Preferences> {
        self.store
            .get_user(user)
            .map(|record| record.preferences)
            .ok_or_else(|| AppError::NotFound(user.to_string()))
    }

    /// Replaces all preferences. Only a JSON object is accepted.
    pub fn set(&self, user: &str, value: Value) -> Result<()> {
        match value {
            Value::Object(map) => {
                debug!("Replacing preferences of {} ({} keys)", user, map.len());
                self.store.set_preferences(user, map)
            },
            other => Err(AppError::Validation(format!(
                "preferences must be a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Parses `raw` as JSON, then behaves like [`set`](Self::set).
    pub fn set_raw(&self, user: &str, raw: &str) -> Result<()> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| AppError::Validation(format!("preferences are not valid JSON: {}", e)))?;
        self.set(user, value)
    }

    /// Merges one key. `raw_value` is stored as parsed JSON, or verbatim as a string
    /// when it is not JSON.
    pub fn update(&self, user: &str, key: &str, raw_value: &str) -> Result<()> {
        self.update_value(user, key, parse_value(raw_value))
    }

    /// Stores `value` under the trimmed `key`.
    pub fn update_value(&self, user: &str, key: &str, value: Value) -> Result<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(AppError::Validation(
                "preference key must not be empty".to_string(),
            ));
        }
        debug!("Updating preference {} of {}", key, user);
        self.store.update_preference(user, key, value)
    }

    /// Back to exactly the default preferences with an empty context.
    pub fn reset(&self, user: &str) -> Result<UserRecord> {
        self.store.reset_user(user)
    }
}

/// JSON if it parses, otherwise the raw text as a string.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryRepository;
    use crate::models::{default_preferences, DEFAULT_INSTRUCTIONS};
    use rstest::rstest;
    use serde_json::{json, Map};

    fn store_with(users: &[&str]) -> CredentialStore<MemoryRepository> {
        let store = CredentialStore::new(MemoryRepository::new());
        for user in users {
            store.register_user(user).unwrap();
        }
        store
    }

    #[test]
    fn test_fresh_user_reads_default_instructions() {
        let store = store_with(&["alice"]);
        let prefs = PreferenceAccessor::new(&store).get("alice").unwrap();
        assert_eq!(prefs.len(), 1);
        assert_eq!(prefs["instructions"], json!(DEFAULT_INSTRUCTIONS));
        assert!(prefs["instructions"].as_str().unwrap().contains("HEADLINE"));
    }

    #[test]
    fn test_set_then_get_round_trips() {
        let store = store_with(&["u"]);
        let accessor = PreferenceAccessor::new(&store);
        let prefs = json!({
            "topics": ["AI", "energy"],
            "max_items": 7,
            "nested": { "tone": "dry", "emoji": false }
        });

        accessor.set("u", prefs.clone()).unwrap();
        assert_eq!(Value::Object(accessor.get("u").unwrap()), prefs);
    }

    #[rstest]
    #[case(json!("a string"), "a string")]
    #[case(json!(42), "a number")]
    #[case(json!(null), "null")]
    #[case(json!(["AI"]), "an array")]
    #[case(json!(true), "a boolean")]
    fn test_set_rejects_non_objects(#[case] value: Value, #[case] type_name: &str) {
        let store = store_with(&["u"]);
        let accessor = PreferenceAccessor::new(&store);

        match accessor.set("u", value) {
            Err(AppError::Validation(msg)) => assert!(msg.contains(type_name), "{}", msg),
            other => panic!("Expected Validation error, got {:?}", other),
        }
        // Nothing was written.
        assert_eq!(accessor.get("u").unwrap(), default_preferences());
    }

    #[test]
    fn test_set_empty_object_is_allowed() {
        let store = store_with(&["u"]);
        let accessor = PreferenceAccessor::new(&store);
        accessor.set("u", json!({})).unwrap();
        assert_eq!(accessor.get("u").unwrap(), Map::new());
    }

    #[test]
    fn test_set_raw_rejects_invalid_json() {
        let store = store_with(&["u"]);
        let err = PreferenceAccessor::new(&store)
            .set_raw("u", "{topics: AI}")
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_update_replaces_key_and_keeps_siblings() {
        let store = store_with(&["bob"]);
        let accessor = PreferenceAccessor::new(&store);

        accessor.set_raw("bob", r#"{"topics":["AI"]}"#).unwrap();
        accessor
            .update("bob", "topics", r#"["AI","markets"]"#)
            .unwrap();

        assert_eq!(
            Value::Object(accessor.get("bob").unwrap()),
            json!({ "topics": ["AI", "markets"] })
        );
    }

    #[test]
    fn test_sequential_updates_accumulate() {
        let store = store_with(&["c"]);
        let accessor = PreferenceAccessor::new(&store);
        accessor.set("c", json!({ "tone": "brief" })).unwrap();

        accessor.update("c", "instructions", "x").unwrap();
        accessor.update("c", "topics", "[1]").unwrap();

        assert_eq!(
            Value::Object(accessor.get("c").unwrap()),
            json!({ "tone": "brief", "instructions": "x", "topics": [1] })
        );
    }

    #[test]
    fn test_update_trims_key() {
        let store = store_with(&["d"]);
        let accessor = PreferenceAccessor::new(&store);
        accessor.set("d", json!({ "topics": ["AI"] })).unwrap();

        accessor.update("d", " topics\t", r#"["markets"]"#).unwrap();

        assert_eq!(
            Value::Object(accessor.get("d").unwrap()),
            json!({ "topics": ["markets"] })
        );
    }

    #[rstest]
    #[case("42", json!(42))]
    #[case("true", json!(true))]
    #[case("null", json!(null))]
    #[case(r#"{"a":1}"#, json!({ "a": 1 }))]
    #[case(r#""quoted""#, json!("quoted"))]
    #[case("plain words", json!("plain words"))]
    #[case("[unterminated", json!("[unterminated"))]
    fn test_update_value_parsing(#[case] raw: &str, #[case] expected: Value) {
        assert_eq!(parse_value(raw), expected);
    }

    #[test]
    fn test_update_rejects_empty_key() {
        let store = store_with(&["u"]);
        let err = PreferenceAccessor::new(&store)
            .update("u", "  ", "1")
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_reset_after_changes_yields_exact_default() {
        let store = store_with(&["u"]);
        let accessor = PreferenceAccessor::new(&store);
        accessor.set("u", json!({ "a": 1, "b": 2 })).unwrap();
        accessor.update("u", "c", "3").unwrap();
        store
            .set_context_value("u", "last", json!("world"))
            .unwrap();

        let record = accessor.reset("u").unwrap();
        assert_eq!(record.preferences, default_preferences());
        assert_eq!(record.context, Some(Map::new()));
        assert_eq!(accessor.get("u").unwrap(), default_preferences());
    }

    #[test]
    fn test_operations_on_unknown_user_are_not_found() {
        let store = store_with(&[]);
        let accessor = PreferenceAccessor::new(&store);

        assert!(matches!(accessor.get("nobody"), Err(AppError::NotFound(_))));
        assert!(matches!(
            accessor.set("nobody", json!({})),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            accessor.update("nobody", "k", "v"),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(accessor.reset("nobody"), Err(AppError::NotFound(_))));
    }
}

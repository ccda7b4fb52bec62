//! Raw records - the untyped field bags producers hand to the pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// One field of a raw record.
///
/// Producers scrape heterogeneous sources; each field is one of a small set
/// of shapes and the normalizer decides per field how to read it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawValue {
    Text(String),
    Number(f64),
    List(Vec<String>),
    Timestamp(DateTime<Utc>),
    Absent,
}

impl RawValue {
    /// True for `Absent`, empty/blank text and empty lists.
    pub fn is_empty(&self) -> bool {
        match self {
            RawValue::Absent => true,
            RawValue::Text(s) => s.trim().is_empty(),
            RawValue::List(items) => items.iter().all(|s| s.trim().is_empty()),
            RawValue::Number(n) => !n.is_finite(),
            RawValue::Timestamp(_) => false,
        }
    }

    /// Render scalar values as a string; lists are comma-joined.
    pub fn to_plain_string(&self) -> String {
        match self {
            RawValue::Text(s) => s.clone(),
            RawValue::Number(n) => format_number(*n),
            RawValue::List(items) => items.join(","),
            RawValue::Timestamp(ts) => ts.to_rfc3339(),
            RawValue::Absent => String::new(),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Number(value as f64)
    }
}

impl From<Vec<String>> for RawValue {
    fn from(value: Vec<String>) -> Self {
        RawValue::List(value)
    }
}

impl From<Vec<&str>> for RawValue {
    fn from(value: Vec<&str>) -> Self {
        RawValue::List(value.into_iter().map(str::to_string).collect())
    }
}

impl From<DateTime<Utc>> for RawValue {
    fn from(value: DateTime<Utc>) -> Self {
        RawValue::Timestamp(value)
    }
}

impl From<serde_json::Value> for RawValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => RawValue::Absent,
            Value::String(s) => RawValue::Text(s),
            Value::Number(n) => n.as_f64().map(RawValue::Number).unwrap_or(RawValue::Absent),
            Value::Bool(b) => RawValue::Text(b.to_string()),
            Value::Array(items) => RawValue::List(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::Null => None,
                        Value::String(s) => Some(s),
                        other => Some(other.to_string()),
                    })
                    .collect(),
            ),
            Value::Object(_) => RawValue::Text(value.to_string()),
        }
    }
}

/// Integral floats print without a fractional part (`42.0` -> `"42"`).
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// A raw job posting as delivered by a producer.
///
/// Missing keys read as [`RawValue::Absent`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RawRecord {
    fields: BTreeMap<String, RawValue>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field setter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<RawValue>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Set a field only when it is missing or empty.
    pub fn insert_if_empty(&mut self, key: &str, value: impl Into<RawValue>) {
        if self.get(key).is_empty() {
            self.fields.insert(key.to_string(), value.into());
        }
    }

    pub fn get(&self, key: &str) -> &RawValue {
        self.fields.get(key).unwrap_or(&RawValue::Absent)
    }

    /// Text value of a field; non-text scalars are stringified.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.get(key) {
            RawValue::Absent => None,
            RawValue::List(_) => None,
            other => Some(other.to_plain_string()),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build from a JSON object. Non-object values yield an empty record.
    pub fn from_json(value: serde_json::Value) -> Self {
        let mut record = Self::new();
        if let serde_json::Value::Object(map) = value {
            for (key, value) in map {
                record.insert(key, RawValue::from(value));
            }
        }
        record
    }

    /// Audit copy of the original record, stored verbatim with the job.
    pub fn to_payload(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_keys_read_as_absent() {
        let record = RawRecord::new().with("title", "Engineer");
        assert_eq!(record.get("company"), &RawValue::Absent);
        assert_eq!(record.text("title").as_deref(), Some("Engineer"));
    }

    #[test]
    fn json_objects_map_to_field_shapes() {
        let record = RawRecord::from_json(json!({
            "id": 42,
            "title": "Backend Engineer",
            "tags": ["rust", null, "sql"],
            "remote": true,
            "location": null
        }));

        assert_eq!(record.get("id"), &RawValue::Number(42.0));
        assert_eq!(record.text("id").as_deref(), Some("42"));
        assert_eq!(
            record.get("tags"),
            &RawValue::List(vec!["rust".to_string(), "sql".to_string()])
        );
        assert_eq!(record.text("remote").as_deref(), Some("true"));
        assert!(record.get("location").is_empty());
    }

    #[test]
    fn insert_if_empty_keeps_existing_values() {
        let mut record = RawRecord::new().with("source", "remoteok");
        record.insert_if_empty("source", "other");
        record.insert_if_empty("company", "Acme");
        assert_eq!(record.text("source").as_deref(), Some("remoteok"));
        assert_eq!(record.text("company").as_deref(), Some("Acme"));
    }

    #[test]
    fn payload_is_json_object() {
        let record = RawRecord::new().with("title", "Dev").with("score", 3.5);
        let payload: serde_json::Value = serde_json::from_str(&record.to_payload()).unwrap();
        assert_eq!(payload, json!({"score": 3.5, "title": "Dev"}));
    }
}

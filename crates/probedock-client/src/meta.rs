//! Metadata attached to test groups and tests.
//!
//! Raw metadata arrives in whatever shape the host framework allows: a bare
//! string (shorthand for a key), a map, or something unusable. It is
//! normalized into [`HolderMeta`] once, at ingestion.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Normalized metadata of a single holder (group or test).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HolderMeta {
    pub key: Option<String>,
    pub category: Option<String>,
    pub grouped: Option<bool>,
    pub tags: Vec<String>,
    pub tickets: Vec<String>,
    pub data: Map<String, Value>,
}

impl HolderMeta {
    /// Normalize raw metadata.
    ///
    /// Malformed values degrade to "no metadata" instead of failing.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(key) => Self {
                key: Some(key.clone()),
                ..Self::default()
            },
            Value::Object(map) => Self::from_map(map),
            _ => Self::default(),
        }
    }

    fn from_map(map: &Map<String, Value>) -> Self {
        Self {
            key: map.get("key").and_then(scalar_to_string),
            category: map.get("category").and_then(scalar_to_string),
            grouped: map.get("grouped").and_then(Value::as_bool),
            tags: map.get("tags").map(values_to_strings).unwrap_or_default(),
            tickets: map.get("tickets").map(values_to_strings).unwrap_or_default(),
            data: map
                .get("data")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_grouped(mut self, grouped: bool) -> Self {
        self.grouped = Some(grouped);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tickets<I, S>(mut self, tickets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tickets = tickets.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_data(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(name.into(), value.into());
        self
    }
}

/// A group or a test, as seen by the identity extractor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Holder {
    /// Description as declared in the test source (not trimmed).
    pub description: String,
    pub meta: HolderMeta,
}

impl Holder {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            meta: HolderMeta::default(),
        }
    }

    /// Holder with raw, not yet normalized metadata.
    pub fn with_raw_meta(description: impl Into<String>, raw: &Value) -> Self {
        Self {
            description: description.into(),
            meta: HolderMeta::from_value(raw),
        }
    }

    pub fn with_meta(description: impl Into<String>, meta: HolderMeta) -> Self {
        Self {
            description: description.into(),
            meta,
        }
    }
}

/// Stringify a scalar; arrays, maps and null yield `None`.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Coerce a scalar or a (possibly nested) list into a flat list of strings.
pub(crate) fn values_to_strings(value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_strings(value, &mut out);
    out
}

fn collect_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| collect_strings(item, out)),
        other => out.extend(scalar_to_string(other)),
    }
}

/// Serde helper accepting either a single scalar or a list of scalars.
pub(crate) fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(values_to_strings).unwrap_or_default())
}

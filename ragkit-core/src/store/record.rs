//! Record, key and payload types held by the [`RecordStore`](super::RecordStore)

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of a record within a collection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKey(String);

impl RecordKey {
    /// Create a key from any string-like value
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Generate a random UUID v4 key
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for RecordKey {
    fn from(key: u64) -> Self {
        Self(key.to_string())
    }
}

impl From<&str> for RecordKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for RecordKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<Uuid> for RecordKey {
    fn from(key: Uuid) -> Self {
        Self(key.to_string())
    }
}

/// A payload field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Text value
    Text(String),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// Boolean value
    Bool(bool),
}

impl FieldValue {
    /// Get the value as text, if it is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as a float (integers are widened)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Equality used by filters: numbers compare by value regardless of variant
    pub fn matches(&self, other: &FieldValue) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Named payload fields of a record
pub type Payload = BTreeMap<String, FieldValue>;

/// A stored entity: key, embedding vector and payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique key, immutable after creation
    pub key: RecordKey,
    /// Embedding vector
    pub vector: Vec<f32>,
    /// Payload fields
    #[serde(default)]
    pub payload: Payload,
}

impl Record {
    /// Create a record with an empty payload
    pub fn new(key: impl Into<RecordKey>, vector: Vec<f32>) -> Self {
        Self {
            key: key.into(),
            vector,
            payload: Payload::new(),
        }
    }

    /// Add a payload field
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.payload.insert(name.into(), value.into());
        self
    }

    /// Replace the whole payload
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Get a payload field
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.payload.get(name)
    }

    /// Get a text payload field
    pub fn text(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(FieldValue::as_text)
    }
}

/// A search result: a copy of the stored record and its similarity to the query
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// The matching record
    pub record: Record,
    /// Cosine similarity in [-1.0, 1.0]
    pub score: f32,
}

/// Equality conditions on payload fields, all of which must hold
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, FieldValue)>,
}

impl Filter {
    /// Create an empty filter (matches everything)
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field == value`
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    /// Iterate over the conditions
    pub fn conditions(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.conditions.iter().map(|(f, v)| (f.as_str(), v))
    }

    /// Check whether a payload satisfies every condition
    pub fn matches(&self, payload: &Payload) -> bool {
        self.conditions
            .iter()
            .all(|(field, value)| payload.get(field).is_some_and(|v| v.matches(value)))
    }
}

/// Options for [`RecordStore::search_with`](super::RecordStore::search_with)
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    /// Maximum number of hits
    pub top_k: usize,
    /// Optional payload filter
    pub filter: Option<Filter>,
}

impl SearchOptions {
    /// Top-k search without filter
    pub fn top(top_k: usize) -> Self {
        Self { top_k, filter: None }
    }

    /// Restrict the search to records matching `filter`
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::top(3)
    }
}

//! Explicit collection schemas
//!
//! A schema names the key field, the vector field (with its fixed
//! dimensionality) and optionally the payload fields a record may carry.
//! An empty payload declaration accepts any payload.
//!
//! Records always carry their key and vector in `Record::key` and
//! `Record::vector`; the key and vector field names describe the collection
//! and are reserved, so no payload field may reuse them.

use serde::{Deserialize, Serialize};

use super::record::{FieldValue, Filter, Payload};
use crate::error::{Error, Result};

/// Type of a payload field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// UTF-8 text
    Text,
    /// Signed integer
    Integer,
    /// Floating point number (integers are accepted)
    Float,
    /// Boolean
    Bool,
}

impl FieldKind {
    fn accepts(&self, value: &FieldValue) -> bool {
        matches!(
            (self, value),
            (FieldKind::Text, FieldValue::Text(_))
                | (FieldKind::Integer, FieldValue::Integer(_))
                | (FieldKind::Float, FieldValue::Float(_))
                | (FieldKind::Float, FieldValue::Integer(_))
                | (FieldKind::Bool, FieldValue::Bool(_))
        )
    }
}

/// Declaration of a payload field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadField {
    /// Field name
    pub name: String,
    /// Value type
    pub kind: FieldKind,
    /// Whether the field can be used in search filters
    #[serde(default)]
    pub filterable: bool,
}

/// Declaration of the vector field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorField {
    /// Field name
    pub name: String,
    /// Fixed dimensionality
    pub dimensions: usize,
}

/// Schema of a collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    /// Name of the key field
    pub key_field: String,
    /// Vector field
    pub vector: VectorField,
    /// Declared payload fields (empty = unrestricted)
    #[serde(default)]
    pub payload: Vec<PayloadField>,
}

impl CollectionSchema {
    /// Schema with the given dimensionality and an unrestricted payload
    pub fn new(dimensions: usize) -> Self {
        Self {
            key_field: "key".to_string(),
            vector: VectorField {
                name: "embedding".to_string(),
                dimensions,
            },
            payload: Vec::new(),
        }
    }

    /// Rename the key field
    pub fn key_field(mut self, name: impl Into<String>) -> Self {
        self.key_field = name.into();
        self
    }

    /// Rename the vector field
    pub fn vector_field(mut self, name: impl Into<String>) -> Self {
        self.vector.name = name.into();
        self
    }

    /// Declare a payload field
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.payload.push(PayloadField {
            name: name.into(),
            kind,
            filterable: false,
        });
        self
    }

    /// Declare a payload field usable in filters
    pub fn filterable_field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.payload.push(PayloadField {
            name: name.into(),
            kind,
            filterable: true,
        });
        self
    }

    /// Dimensionality of the vector field
    pub fn dimensions(&self) -> usize {
        self.vector.dimensions
    }

    /// Look up a declared payload field
    pub fn payload_field(&self, name: &str) -> Option<&PayloadField> {
        self.payload.iter().find(|f| f.name == name)
    }

    /// Check the declaration itself: a positive dimensionality and distinct
    /// non-empty names for the key, vector and payload fields.
    pub(crate) fn validate(&self, collection: &str) -> Result<()> {
        if self.dimensions() == 0 {
            return Err(Error::schema_violation(
                collection,
                "vector dimensionality must be positive",
            ));
        }

        let mut seen: Vec<&str> = Vec::with_capacity(self.payload.len() + 2);
        let names = [self.key_field.as_str(), self.vector.name.as_str()]
            .into_iter()
            .chain(self.payload.iter().map(|f| f.name.as_str()));
        for name in names {
            if name.is_empty() {
                return Err(Error::schema_violation(collection, "field names must not be empty"));
            }
            if seen.contains(&name) {
                return Err(Error::schema_violation(
                    collection,
                    format!("field '{}' is declared more than once", name),
                ));
            }
            seen.push(name);
        }
        Ok(())
    }

    pub(crate) fn validate_payload(&self, collection: &str, payload: &Payload) -> Result<()> {
        if self.payload.is_empty() {
            return Ok(());
        }

        for (name, value) in payload {
            let field = self.payload_field(name).ok_or_else(|| {
                Error::schema_violation(collection, format!("undeclared payload field '{}'", name))
            })?;
            if !field.kind.accepts(value) {
                return Err(Error::schema_violation(
                    collection,
                    format!("field '{}' expects {:?}, got {:?}", name, field.kind, value),
                ));
            }
        }
        Ok(())
    }

    pub(crate) fn validate_filter(&self, collection: &str, filter: &Filter) -> Result<()> {
        if self.payload.is_empty() {
            return Ok(());
        }

        for (name, _) in filter.conditions() {
            match self.payload_field(name) {
                Some(field) if field.filterable => {}
                Some(_) => {
                    return Err(Error::schema_violation(
                        collection,
                        format!("field '{}' is not filterable", name),
                    ))
                }
                None => {
                    return Err(Error::schema_violation(
                        collection,
                        format!("undeclared filter field '{}'", name),
                    ))
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glossary_schema() -> CollectionSchema {
        CollectionSchema::new(3)
            .filterable_field("category", FieldKind::Text)
            .field("term", FieldKind::Text)
            .field("weight", FieldKind::Float)
    }

    #[test]
    fn test_unrestricted_schema_accepts_anything() {
        let schema = CollectionSchema::new(8);
        let mut payload = Payload::new();
        payload.insert("anything".to_string(), FieldValue::Bool(true));
        assert!(schema.validate_payload("c", &payload).is_ok());
        assert!(schema
            .validate_filter("c", &Filter::new().eq("anything", true))
            .is_ok());
    }

    #[test]
    fn test_payload_validation() {
        let schema = glossary_schema();

        let mut ok = Payload::new();
        ok.insert("term".to_string(), "API".into());
        ok.insert("weight".to_string(), FieldValue::Integer(2));
        assert!(schema.validate_payload("glossary", &ok).is_ok());

        let mut undeclared = Payload::new();
        undeclared.insert("author".to_string(), "x".into());
        assert!(matches!(
            schema.validate_payload("glossary", &undeclared),
            Err(Error::SchemaViolation { .. })
        ));

        let mut wrong_kind = Payload::new();
        wrong_kind.insert("term".to_string(), FieldValue::Integer(1));
        assert!(matches!(
            schema.validate_payload("glossary", &wrong_kind),
            Err(Error::SchemaViolation { .. })
        ));
    }

    #[test]
    fn test_declaration_validation() {
        assert!(glossary_schema().validate("glossary").is_ok());
        assert!(CollectionSchema::new(0).validate("c").is_err());
        assert!(CollectionSchema::new(3).key_field("").validate("c").is_err());
        assert!(CollectionSchema::new(3)
            .key_field("id")
            .vector_field("id")
            .validate("c")
            .is_err());
        assert!(CollectionSchema::new(3)
            .field("embedding", FieldKind::Text)
            .validate("c")
            .is_err());
        assert!(glossary_schema()
            .field("term", FieldKind::Text)
            .validate("glossary")
            .is_err());
    }

    #[test]
    fn test_filter_validation() {
        let schema = glossary_schema();
        assert!(schema
            .validate_filter("glossary", &Filter::new().eq("category", "Core Definitions"))
            .is_ok());
        assert!(schema
            .validate_filter("glossary", &Filter::new().eq("term", "API"))
            .is_err());
        assert!(schema
            .validate_filter("glossary", &Filter::new().eq("nope", 1i64))
            .is_err());
    }
}

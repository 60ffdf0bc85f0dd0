//! Vector record storage
//!
//! Collections of records (key, vector, payload) with cosine similarity search.

pub mod memory;
pub mod record;
pub mod schema;

pub use memory::RecordStore;
pub use record::{FieldValue, Filter, Payload, Record, RecordKey, SearchHit, SearchOptions};
pub use schema::{CollectionSchema, FieldKind, PayloadField, VectorField};

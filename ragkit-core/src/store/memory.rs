//! In-memory record store with brute-force cosine similarity search
//!
//! Every query scores all stored vectors and keeps the best `top_k` with a
//! partial sort, O(n·d + n log k). At the expected scale (tens to low
//! thousands of records per collection) this needs no index structure;
//! approximate search at larger scale belongs in an external service.
//!
//! # Concurrency
//! The collection map is a `DashMap`; each collection sits behind its own
//! `RwLock`, so upserts to one collection are serialized while searches run
//! concurrently against a consistent snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::record::{Record, RecordKey, SearchHit, SearchOptions};
use super::schema::CollectionSchema;
use crate::error::{Error, Result};

/// A stored record with its precomputed magnitude
#[derive(Debug, Clone)]
struct Slot {
    record: Record,
    norm: f64,
}

/// A named set of records sharing one dimensionality
#[derive(Debug)]
struct Collection {
    schema: CollectionSchema,
    /// Records in insertion order (the search tie-break order)
    slots: Vec<Slot>,
    /// Key -> position in `slots`
    positions: HashMap<RecordKey, usize>,
}

impl Collection {
    fn new(schema: CollectionSchema) -> Self {
        Self {
            schema,
            slots: Vec::new(),
            positions: HashMap::new(),
        }
    }

    fn check_vector(&self, vector: &[f32]) -> Result<()> {
        let expected = self.schema.dimensions();
        if vector.len() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
        if let Some(index) = vector.iter().position(|x| !x.is_finite()) {
            return Err(Error::InvalidVector { index });
        }
        Ok(())
    }

    /// Insert or replace; a replaced record keeps its original position.
    fn put(&mut self, record: Record) -> bool {
        let slot = Slot {
            norm: magnitude(&record.vector),
            record,
        };
        match self.positions.get(&slot.record.key) {
            Some(&pos) => {
                self.slots[pos] = slot;
                true
            }
            None => {
                self.positions.insert(slot.record.key.clone(), self.slots.len());
                self.slots.push(slot);
                false
            }
        }
    }

    fn remove(&mut self, key: &RecordKey) -> bool {
        let Some(pos) = self.positions.remove(key) else {
            return false;
        };
        self.slots.remove(pos);
        for slot in &self.slots[pos..] {
            if let Some(p) = self.positions.get_mut(&slot.record.key) {
                *p -= 1;
            }
        }
        true
    }
}

// Accumulated in f64: squares of finite f32 components above ~1.8e19
// overflow f32 but stay finite in f64.
fn magnitude(v: &[f32]) -> f64 {
    v.iter()
        .map(|&x| f64::from(x) * f64::from(x))
        .sum::<f64>()
        .sqrt()
}

/// Cosine similarity given precomputed magnitudes; 0.0 if either vector is zero.
fn cosine(a: &[f32], norm_a: f64, b: &[f32], norm_b: f64) -> f32 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let dot: f64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| f64::from(x) * f64::from(y))
        .sum();
    // Divide by each norm separately so the product cannot overflow
    let score = (dot / norm_a / norm_b).clamp(-1.0, 1.0) as f32;
    // `+ 0.0` turns -0.0 into 0.0 so total_cmp ranks them as a tie
    score + 0.0
}

/// Thread-safe in-memory store of vector collections
///
/// The store exclusively owns all records; reads hand out copies.
#[derive(Debug, Default)]
pub struct RecordStore {
    collections: DashMap<String, Arc<RwLock<Collection>>>,
}

impl RecordStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collection if it does not exist yet.
    ///
    /// Idempotent for an existing collection with the same dimensionality;
    /// fails with [`Error::DimensionMismatch`] otherwise.
    pub fn create_collection(&self, name: &str, schema: CollectionSchema) -> Result<()> {
        schema.validate(name)?;

        match self.collections.entry(name.to_string()) {
            Entry::Occupied(entry) => {
                let existing = entry.get().read();
                if existing.schema.dimensions() != schema.dimensions() {
                    return Err(Error::DimensionMismatch {
                        expected: existing.schema.dimensions(),
                        actual: schema.dimensions(),
                    });
                }
                if existing.schema != schema {
                    warn!(
                        collection = %name,
                        "Collection already exists with a different schema, keeping the existing one"
                    );
                }
                Ok(())
            }
            Entry::Vacant(entry) => {
                info!(
                    collection = %name,
                    dimensions = schema.dimensions(),
                    "Created collection"
                );
                entry.insert(Arc::new(RwLock::new(Collection::new(schema))));
                Ok(())
            }
        }
    }

    /// Check whether a collection exists
    pub fn collection_exists(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    /// Names of all collections, sorted
    pub fn list_collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Drop a collection and all its records. Returns whether it existed.
    pub fn delete_collection(&self, name: &str) -> bool {
        let removed = self.collections.remove(name).is_some();
        if removed {
            info!(collection = %name, "Deleted collection");
        }
        removed
    }

    /// Schema of a collection
    pub fn schema(&self, name: &str) -> Result<CollectionSchema> {
        Ok(self.collection(name)?.read().schema.clone())
    }

    /// Number of records in a collection
    pub fn len(&self, name: &str) -> Result<usize> {
        Ok(self.collection(name)?.read().slots.len())
    }

    /// Insert or replace the record at `record.key`.
    ///
    /// Validation happens before the collection is touched, so a failing
    /// upsert leaves it unchanged.
    pub fn upsert(&self, name: &str, record: Record) -> Result<()> {
        let handle = self.collection(name)?;
        let mut collection = handle.write();
        collection.check_vector(&record.vector)?;
        collection.schema.validate_payload(name, &record.payload)?;

        let key = record.key.clone();
        let replaced = collection.put(record);
        debug!(collection = %name, key = %key, replaced, "Upserted record");
        Ok(())
    }

    /// Get a copy of a record by key
    pub fn get(&self, name: &str, key: &RecordKey) -> Result<Option<Record>> {
        let handle = self.collection(name)?;
        let collection = handle.read();
        Ok(collection
            .positions
            .get(key)
            .map(|&pos| collection.slots[pos].record.clone()))
    }

    /// Delete a record by key. Returns whether it existed.
    pub fn delete(&self, name: &str, key: &RecordKey) -> Result<bool> {
        let handle = self.collection(name)?;
        let removed = handle.write().remove(key);
        Ok(removed)
    }

    /// The `top_k` records most similar to `query`.
    ///
    /// Ordered by descending cosine similarity, ties broken by insertion
    /// order. An empty collection yields an empty result.
    pub fn search(&self, name: &str, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        self.search_with(name, query, &SearchOptions::top(top_k))
    }

    /// Like [`search`](Self::search), restricted by an optional payload filter
    pub fn search_with(
        &self,
        name: &str,
        query: &[f32],
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>> {
        let handle = self.collection(name)?;
        let collection = handle.read();
        collection.check_vector(query)?;
        if let Some(filter) = &options.filter {
            collection.schema.validate_filter(name, filter)?;
        }

        let k = options.top_k;
        if k == 0 || collection.slots.is_empty() {
            return Ok(Vec::new());
        }

        let query_norm = magnitude(query);
        let mut scored: Vec<(usize, f32)> = collection
            .slots
            .par_iter()
            .enumerate()
            .filter(|(_, slot)| {
                options
                    .filter
                    .as_ref()
                    .map_or(true, |f| f.matches(&slot.record.payload))
            })
            .map(|(pos, slot)| (pos, cosine(query, query_norm, &slot.record.vector, slot.norm)))
            .collect();

        let rank = |a: &(usize, f32), b: &(usize, f32)| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0));
        if scored.len() > k {
            scored.select_nth_unstable_by(k - 1, rank);
            scored.truncate(k);
        }
        scored.sort_unstable_by(rank);

        Ok(scored
            .into_iter()
            .map(|(pos, score)| SearchHit {
                record: collection.slots[pos].record.clone(),
                score,
            })
            .collect())
    }

    fn collection(&self, name: &str) -> Result<Arc<RwLock<Collection>>> {
        self.collections
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::UnknownCollection(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FieldKind, Filter};

    fn store_with(vectors: &[(u64, [f32; 3])]) -> RecordStore {
        let store = RecordStore::new();
        store
            .create_collection("terms", CollectionSchema::new(3))
            .unwrap();
        for (key, v) in vectors {
            store.upsert("terms", Record::new(*key, v.to_vec())).unwrap();
        }
        store
    }

    #[test]
    fn test_cosine_basics() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        let c = [2.0, 0.0];
        assert_eq!(cosine(&a, 1.0, &b, 1.0), 0.0);
        assert!((cosine(&a, 1.0, &c, 2.0) - 1.0).abs() < 1e-6);
        assert_eq!(cosine(&a, 1.0, &[0.0, 0.0], 0.0), 0.0);
        assert_eq!(cosine(&[-1.0, 0.0], 1.0, &[0.0, 1.0], 1.0).to_bits(), 0.0f32.to_bits());
    }

    #[test]
    fn test_cosine_large_components() {
        let big = [3e19f32, 3e19];
        let norm = magnitude(&big);
        assert!(norm.is_finite());
        let score = cosine(&big, norm, &[1.0, 1.0], magnitude(&[1.0, 1.0]));
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_replace_keeps_position() {
        let store = store_with(&[(1, [1.0, 0.0, 0.0]), (2, [1.0, 0.0, 0.0])]);
        store
            .upsert("terms", Record::new(1u64, vec![1.0, 0.0, 0.0]).with_field("v", 2i64))
            .unwrap();

        assert_eq!(store.len("terms").unwrap(), 2);
        let hits = store.search("terms", &[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].record.key, RecordKey::from(1u64));
        assert_eq!(hits[0].record.field("v"), Some(&2i64.into()));
        assert_eq!(hits[1].record.key, RecordKey::from(2u64));
    }

    #[test]
    fn test_delete_reindexes_positions() {
        let store = store_with(&[
            (1, [1.0, 0.0, 0.0]),
            (2, [0.0, 1.0, 0.0]),
            (3, [0.0, 0.0, 1.0]),
        ]);
        assert!(store.delete("terms", &RecordKey::from(1u64)).unwrap());
        assert!(!store.delete("terms", &RecordKey::from(1u64)).unwrap());

        let third = store.get("terms", &RecordKey::from(3u64)).unwrap().unwrap();
        assert_eq!(third.vector, vec![0.0, 0.0, 1.0]);
        assert!(store.get("terms", &RecordKey::from(1u64)).unwrap().is_none());
        assert_eq!(store.len("terms").unwrap(), 2);
    }

    #[test]
    fn test_invalid_vector_rejected() {
        let store = store_with(&[]);
        let err = store
            .upsert("terms", Record::new(1u64, vec![0.0, f32::NAN, 0.0]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidVector { index: 1 }));
        assert_eq!(store.len("terms").unwrap(), 0);
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let store = RecordStore::new();
        assert!(store
            .create_collection("empty", CollectionSchema::new(0))
            .is_err());
        assert!(!store.collection_exists("empty"));
    }

    #[test]
    fn test_reserved_field_names_rejected() {
        let store = RecordStore::new();
        let schema = CollectionSchema::new(2)
            .key_field("Key")
            .field("Key", FieldKind::Integer);
        assert!(matches!(
            store.create_collection("glossary", schema),
            Err(Error::SchemaViolation { .. })
        ));
        assert!(!store.collection_exists("glossary"));
    }

    #[test]
    fn test_filtered_search() {
        let store = RecordStore::new();
        let schema = CollectionSchema::new(2).filterable_field("category", FieldKind::Text);
        store.create_collection("glossary", schema).unwrap();
        store
            .upsert("glossary", Record::new(1u64, vec![1.0, 0.0]).with_field("category", "a"))
            .unwrap();
        store
            .upsert("glossary", Record::new(2u64, vec![0.9, 0.1]).with_field("category", "b"))
            .unwrap();

        let options = SearchOptions::top(5).with_filter(Filter::new().eq("category", "b"));
        let hits = store.search_with("glossary", &[1.0, 0.0], &options).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.key, RecordKey::from(2u64));
    }

    #[test]
    fn test_collection_listing() {
        let store = RecordStore::new();
        store.create_collection("b", CollectionSchema::new(2)).unwrap();
        store.create_collection("a", CollectionSchema::new(2)).unwrap();
        assert_eq!(store.list_collections(), vec!["a", "b"]);
        assert!(store.delete_collection("a"));
        assert!(!store.delete_collection("a"));
        assert!(matches!(store.len("a"), Err(Error::UnknownCollection(_))));
    }
}

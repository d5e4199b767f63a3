//! Generic append/query/update document collections.
//!
//! A [`DocumentStore`] holds one entity kind as a JSON array snapshot on
//! disk. Queries are field-equality matches over the serialized form, and
//! results keep insertion order. Every mutation rewrites the whole
//! snapshot in place; a crash mid-write can lose the collection.

use std::fs;
use std::marker::PhantomData;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Result, StoreError};

/// A conjunction of field-equality conditions.
///
/// Fields are compared against the document's serialized JSON form, so a
/// `Uuid`-typed id matches its hyphenated string representation.
#[derive(Debug, Clone, Default)]
pub struct Query(Vec<(String, Value)>);

impl Query {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Add an equality condition. All conditions must hold for a match.
    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.push((field.to_string(), value.into()));
        self
    }

    fn matches(&self, doc: &Map<String, Value>) -> bool {
        self.0.iter().all(|(field, value)| doc.get(field) == Some(value))
    }
}

/// A persistent collection of documents of one entity kind.
pub struct DocumentStore<T> {
    path: PathBuf,
    docs: Vec<Map<String, Value>>,
    _kind: PhantomData<T>,
}

impl<T: Serialize + DeserializeOwned> DocumentStore<T> {
    /// Open (or create) the collection at an explicit path. A missing
    /// file yields an empty collection.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let docs = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), count = docs.len(), "opened collection");

        Ok(Self {
            path,
            docs,
            _kind: PhantomData,
        })
    }

    /// All documents matching `query`, insertion order preserved.
    pub fn find(&self, query: &Query) -> Vec<T> {
        self.docs
            .iter()
            .filter(|doc| query.matches(doc))
            .filter_map(|doc| serde_json::from_value(Value::Object((*doc).clone())).ok())
            .collect()
    }

    /// The whole collection, insertion order preserved.
    pub fn find_all(&self) -> Vec<T> {
        self.find(&Query::new())
    }

    /// Append a document, assigning a store-local `_id` distinct from any
    /// application-level id, and rewrite the snapshot.
    pub fn insert_one(&mut self, doc: &T) -> Result<String> {
        let mut obj = match serde_json::to_value(doc)? {
            Value::Object(map) => map,
            _ => return Err(StoreError::NotADocument),
        };
        let store_id = Uuid::new_v4().simple().to_string();
        obj.insert("_id".to_string(), Value::String(store_id.clone()));

        self.docs.push(obj);
        self.persist()?;
        Ok(store_id)
    }

    /// Merge `patch` into every document matching `query` and rewrite the
    /// snapshot. Returns the number of documents touched.
    ///
    /// Despite the name, this patches *all* matches; callers wanting
    /// single-document semantics must pass a query selective enough to
    /// match at most one document.
    pub fn update_one(&mut self, query: &Query, patch: Value) -> Result<usize> {
        let patch = match patch {
            Value::Object(map) => map,
            _ => return Err(StoreError::NotADocument),
        };

        let mut touched = 0;
        for doc in self.docs.iter_mut().filter(|doc| query.matches(doc)) {
            for (field, value) in &patch {
                doc.insert(field.clone(), value.clone());
            }
            touched += 1;
        }

        if touched > 0 {
            self.persist()?;
        }
        Ok(touched)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    // Snapshot-replace: the collection file is rewritten wholesale, with
    // no journal or atomic rename. Accepted durability trade-off for a
    // local cache.
    fn persist(&self) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&self.docs)?;
        fs::write(&self.path, bytes)?;
        Ok(())
    }
}

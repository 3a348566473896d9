//! In-process document store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::clock::{new_document_id, ServerClock};
use super::{
    merge_fields, CollectionPath, Document, DocumentPath, DocumentStore, Fields, Query, SetMode,
    StoreError, StoreResult, WriteData,
};

/// A document store held entirely in memory.
///
/// Documents are grouped by collection path. Besides serving as a test
/// double it can be switched read-only to simulate the backend rejecting
/// writes, and it counts the writes it has accepted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<BTreeMap<String, BTreeMap<String, Fields>>>,
    clock: ServerClock,
    read_only: AtomicBool,
    writes: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject (or accept again) every write with
    /// [`StoreError::PermissionDenied`].
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Number of writes accepted so far.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of documents currently in `collection`.
    #[must_use]
    pub fn len(&self, collection: &CollectionPath) -> usize {
        self.collections
            .read()
            .get(&collection.to_string())
            .map_or(0, BTreeMap::len)
    }

    /// Check if `collection` holds no documents.
    #[must_use]
    pub fn is_empty(&self, collection: &CollectionPath) -> bool {
        self.len(collection) == 0
    }

    fn check_writable(&self, path: &impl ToString) -> StoreResult<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StoreError::PermissionDenied {
                path: path.to_string(),
            });
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, path: &DocumentPath) -> StoreResult<Option<Document>> {
        let collections = self.collections.read();
        let found = collections
            .get(&path.parent().to_string())
            .and_then(|docs| docs.get(path.id()))
            .map(|fields| Document {
                id: path.id().to_string(),
                fields: fields.clone(),
            });
        Ok(found)
    }

    async fn set(&self, path: &DocumentPath, data: WriteData, mode: SetMode) -> StoreResult<()> {
        self.check_writable(path)?;
        let fields = data.resolve(&self.clock.now_string());

        let mut collections = self.collections.write();
        let docs = collections.entry(path.parent().to_string()).or_default();
        if mode == SetMode::Merge {
            if let Some(existing) = docs.get_mut(path.id()) {
                merge_fields(existing, fields);
                debug!("merged {}", path);
                return Ok(());
            }
        }
        docs.insert(path.id().to_string(), fields);
        debug!("set {}", path);
        Ok(())
    }

    async fn update(&self, path: &DocumentPath, data: WriteData) -> StoreResult<()> {
        self.check_writable(path)?;

        let mut collections = self.collections.write();
        let existing = collections
            .get_mut(&path.parent().to_string())
            .and_then(|docs| docs.get_mut(path.id()))
            .ok_or_else(|| StoreError::NotFound {
                path: path.to_string(),
            })?;
        existing.extend(data.resolve(&self.clock.now_string()));
        debug!("updated {}", path);
        Ok(())
    }

    async fn add(&self, collection: &CollectionPath, data: WriteData) -> StoreResult<String> {
        self.check_writable(collection)?;
        let fields = data.resolve(&self.clock.now_string());

        let mut collections = self.collections.write();
        let docs = collections.entry(collection.to_string()).or_default();
        let mut id = new_document_id();
        while docs.contains_key(&id) {
            id = new_document_id();
        }
        docs.insert(id.clone(), fields);
        debug!("added {}/{}", collection, id);
        Ok(id)
    }

    async fn delete(&self, path: &DocumentPath) -> StoreResult<()> {
        self.check_writable(path)?;

        let mut collections = self.collections.write();
        if let Some(docs) = collections.get_mut(&path.parent().to_string()) {
            docs.remove(path.id());
        }
        debug!("deleted {}", path);
        Ok(())
    }

    async fn query(
        &self,
        collection: &CollectionPath,
        query: &Query,
    ) -> StoreResult<Vec<Document>> {
        let documents = self
            .collections
            .read()
            .get(&collection.to_string())
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(query.apply(documents))
    }
}

//! # Indexed / Cached Collections
//!
//! A collection is a keyed mapping from item id to [`Item`] plus an ordered
//! index of ids, persisted through a [`StorageBackend`].
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       COLLECTION LAYOUT                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Backend keys for collection "notes":                                  │
//! │                                                                         │
//! │  notes:index          ["n1", "n2", "n3"]     (ordered id index)        │
//! │  notes:item:n1        { state: active, ... }                           │
//! │  notes:item:n2        { state: tombstone, ... }                        │
//! │  notes:item:n3        { state: active, ... }                           │
//! │                                                                         │
//! │  Invariant: every id in the index has a stored record (possibly a      │
//! │  tombstone), and every record's id matches its key.                    │
//! │                                                                         │
//! │  Write ordering (crash safety):                                        │
//! │  • add:    write record FIRST, then the index — an interrupted add     │
//! │            leaves an orphaned record, never a dangling index entry     │
//! │  • delete: remove the index entry FIRST, then the record — same        │
//! │            direction, same guarantee                                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Operations are async but not internally serialized: callers are expected
//! to await operations against one collection sequentially. Concurrent
//! unawaited writes to the same id are a caller responsibility.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::store::backend::StorageBackend;
use crate::store::item::{ActiveItem, Item, ItemKind, Tombstone};
use crate::time::now_timestamp_millis;

// ============================================================================
// INDEXED COLLECTION
// ============================================================================

/// One logical collection (notes, notebooks, ...) over a storage backend
///
/// Cheaply cloneable; clones share the same in-memory index.
#[derive(Clone)]
pub struct IndexedCollection {
    inner: Arc<Inner>,
}

struct Inner {
    backend: Arc<dyn StorageBackend>,
    name: String,
    kind: ItemKind,
    index: RwLock<Vec<String>>,
    initialized: AtomicBool,
}

impl IndexedCollection {
    /// Create a handle for collection `name` storing items of `kind`
    ///
    /// The collection is unusable until [`init`](Self::init) completes.
    pub fn open(backend: Arc<dyn StorageBackend>, name: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                name: name.into(),
                kind,
                index: RwLock::new(Vec::new()),
                initialized: AtomicBool::new(false),
            }),
        }
    }

    /// Load the persisted id index into memory
    ///
    /// Must complete before any other operation. An unavailable backend
    /// fails closed: the collection comes up with an empty index rather
    /// than refusing to open. A present-but-unparseable index is treated
    /// as corruption and surfaced.
    pub async fn init(&self) -> Result<()> {
        let index = match self.inner.backend.read(&self.index_key()).await {
            Ok(Some(bytes)) => serde_json::from_slice::<Vec<String>>(&bytes).map_err(|e| {
                Error::StorageCorrupted(format!("index of '{}': {}", self.inner.name, e))
            })?,
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(
                    collection = %self.inner.name,
                    error = %e,
                    "storage unavailable while loading index, starting empty"
                );
                Vec::new()
            }
        };

        *self.inner.index.write() = index;
        self.inner.initialized.store(true, Ordering::Release);
        tracing::debug!(collection = %self.inner.name, items = self.len(), "collection initialized");
        Ok(())
    }

    /// The collection's name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The item kind this collection stores
    pub fn kind(&self) -> ItemKind {
        self.inner.kind
    }

    /// Snapshot of the id index, tombstoned ids included
    pub fn ids(&self) -> Vec<String> {
        self.inner.index.read().clone()
    }

    /// Number of indexed ids, tombstones included
    pub fn len(&self) -> usize {
        self.inner.index.read().len()
    }

    /// Whether the index is empty
    pub fn is_empty(&self) -> bool {
        self.inner.index.read().is_empty()
    }

    /// Upsert an item by id
    ///
    /// New ids are appended to the index. Existing items keep their
    /// `date_created`; `date_modified` is bumped only when the payload
    /// actually changed, so repeated identical adds are true no-ops.
    pub async fn upsert(&self, mut item: ActiveItem) -> Result<ActiveItem> {
        self.ensure_init()?;
        if item.kind != self.inner.kind {
            return Err(Error::KindMismatch {
                expected: self.inner.kind.to_string(),
                actual: item.kind.to_string(),
            });
        }

        match self.read_record(&item.id).await? {
            Some(Item::Active(existing)) => {
                if existing.data == item.data && existing.version == item.version {
                    // Identical add: stored result must equal a single add
                    return Ok(existing);
                }
                item.date_created = existing.date_created;
                item.date_modified = now_timestamp_millis();
            }
            Some(Item::Tombstone(_)) | None => {}
        }

        self.write_record(&Item::Active(item.clone())).await?;
        self.index_insert(&item.id).await?;
        Ok(item)
    }

    /// Get an item by id; tombstones are visible here
    pub async fn get(&self, id: &str) -> Result<Option<Item>> {
        self.ensure_init()?;
        self.read_record(id).await
    }

    /// Get a live item by id; `None` for missing or tombstoned ids
    pub async fn get_active(&self, id: &str) -> Result<Option<ActiveItem>> {
        Ok(self.get(id).await?.and_then(Item::into_active))
    }

    /// Get several items by id, position-aligned with the input
    pub async fn items(&self, ids: &[String]) -> Result<Vec<Option<Item>>> {
        self.ensure_init()?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            out.push(self.read_record(id).await?);
        }
        Ok(out)
    }

    /// All live items; tombstones are excluded
    pub async fn active_items(&self) -> Result<Vec<ActiveItem>> {
        self.ensure_init()?;
        let ids = self.ids();
        let mut out = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(Item::Active(item)) = self.read_record(id).await? {
                out.push(item);
            }
        }
        Ok(out)
    }

    /// Soft-delete: replace the record with a tombstone, keep the id indexed
    ///
    /// Returns the tombstone, or `None` if the id was not present.
    /// Idempotent: tombstoning a tombstone changes nothing.
    pub async fn soft_delete(&self, id: &str) -> Result<Option<Tombstone>> {
        self.ensure_init()?;
        match self.read_record(id).await? {
            None => Ok(None),
            Some(Item::Tombstone(t)) => Ok(Some(t)),
            Some(Item::Active(_)) => {
                let tombstone = Tombstone::new(id);
                self.write_record(&Item::Tombstone(tombstone.clone())).await?;
                Ok(Some(tombstone))
            }
        }
    }

    /// Hard-delete: remove the id from the index and the record from storage
    pub async fn hard_delete(&self, id: &str) -> Result<bool> {
        self.ensure_init()?;

        let present = {
            let mut index = self.inner.index.write();
            match index.iter().position(|i| i == id) {
                Some(pos) => {
                    index.remove(pos);
                    true
                }
                None => false,
            }
        };
        if !present {
            return Ok(false);
        }

        // Index entry goes first so a crash can't leave a dangling reference
        self.persist_index().await?;
        self.inner.backend.remove(&self.item_key(id)).await?;
        Ok(true)
    }

    /// Remove every record and the index
    pub async fn clear(&self) -> Result<()> {
        self.ensure_init()?;
        let ids = std::mem::take(&mut *self.inner.index.write());
        self.persist_index().await?;
        for id in ids {
            self.inner.backend.remove(&self.item_key(&id)).await?;
        }
        Ok(())
    }

    /// Write-through of an item as-is: timestamps untouched, index ensured
    ///
    /// Internal write path for the migrator and history, which manage their
    /// own timestamp semantics.
    pub(crate) async fn put(&self, item: Item) -> Result<()> {
        self.ensure_init()?;
        let id = item.id().to_string();
        self.write_record(&item).await?;
        self.index_insert(&id).await
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn ensure_init(&self) -> Result<()> {
        if self.inner.initialized.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(Error::CollectionNotInitialized(self.inner.name.clone()))
        }
    }

    fn index_key(&self) -> String {
        format!("{}:index", self.inner.name)
    }

    fn item_key(&self, id: &str) -> String {
        format!("{}:item:{}", self.inner.name, id)
    }

    async fn read_record(&self, id: &str) -> Result<Option<Item>> {
        match self.inner.backend.read(&self.item_key(id)).await? {
            Some(bytes) => {
                let item: Item = serde_json::from_slice(&bytes).map_err(|e| {
                    Error::StorageCorrupted(format!(
                        "item '{}' in '{}': {}",
                        id, self.inner.name, e
                    ))
                })?;
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    async fn write_record(&self, item: &Item) -> Result<()> {
        let bytes = serde_json::to_vec(item)?;
        self.inner
            .backend
            .write(&self.item_key(item.id()), &bytes)
            .await
    }

    async fn index_insert(&self, id: &str) -> Result<()> {
        let appended = {
            let mut index = self.inner.index.write();
            if index.iter().any(|i| i == id) {
                false
            } else {
                index.push(id.to_string());
                true
            }
        };
        if appended {
            self.persist_index().await?;
        }
        Ok(())
    }

    async fn persist_index(&self) -> Result<()> {
        let bytes = {
            let index = self.inner.index.read();
            serde_json::to_vec(&*index)?
        };
        self.inner.backend.write(&self.index_key(), &bytes).await
    }
}

// ============================================================================
// CACHED COLLECTION
// ============================================================================

/// An [`IndexedCollection`] with a write-through in-memory cache of all items
///
/// The app reads far more often than it writes; caching makes `get` and
/// `active_items` synchronous after `init` warms the cache.
#[derive(Clone)]
pub struct CachedCollection {
    col: IndexedCollection,
    cache: Arc<RwLock<HashMap<String, Item>>>,
}

impl CachedCollection {
    /// Create a handle for collection `name` storing items of `kind`
    pub fn open(backend: Arc<dyn StorageBackend>, name: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            col: IndexedCollection::open(backend, name, kind),
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Load the index and warm the cache with every stored item
    pub async fn init(&self) -> Result<()> {
        self.col.init().await?;
        let ids = self.col.ids();
        let records = self.col.items(&ids).await?;

        let mut cache = self.cache.write();
        cache.clear();
        for record in records.into_iter().flatten() {
            cache.insert(record.id().to_string(), record);
        }
        Ok(())
    }

    /// The collection's name
    pub fn name(&self) -> &str {
        self.col.name()
    }

    /// The item kind this collection stores
    pub fn kind(&self) -> ItemKind {
        self.col.kind()
    }

    /// Snapshot of the id index, tombstoned ids included
    pub fn ids(&self) -> Vec<String> {
        self.col.ids()
    }

    /// Number of indexed ids, tombstones included
    pub fn len(&self) -> usize {
        self.col.len()
    }

    /// Whether the index is empty
    pub fn is_empty(&self) -> bool {
        self.col.is_empty()
    }

    /// Upsert an item; see [`IndexedCollection::upsert`]
    pub async fn upsert(&self, item: ActiveItem) -> Result<ActiveItem> {
        let stored = self.col.upsert(item).await?;
        self.cache
            .write()
            .insert(stored.id.clone(), Item::Active(stored.clone()));
        Ok(stored)
    }

    /// Get an item from the cache; tombstones are visible here
    pub fn get(&self, id: &str) -> Option<Item> {
        self.cache.read().get(id).cloned()
    }

    /// Get a live item from the cache
    pub fn get_active(&self, id: &str) -> Option<ActiveItem> {
        self.get(id).and_then(Item::into_active)
    }

    /// All live items from the cache; tombstones are excluded
    pub fn active_items(&self) -> Vec<ActiveItem> {
        self.cache
            .read()
            .values()
            .filter_map(|item| item.as_active().cloned())
            .collect()
    }

    /// Soft-delete; see [`IndexedCollection::soft_delete`]
    pub async fn soft_delete(&self, id: &str) -> Result<bool> {
        match self.col.soft_delete(id).await? {
            Some(tombstone) => {
                self.cache
                    .write()
                    .insert(id.to_string(), Item::Tombstone(tombstone));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Hard-delete; see [`IndexedCollection::hard_delete`]
    pub async fn hard_delete(&self, id: &str) -> Result<bool> {
        let removed = self.col.hard_delete(id).await?;
        if removed {
            self.cache.write().remove(id);
        }
        Ok(removed)
    }

    /// Remove every record, the index, and the cache
    pub async fn clear(&self) -> Result<()> {
        self.col.clear().await?;
        self.cache.write().clear();
        Ok(())
    }

    /// Write-through of an item as-is; see [`IndexedCollection::put`]
    pub(crate) async fn put(&self, item: Item) -> Result<()> {
        self.col.put(item.clone()).await?;
        self.cache.write().insert(item.id().to_string(), item);
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::backend::MemoryBackend;
    use serde_json::json;

    async fn notes(backend: &Arc<dyn StorageBackend>) -> IndexedCollection {
        let col = IndexedCollection::open(backend.clone(), "notes", ItemKind::Note);
        col.init().await.unwrap();
        col
    }

    fn memory() -> Arc<dyn StorageBackend> {
        Arc::new(MemoryBackend::new())
    }

    #[tokio::test]
    async fn test_requires_init() {
        let col = IndexedCollection::open(memory(), "notes", ItemKind::Note);
        let result = col.get("n1").await;
        assert!(matches!(result, Err(Error::CollectionNotInitialized(_))));
    }

    #[tokio::test]
    async fn test_upsert_get_round_trip() {
        let backend = memory();
        let col = notes(&backend).await;

        let item = ActiveItem::new(ItemKind::Note, "n1", json!({"title": "hello"}));
        col.upsert(item).await.unwrap();

        let stored = col.get_active("n1").await.unwrap().unwrap();
        assert_eq!(stored.data["title"], "hello");
        assert_eq!(col.ids(), vec!["n1"]);
    }

    #[tokio::test]
    async fn test_identical_add_is_idempotent() {
        let backend = memory();
        let col = notes(&backend).await;

        let item = ActiveItem::new(ItemKind::Note, "n1", json!({"title": "hello"}));
        let first = col.upsert(item.clone()).await.unwrap();
        let second = col.upsert(item).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(col.len(), 1);
        assert_eq!(
            col.get_active("n1").await.unwrap().unwrap().date_modified,
            first.date_modified
        );
    }

    #[tokio::test]
    async fn test_update_preserves_date_created() {
        let backend = memory();
        let col = notes(&backend).await;

        let first = col
            .upsert(ActiveItem::new(ItemKind::Note, "n1", json!({"title": "v1"})))
            .await
            .unwrap();

        let mut update = ActiveItem::new(ItemKind::Note, "n1", json!({"title": "v2"}));
        update.date_created = 0; // caller-supplied value is ignored on update
        let second = col.upsert(update).await.unwrap();

        assert_eq!(second.date_created, first.date_created);
        assert!(second.date_modified >= first.date_modified);
        assert_eq!(
            col.get_active("n1").await.unwrap().unwrap().data["title"],
            "v2"
        );
    }

    #[tokio::test]
    async fn test_kind_mismatch_rejected() {
        let backend = memory();
        let col = notes(&backend).await;

        let wrong = ActiveItem::new(ItemKind::Tag, "t1", json!({}));
        assert!(matches!(
            col.upsert(wrong).await,
            Err(Error::KindMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_soft_delete_leaves_tombstone() {
        let backend = memory();
        let col = notes(&backend).await;

        col.upsert(ActiveItem::new(ItemKind::Note, "n1", json!({})))
            .await
            .unwrap();
        col.soft_delete("n1").await.unwrap();

        // Excluded from live queries
        assert!(col.active_items().await.unwrap().is_empty());
        assert!(col.get_active("n1").await.unwrap().is_none());

        // But the tombstone is still addressable and indexed
        let record = col.get("n1").await.unwrap().unwrap();
        assert!(record.is_tombstone());
        assert_eq!(col.ids(), vec!["n1"]);
    }

    #[tokio::test]
    async fn test_soft_delete_idempotent() {
        let backend = memory();
        let col = notes(&backend).await;

        col.upsert(ActiveItem::new(ItemKind::Note, "n1", json!({})))
            .await
            .unwrap();
        let first = col.soft_delete("n1").await.unwrap().unwrap();
        let second = col.soft_delete("n1").await.unwrap().unwrap();
        assert_eq!(first, second);

        assert!(col.soft_delete("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_hard_delete_removes_everywhere() {
        let backend = memory();
        let col = notes(&backend).await;

        col.upsert(ActiveItem::new(ItemKind::Note, "n1", json!({})))
            .await
            .unwrap();
        assert!(col.hard_delete("n1").await.unwrap());

        assert!(col.ids().is_empty());
        assert!(col.get("n1").await.unwrap().is_none());
        assert!(backend.read("notes:item:n1").await.unwrap().is_none());

        assert!(!col.hard_delete("n1").await.unwrap());
    }

    #[tokio::test]
    async fn test_index_and_record_both_persisted() {
        let backend = memory();
        let col = notes(&backend).await;

        col.upsert(ActiveItem::new(ItemKind::Note, "n1", json!({})))
            .await
            .unwrap();

        // The invariant: index entry and record exist together
        assert!(backend.read("notes:index").await.unwrap().is_some());
        assert!(backend.read("notes:item:n1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let backend = memory();
        {
            let col = notes(&backend).await;
            col.upsert(ActiveItem::new(ItemKind::Note, "n1", json!({"title": "kept"})))
                .await
                .unwrap();
            col.upsert(ActiveItem::new(ItemKind::Note, "n2", json!({})))
                .await
                .unwrap();
            col.soft_delete("n2").await.unwrap();
        }

        let col = notes(&backend).await;
        assert_eq!(col.len(), 2);
        assert_eq!(
            col.get_active("n1").await.unwrap().unwrap().data["title"],
            "kept"
        );
        assert!(col.get("n2").await.unwrap().unwrap().is_tombstone());
    }

    #[tokio::test]
    async fn test_corrupted_index_surfaces() {
        let backend = memory();
        backend.write("notes:index", b"not json").await.unwrap();

        let col = IndexedCollection::open(backend.clone(), "notes", ItemKind::Note);
        assert!(matches!(
            col.init().await,
            Err(Error::StorageCorrupted(_))
        ));
    }

    #[tokio::test]
    async fn test_cached_collection_round_trip() {
        let backend = memory();
        let col = CachedCollection::open(backend.clone(), "notes", ItemKind::Note);
        col.init().await.unwrap();

        col.upsert(ActiveItem::new(ItemKind::Note, "n1", json!({"title": "hi"})))
            .await
            .unwrap();

        // Cache reads are synchronous
        assert_eq!(col.get_active("n1").unwrap().data["title"], "hi");
        assert_eq!(col.active_items().len(), 1);

        col.soft_delete("n1").await.unwrap();
        assert!(col.get_active("n1").is_none());
        assert!(col.get("n1").unwrap().is_tombstone());

        col.hard_delete("n1").await.unwrap();
        assert!(col.get("n1").is_none());
    }

    #[tokio::test]
    async fn test_cached_collection_warms_from_storage() {
        let backend = memory();
        {
            let col = notes(&backend).await;
            col.upsert(ActiveItem::new(ItemKind::Note, "n1", json!({"title": "warm"})))
                .await
                .unwrap();
        }

        let cached = CachedCollection::open(backend, "notes", ItemKind::Note);
        cached.init().await.unwrap();
        assert_eq!(cached.get_active("n1").unwrap().data["title"], "warm");
    }
}

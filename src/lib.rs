//! # Inkhaven Core
//!
//! The encrypted local store at the heart of the Inkhaven note-taking app:
//! collections of versioned items with soft-delete semantics, a schema
//! migrator, bounded per-note version history, and streaming chunked
//! encryption for attachments. UI, sync, and platform storage live in the
//! host applications; this crate owns persistence semantics and crypto.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         INKHAVEN CORE                                   │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │                         ┌───────────┐                                   │
//! │                         │   Vault   │                                   │
//! │                         └─────┬─────┘                                   │
//! │            ┌────────────────┬─┴──────────────┬──────────────┐           │
//! │            ▼                ▼                ▼              ▼           │
//! │   ┌────────────────┐ ┌────────────┐ ┌──────────────┐ ┌────────────┐    │
//! │   │  Collections   │ │  Migrator  │ │ NoteHistory  │ │ Attachment │    │
//! │   │  notes, tags,  │ │  (schema   │ │ (bounded     │ │ pipeline   │    │
//! │   │  notebooks...  │ │  versions) │ │  sessions)   │ │ (chunked)  │    │
//! │   └───────┬────────┘ └─────┬──────┘ └──────┬───────┘ └─────┬──────┘    │
//! │           │                │               │               │           │
//! │           ▼                ▼               ▼               ▼           │
//! │   ┌─────────────────────────────────┐  ┌─────────────────────────┐     │
//! │   │      StorageBackend trait       │  │     crypto module       │     │
//! │   │   (memory, file, host stores)   │  │  XChaCha20-Poly1305 +   │     │
//! │   └─────────────────────────────────┘  │  Argon2id / HKDF keys   │     │
//! │                                        └─────────────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use inkhaven_core::{Vault, VaultConfig, MemoryBackend, ActiveItem, ItemKind};
//! use serde_json::json;
//!
//! # async fn example() -> inkhaven_core::Result<()> {
//! let config = VaultConfig::new(Arc::new(MemoryBackend::new()))
//!     .with_master_key([0u8; 32]);
//! let vault = Vault::open(config).await?;
//!
//! vault
//!     .notes()
//!     .upsert(ActiveItem::new(ItemKind::Note, "n1", json!({"title": "First"})))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod crypto;
pub mod error;
pub mod store;
pub mod time;

pub use crypto::{Cipher, CipherFormat, EncryptionKey};
pub use error::{Error, Result};
pub use store::{
    ActiveItem, AttachmentManifest, CachedCollection, FileBackend, Item, ItemKind, MemoryBackend,
    MigrationMode, MigrationRegistry, MigrationReport, Migrator, NoteHistory, SessionRecord,
    StorageBackend, Tombstone, CURRENT_VERSION, DEFAULT_CHUNK_SIZE, DEFAULT_HISTORY_LIMIT,
};

use std::sync::Arc;

use crypto::kdf::{self, domain};
use store::history::{BackendContentStore, ContentStore};
use store::migration::ProgressFn;

// ============================================================================
// VAULT
// ============================================================================

/// Configuration for opening a [`Vault`]
///
/// Explicitly constructed and passed in rather than held in module-level
/// state, so hosts can run several vaults side by side and control the
/// lifecycle.
pub struct VaultConfig {
    backend: Arc<dyn StorageBackend>,
    master_key: Option<[u8; 32]>,
    history_limit: usize,
}

impl VaultConfig {
    /// Configure a vault over the given backend, without encryption keys
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            master_key: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Provide the master key; locked history content and attachments need it
    pub fn with_master_key(mut self, master_key: [u8; 32]) -> Self {
        self.master_key = Some(master_key);
        self
    }

    /// Override the per-note history retention cap
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }
}

/// Derived subkeys held by an open vault
struct VaultKeys {
    item: EncryptionKey,
    attachment: EncryptionKey,
}

/// An open note store: collections, history, and attachment crypto
///
/// One `Vault` per data directory. All collections share the vault's storage
/// backend; callers await operations sequentially per collection.
pub struct Vault {
    notes: CachedCollection,
    notebooks: CachedCollection,
    tags: CachedCollection,
    reminders: CachedCollection,
    settings: CachedCollection,
    sessions: CachedCollection,
    attachments: CachedCollection,
    content: Arc<dyn ContentStore>,
    history: NoteHistory,
    keys: Option<VaultKeys>,
}

impl Vault {
    /// Open a vault: initialize every collection and wire up history
    ///
    /// When a master key is configured, item, attachment, and history
    /// subkeys are derived from it with domain-separated HKDF.
    pub async fn open(config: VaultConfig) -> Result<Vault> {
        let backend = config.backend;

        let notes = CachedCollection::open(backend.clone(), "notes", ItemKind::Note);
        let notebooks = CachedCollection::open(backend.clone(), "notebooks", ItemKind::Notebook);
        let tags = CachedCollection::open(backend.clone(), "tags", ItemKind::Tag);
        let reminders = CachedCollection::open(backend.clone(), "reminders", ItemKind::Reminder);
        let settings = CachedCollection::open(backend.clone(), "settings", ItemKind::Settings);
        let sessions = CachedCollection::open(backend.clone(), "sessions", ItemKind::Session);
        let attachments =
            CachedCollection::open(backend.clone(), "attachments", ItemKind::Attachment);

        for collection in [
            &notes,
            &notebooks,
            &tags,
            &reminders,
            &settings,
            &sessions,
            &attachments,
        ] {
            collection.init().await?;
        }

        let mut history_key = None;
        let keys = match config.master_key {
            Some(master) => {
                history_key = Some(EncryptionKey::from_bytes(kdf::derive_subkey(
                    &master,
                    domain::HISTORY_KEY,
                )?));
                Some(VaultKeys {
                    item: EncryptionKey::from_bytes(kdf::derive_subkey(&master, domain::ITEM_KEY)?),
                    attachment: EncryptionKey::from_bytes(kdf::derive_subkey(
                        &master,
                        domain::ATTACHMENT_KEY,
                    )?),
                })
            }
            None => None,
        };

        let content: Arc<dyn ContentStore> = Arc::new(BackendContentStore::new(backend));
        let history = NoteHistory::new(
            sessions.clone(),
            notes.clone(),
            content.clone(),
            history_key,
            config.history_limit,
        );

        tracing::info!(encrypted = keys.is_some(), "vault opened");
        Ok(Vault {
            notes,
            notebooks,
            tags,
            reminders,
            settings,
            sessions,
            attachments,
            content,
            history,
            keys,
        })
    }

    /// The notes collection
    pub fn notes(&self) -> &CachedCollection {
        &self.notes
    }

    /// The notebooks collection
    pub fn notebooks(&self) -> &CachedCollection {
        &self.notebooks
    }

    /// The tags collection
    pub fn tags(&self) -> &CachedCollection {
        &self.tags
    }

    /// The reminders collection
    pub fn reminders(&self) -> &CachedCollection {
        &self.reminders
    }

    /// The settings collection
    pub fn settings(&self) -> &CachedCollection {
        &self.settings
    }

    /// The attachment manifests collection
    pub fn attachments(&self) -> &CachedCollection {
        &self.attachments
    }

    /// Per-note version history
    pub fn history(&self) -> &NoteHistory {
        &self.history
    }

    /// Key for encrypting item payloads, when a master key is configured
    pub fn item_key(&self) -> Option<&EncryptionKey> {
        self.keys.as_ref().map(|k| &k.item)
    }

    /// Run a migration pass across every collection
    ///
    /// Per-item failures are tolerated; the report carries their count.
    pub async fn migrate(
        &self,
        registry: MigrationRegistry,
        mode: MigrationMode,
        progress: Option<&ProgressFn>,
    ) -> Result<MigrationReport> {
        let collections = [
            self.notes.clone(),
            self.notebooks.clone(),
            self.tags.clone(),
            self.reminders.clone(),
            self.settings.clone(),
            self.sessions.clone(),
            self.attachments.clone(),
        ];
        Migrator::new(registry).run(&collections, mode, progress).await
    }

    /// Soft-delete a note and drop its version history
    ///
    /// Returns `false` when the note id is unknown.
    pub async fn delete_note(&self, id: &str) -> Result<bool> {
        if !self.notes.soft_delete(id).await? {
            return Ok(false);
        }
        self.history.clear(id).await?;
        Ok(true)
    }

    /// Chunk, encrypt, and persist an attachment
    ///
    /// Encrypted chunks go to the content store under `{id}:{index}` keys;
    /// the manifest is persisted as an item in the attachments collection.
    /// Requires a configured master key.
    pub async fn store_attachment(
        &self,
        data: &[u8],
        chunk_size: usize,
    ) -> Result<AttachmentManifest> {
        let (manifest, chunks) =
            store::encrypt_attachment(self.attachment_key()?, data, chunk_size)?;

        for (index, chunk) in chunks.iter().enumerate() {
            self.content
                .add(&chunk_content_id(&manifest.id, index), chunk)
                .await?;
        }
        self.attachments
            .upsert(ActiveItem::new(
                ItemKind::Attachment,
                manifest.id.clone(),
                serde_json::to_value(&manifest)?,
            ))
            .await?;
        Ok(manifest)
    }

    /// Load, decrypt, and verify a stored attachment
    ///
    /// `None` when the manifest or any of its chunks is missing.
    pub async fn load_attachment(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let manifest = match self.attachments.get_active(id) {
            Some(item) => serde_json::from_value::<AttachmentManifest>(item.data)?,
            None => return Ok(None),
        };

        let mut chunks = Vec::with_capacity(chunk_count(&manifest));
        for index in 0..chunk_count(&manifest) {
            match self.content.raw(&chunk_content_id(id, index)).await? {
                Some(chunk) => chunks.push(chunk),
                None => return Ok(None),
            }
        }

        store::decrypt_attachment(self.attachment_key()?, &manifest, &chunks).map(Some)
    }

    /// Hard-delete an attachment's manifest and all of its chunks
    pub async fn remove_attachment(&self, id: &str) -> Result<bool> {
        let manifest = match self.attachments.get_active(id) {
            Some(item) => serde_json::from_value::<AttachmentManifest>(item.data)?,
            None => return Ok(false),
        };

        for index in 0..chunk_count(&manifest) {
            self.content.remove(&chunk_content_id(id, index)).await?;
        }
        self.attachments.hard_delete(id).await
    }

    fn attachment_key(&self) -> Result<&EncryptionKey> {
        self.keys
            .as_ref()
            .map(|k| &k.attachment)
            .ok_or_else(|| Error::InvalidKey("no master key configured".into()))
    }
}

fn chunk_content_id(attachment_id: &str, index: usize) -> String {
    format!("{attachment_id}:{index}")
}

/// Number of chunks an attachment was split into; an empty attachment
/// still has one (empty) final chunk
fn chunk_count(manifest: &AttachmentManifest) -> usize {
    let size = manifest.total_size as usize;
    let chunk_size = manifest.chunk_size.max(1);
    ((size + chunk_size - 1) / chunk_size).max(1)
}

// ============================================================================
// TESTS
// ============================================================================

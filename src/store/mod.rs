//! # Store Module
//!
//! The encrypted local collection store: persistence backends, the tagged
//! item model, indexed/cached collections with soft-delete semantics, the
//! schema migrator, bounded note history, and the attachment chunk pipeline.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        STORE ARCHITECTURE                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   Migrator          NoteHistory         Attachment pipeline            │
//! │      │                   │                      │                       │
//! │      ▼                   ▼                      ▼                       │
//! │   ┌──────────────────────────────┐      ┌──────────────┐               │
//! │   │  IndexedCollection /         │      │ Chunker +    │               │
//! │   │  CachedCollection            │      │ ChunkTagger  │               │
//! │   │  (id index + item records)   │      │ + stream     │               │
//! │   └──────────────┬───────────────┘      │   cipher     │               │
//! │                  │                      └──────┬───────┘               │
//! │                  ▼                             │                       │
//! │   ┌──────────────────────────────┐             │                       │
//! │   │  StorageBackend trait        │◀────────────┘                       │
//! │   │  (memory / file / external)  │                                     │
//! │   └──────────────────────────────┘                                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod chunker;
pub mod collection;
pub mod history;
pub mod item;
pub mod migration;

pub use backend::{FileBackend, MemoryBackend, StorageBackend};
pub use chunker::{
    decrypt_attachment, encrypt_attachment, AttachmentManifest, Chunk, ChunkTagger, Chunker,
    DEFAULT_CHUNK_SIZE,
};
pub use collection::{CachedCollection, IndexedCollection};
pub use history::{
    BackendContentStore, ContentStore, NoteHistory, SessionRecord, DEFAULT_HISTORY_LIMIT,
};
pub use item::{ActiveItem, Item, ItemKind, Tombstone, CURRENT_VERSION};
pub use migration::{
    Migration, MigrationMode, MigrationRegistry, MigrationReport, Migrator, ProgressFn, Transform,
};

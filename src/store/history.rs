//! # Note History
//!
//! Bounded per-note version history. Each saved snapshot of a note becomes a
//! session record in the `sessions` collection, with its content stored
//! separately through a [`ContentStore`] (encrypted when the note is locked).
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        NOTE HISTORY                                     │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  sessions collection            content store                          │
//! │  ───────────────────             ─────────────                          │
//! │  note1_s3  (newest) ───────────▶ content:note1_s3                      │
//! │  note1_s2           ───────────▶ content:note1_s2                      │
//! │  note1_s1  (oldest) ───────────▶ content:note1_s1                      │
//! │                                                                         │
//! │  add():     skip if content hash equals the newest session's hash      │
//! │  cleanup(): evict oldest-by-date_modified while count > limit (FIFO)   │
//! │  restore(): copy a session's blob back as the note's live content;     │
//! │             silent no-op when session, content, or note is gone        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::crypto::cipher::{decrypt, encrypt, Cipher, CipherFormat, EncryptionKey};
use crate::error::{Error, Result};
use crate::store::backend::StorageBackend;
use crate::store::collection::CachedCollection;
use crate::store::item::{ActiveItem, Item, ItemKind};
use crate::time::now_timestamp_millis;

/// Sessions retained per note unless configured otherwise
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

// ============================================================================
// CONTENT STORE
// ============================================================================

/// Opaque content blobs keyed by id, stored separately from session records
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Read the raw blob for `content_id`, or `None` if absent
    async fn raw(&self, content_id: &str) -> Result<Option<Vec<u8>>>;

    /// Store `bytes` under `content_id`
    async fn add(&self, content_id: &str, bytes: &[u8]) -> Result<()>;

    /// Remove the blob under `content_id`; absent ids are a no-op
    async fn remove(&self, content_id: &str) -> Result<()>;
}

/// Content store over a [`StorageBackend`], keys prefixed with `content:`
pub struct BackendContentStore {
    backend: Arc<dyn StorageBackend>,
}

impl BackendContentStore {
    /// Wrap a storage backend as a content store
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    fn key(content_id: &str) -> String {
        format!("content:{content_id}")
    }
}

#[async_trait]
impl ContentStore for BackendContentStore {
    async fn raw(&self, content_id: &str) -> Result<Option<Vec<u8>>> {
        self.backend.read(&Self::key(content_id)).await
    }

    async fn add(&self, content_id: &str, bytes: &[u8]) -> Result<()> {
        self.backend.write(&Self::key(content_id), bytes).await
    }

    async fn remove(&self, content_id: &str) -> Result<()> {
        self.backend.remove(&Self::key(content_id)).await
    }
}

// ============================================================================
// SESSION RECORDS
// ============================================================================

/// Payload of a `Session` item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SessionData {
    note_id: String,
    locked: bool,
    local_only: bool,
    content_hash: String,
}

/// One historical snapshot of a note's content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    /// Composite id: `{note_id}_{session_id}`; also the content id
    pub id: String,
    /// The note this snapshot belongs to
    pub note_id: String,
    /// Whether the stored content is encrypted
    pub locked: bool,
    /// Excluded from sync when set
    pub local_only: bool,
    /// SHA-256 hex of the plaintext content, for duplicate detection
    pub content_hash: String,
    /// Creation time, Unix millis
    pub date_created: i64,
    /// Last modification time, Unix millis
    pub date_modified: i64,
}

impl SessionRecord {
    fn from_item(item: &ActiveItem) -> Result<Self> {
        let data: SessionData = serde_json::from_value(item.data.clone())?;
        Ok(Self {
            id: item.id.clone(),
            note_id: data.note_id,
            locked: data.locked,
            local_only: data.local_only,
            content_hash: data.content_hash,
            date_created: item.date_created,
            date_modified: item.date_modified,
        })
    }
}

// ============================================================================
// NOTE HISTORY
// ============================================================================

/// Bounded per-note version history over a sessions collection
#[derive(Clone)]
pub struct NoteHistory {
    sessions: CachedCollection,
    notes: CachedCollection,
    content: Arc<dyn ContentStore>,
    key: Option<EncryptionKey>,
    limit: usize,
}

impl NoteHistory {
    /// Build a history over the given collections and content store
    ///
    /// `key` is required to add or read locked sessions; without it, locked
    /// operations fail with [`Error::InvalidKey`].
    pub fn new(
        sessions: CachedCollection,
        notes: CachedCollection,
        content: Arc<dyn ContentStore>,
        key: Option<EncryptionKey>,
        limit: usize,
    ) -> Self {
        Self {
            sessions,
            notes,
            content,
            key,
            limit,
        }
    }

    /// Save a snapshot of a note's content, then enforce the retention cap
    ///
    /// `local_only` sessions are flagged for exclusion from sync by the
    /// host. When the content hash matches the newest existing session, no
    /// new session is created; the existing one's `date_modified` is bumped
    /// so it stays at the head of the history. Returns the session's id.
    pub async fn add(
        &self,
        note_id: &str,
        session_id: &str,
        locked: bool,
        local_only: bool,
        content: &[u8],
    ) -> Result<String> {
        let hash = content_hash(content);

        if let Some(newest) = self.sessions_for(note_id).pop() {
            if newest.content_hash == hash {
                if let Some(Item::Active(mut item)) = self.sessions.get(&newest.id) {
                    item.date_modified = now_timestamp_millis();
                    self.sessions.put(Item::Active(item)).await?;
                }
                return Ok(newest.id);
            }
        }

        let id = format!("{note_id}_{session_id}");
        let blob = if locked {
            let key = self.require_key()?;
            let cipher = encrypt(key, content, CipherFormat::Base64)?;
            serde_json::to_vec(&cipher)?
        } else {
            content.to_vec()
        };
        self.content.add(&id, &blob).await?;

        let data = serde_json::to_value(SessionData {
            note_id: note_id.to_string(),
            locked,
            local_only,
            content_hash: hash,
        })?;
        self.sessions
            .upsert(ActiveItem::new(ItemKind::Session, id.clone(), data))
            .await?;

        self.cleanup(note_id).await?;
        Ok(id)
    }

    /// All live sessions for a note, most recent first
    pub fn get(&self, note_id: &str) -> Vec<SessionRecord> {
        let mut sessions = self.sessions_for(note_id);
        sessions.reverse();
        sessions
    }

    /// A session's content, decrypted when locked; `None` when the session
    /// or its blob is missing
    pub async fn content(&self, session_id: &str) -> Result<Option<Vec<u8>>> {
        let record = match self.record(session_id) {
            Some(record) => record,
            None => return Ok(None),
        };
        let blob = match self.content.raw(session_id).await? {
            Some(blob) => blob,
            None => return Ok(None),
        };

        if record.locked {
            let key = self.require_key()?;
            let cipher: Cipher = serde_json::from_slice(&blob)
                .map_err(|e| Error::InvalidCiphertext(e.to_string()))?;
            Ok(Some(decrypt(key, &cipher)?))
        } else {
            Ok(Some(blob))
        }
    }

    /// Write a session's stored content back as the note's live content
    ///
    /// The blob is copied verbatim, so a locked session restores into a
    /// locked live container. Returns `Ok(false)` without side effects when
    /// the session, its content, or the target note no longer exists.
    pub async fn restore(&self, session_id: &str) -> Result<bool> {
        let record = match self.record(session_id) {
            Some(record) => record,
            None => return Ok(false),
        };
        if self.notes.get_active(&record.note_id).is_none() {
            return Ok(false);
        }
        let blob = match self.content.raw(session_id).await? {
            Some(blob) => blob,
            None => return Ok(false),
        };

        self.content.add(&record.note_id, &blob).await?;
        Ok(true)
    }

    /// Physically remove one session and its content
    pub async fn remove(&self, session_id: &str) -> Result<()> {
        self.sessions.hard_delete(session_id).await?;
        self.content.remove(session_id).await
    }

    /// Evict oldest sessions while the note is over its retention cap
    ///
    /// Eviction is purely by age (`date_modified` ascending), not by access.
    pub async fn cleanup(&self, note_id: &str) -> Result<()> {
        let sessions = self.sessions_for(note_id);
        if sessions.len() <= self.limit {
            return Ok(());
        }

        let excess = sessions.len() - self.limit;
        tracing::debug!(note_id, excess, "evicting oldest history sessions");
        for session in &sessions[..excess] {
            self.remove(&session.id).await?;
        }
        Ok(())
    }

    /// Remove every session and content blob for a note
    pub async fn clear(&self, note_id: &str) -> Result<()> {
        for session in self.sessions_for(note_id) {
            self.remove(&session.id).await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Live sessions for a note, oldest first
    ///
    /// Walks the collection index (insertion order) and stable-sorts by
    /// `date_modified`, so sessions saved within the same millisecond keep
    /// their insertion order instead of tying arbitrarily.
    fn sessions_for(&self, note_id: &str) -> Vec<SessionRecord> {
        let mut sessions: Vec<SessionRecord> = self
            .sessions
            .ids()
            .iter()
            .filter_map(|id| self.sessions.get_active(id))
            .filter_map(|item| SessionRecord::from_item(&item).ok())
            .filter(|record| record.note_id == note_id)
            .collect();
        sessions.sort_by_key(|record| record.date_modified);
        sessions
    }

    fn record(&self, session_id: &str) -> Option<SessionRecord> {
        self.sessions
            .get_active(session_id)
            .and_then(|item| SessionRecord::from_item(&item).ok())
    }

    fn require_key(&self) -> Result<&EncryptionKey> {
        self.key
            .as_ref()
            .ok_or_else(|| Error::InvalidKey("no history key configured for locked content".into()))
    }
}

/// SHA-256 hex digest used as the session content address
fn content_hash(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::backend::MemoryBackend;
    use serde_json::json;

    struct Fixture {
        history: NoteHistory,
        notes: CachedCollection,
        backend: Arc<dyn StorageBackend>,
    }

    async fn fixture(limit: usize, key: Option<EncryptionKey>) -> Fixture {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let sessions = CachedCollection::open(backend.clone(), "sessions", ItemKind::Session);
        sessions.init().await.unwrap();
        let notes = CachedCollection::open(backend.clone(), "notes", ItemKind::Note);
        notes.init().await.unwrap();
        let content = Arc::new(BackendContentStore::new(backend.clone()));

        let history = NoteHistory::new(sessions, notes.clone(), content, key, limit);
        Fixture {
            history,
            notes,
            backend,
        }
    }

    async fn add_note(notes: &CachedCollection, id: &str) {
        notes
            .upsert(ActiveItem::new(ItemKind::Note, id, json!({"title": id})))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_add_and_get_round_trip() {
        let f = fixture(DEFAULT_HISTORY_LIMIT, None).await;
        add_note(&f.notes, "n1").await;

        f.history
            .add("n1", "s1", false, false, b"draft one")
            .await
            .unwrap();
        f.history
            .add("n1", "s2", false, false, b"draft two")
            .await
            .unwrap();

        let sessions = f.history.get("n1");
        assert_eq!(sessions.len(), 2);
        // Most recent first
        assert_eq!(sessions[0].id, "n1_s2");
        assert_eq!(sessions[1].id, "n1_s1");

        let content = f.history.content("n1_s1").await.unwrap().unwrap();
        assert_eq!(content, b"draft one");
    }

    #[tokio::test]
    async fn test_identical_content_reuses_session() {
        let f = fixture(DEFAULT_HISTORY_LIMIT, None).await;
        add_note(&f.notes, "n1").await;

        let first = f
            .history
            .add("n1", "s1", false, false, b"same")
            .await
            .unwrap();
        let second = f
            .history
            .add("n1", "s2", false, false, b"same")
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(f.history.get("n1").len(), 1);
    }

    #[tokio::test]
    async fn test_cap_evicts_oldest_first() {
        let f = fixture(5, None).await;
        add_note(&f.notes, "n1").await;

        for i in 0..8 {
            f.history
                .add(
                    "n1",
                    &format!("s{i}"),
                    false,
                    false,
                    format!("rev {i}").as_bytes(),
                )
                .await
                .unwrap();
        }

        let sessions = f.history.get("n1");
        assert_eq!(sessions.len(), 5);
        // s0..s2 were evicted; s3..s7 remain, newest first
        let ids: Vec<&str> = sessions.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["n1_s7", "n1_s6", "n1_s5", "n1_s4", "n1_s3"]);

        // Evicted content is physically gone
        assert!(f.history.content("n1_s0").await.unwrap().is_none());
        assert!(f.backend.read("content:n1_s0").await.unwrap().is_none());
    }

    // Sequential saves often share one millisecond timestamp; ordering must
    // still follow insertion order so eviction never outlives a newer save.
    #[tokio::test]
    async fn test_eviction_stable_when_timestamps_tie() {
        let f = fixture(3, None).await;
        add_note(&f.notes, "n1").await;

        for round in 0..20 {
            for i in 0..8 {
                f.history
                    .add(
                        "n1",
                        &format!("r{round}s{i}"),
                        false,
                        false,
                        format!("rev {round}/{i}").as_bytes(),
                    )
                    .await
                    .unwrap();
            }

            let ids: Vec<String> = f.history.get("n1").iter().map(|s| s.id.clone()).collect();
            assert_eq!(
                ids,
                vec![
                    format!("n1_r{round}s7"),
                    format!("n1_r{round}s6"),
                    format!("n1_r{round}s5"),
                ],
                "round {round}"
            );
        }
    }

    #[tokio::test]
    async fn test_local_only_flag_round_trips() {
        let f = fixture(DEFAULT_HISTORY_LIMIT, None).await;
        add_note(&f.notes, "n1").await;

        f.history
            .add("n1", "s1", false, true, b"device draft")
            .await
            .unwrap();
        f.history
            .add("n1", "s2", false, false, b"synced draft")
            .await
            .unwrap();

        let sessions = f.history.get("n1");
        assert!(!sessions[0].local_only);
        assert!(sessions[1].local_only);
    }

    #[tokio::test]
    async fn test_locked_session_round_trip() {
        let key = EncryptionKey::from_bytes([7u8; 32]);
        let f = fixture(DEFAULT_HISTORY_LIMIT, Some(key)).await;
        add_note(&f.notes, "n1").await;

        f.history
            .add("n1", "s1", true, false, b"secret draft")
            .await
            .unwrap();

        // The stored blob is not the plaintext
        let blob = f.backend.read("content:n1_s1").await.unwrap().unwrap();
        assert_ne!(blob, b"secret draft");

        let content = f.history.content("n1_s1").await.unwrap().unwrap();
        assert_eq!(content, b"secret draft");
    }

    #[tokio::test]
    async fn test_locked_without_key_fails() {
        let f = fixture(DEFAULT_HISTORY_LIMIT, None).await;
        add_note(&f.notes, "n1").await;

        let result = f.history.add("n1", "s1", true, false, b"secret").await;
        assert!(matches!(result, Err(Error::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_restore_writes_live_content() {
        let f = fixture(DEFAULT_HISTORY_LIMIT, None).await;
        add_note(&f.notes, "n1").await;

        f.history
            .add("n1", "s1", false, false, b"old revision")
            .await
            .unwrap();

        assert!(f.history.restore("n1_s1").await.unwrap());
        assert_eq!(
            f.backend.read("content:n1").await.unwrap().unwrap(),
            b"old revision"
        );
    }

    #[tokio::test]
    async fn test_restore_on_deleted_note_is_noop() {
        let f = fixture(DEFAULT_HISTORY_LIMIT, None).await;
        add_note(&f.notes, "n1").await;
        f.history
            .add("n1", "s1", false, false, b"content")
            .await
            .unwrap();

        f.notes.soft_delete("n1").await.unwrap();

        assert!(!f.history.restore("n1_s1").await.unwrap());
        // No live content record was created
        assert!(f.backend.read("content:n1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_restore_missing_session_is_noop() {
        let f = fixture(DEFAULT_HISTORY_LIMIT, None).await;
        add_note(&f.notes, "n1").await;

        assert!(!f.history.restore("n1_missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_removes_sessions_and_content() {
        let f = fixture(DEFAULT_HISTORY_LIMIT, None).await;
        add_note(&f.notes, "n1").await;
        add_note(&f.notes, "n2").await;

        f.history.add("n1", "s1", false, false, b"a").await.unwrap();
        f.history.add("n1", "s2", false, false, b"b").await.unwrap();
        f.history
            .add("n2", "s1", false, false, b"other")
            .await
            .unwrap();

        f.history.clear("n1").await.unwrap();

        assert!(f.history.get("n1").is_empty());
        assert!(f.history.content("n1_s1").await.unwrap().is_none());
        // Other notes' history is untouched
        assert_eq!(f.history.get("n2").len(), 1);
    }
}

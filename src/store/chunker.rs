//! # Attachment Chunk Pipeline
//!
//! Splits an arbitrary-length byte stream into fixed-size chunks for
//! streaming authenticated encryption, and reassembles the inverse.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  ATTACHMENT ENCRYPTION PIPELINE                         │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  input bytes ──▶ Chunker ──▶ ChunkTagger ──▶ EncryptionStream          │
//! │                  (fixed-     (marks the      (push / finish)           │
//! │                   size        final chunk)                             │
//! │                   slices)                                              │
//! │                                                                         │
//! │  Chunker: buffers input, emits full chunks as they fill; flush emits   │
//! │           the trailing partial chunk.                                  │
//! │  Tagger:  counts bytes against the declared total so the cipher knows  │
//! │           when to finalize; a count mismatch fails at finish.          │
//! │                                                                         │
//! │  Output: AttachmentManifest (stream header, sizes, SHA-256 content     │
//! │          address) + one ciphertext blob per chunk.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::crypto::cipher::EncryptionKey;
use crate::crypto::stream::{DecryptionStream, EncryptionStream, STREAM_HEADER_SIZE};
use crate::error::{Error, Result};
use crate::time::now_timestamp_millis;

/// Default chunk size for attachment encryption (512 KiB)
pub const DEFAULT_CHUNK_SIZE: usize = 512 * 1024;

// ============================================================================
// CHUNKER
// ============================================================================

/// Accumulates bytes and emits fixed-size chunks
///
/// Every emitted chunk is exactly `chunk_size` bytes except the one produced
/// by [`flush`](Self::flush), which carries whatever remains.
pub struct Chunker {
    chunk_size: usize,
    buffer: Vec<u8>,
}

impl Chunker {
    /// Create a chunker emitting `chunk_size`-byte chunks
    pub fn new(chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidChunkSize);
        }
        Ok(Self {
            chunk_size,
            buffer: Vec::new(),
        })
    }

    /// Feed bytes in; get back as many full chunks as are now available
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(bytes);

        let full = self.buffer.len() / self.chunk_size;
        let mut chunks = Vec::with_capacity(full);
        for _ in 0..full {
            let rest = self.buffer.split_off(self.chunk_size);
            chunks.push(std::mem::replace(&mut self.buffer, rest));
        }
        chunks
    }

    /// Emit the trailing partial chunk, if any
    pub fn flush(&mut self) -> Option<Vec<u8>> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }
}

// ============================================================================
// CHUNK TAGGER
// ============================================================================

/// A chunk of a larger stream, tagged with whether it ends the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// The chunk's bytes
    pub data: Vec<u8>,
    /// Whether this chunk completes the declared total size
    pub is_final: bool,
}

/// Tags chunks against a declared total size
///
/// The cipher needs to know which chunk is last so it can finalize the
/// authenticated stream instead of expecting more input.
pub struct ChunkTagger {
    total_size: u64,
    seen: u64,
}

impl ChunkTagger {
    /// Create a tagger expecting exactly `total_size` bytes
    pub fn new(total_size: u64) -> Self {
        Self {
            total_size,
            seen: 0,
        }
    }

    /// Tag one chunk; `is_final` is set on the chunk that completes the total
    pub fn tag(&mut self, data: Vec<u8>) -> Chunk {
        self.seen += data.len() as u64;
        Chunk {
            data,
            is_final: self.seen == self.total_size,
        }
    }

    /// Verify the declared total matched the bytes actually seen
    pub fn finish(self) -> Result<()> {
        if self.seen == self.total_size {
            Ok(())
        } else {
            Err(Error::StreamSizeMismatch {
                declared: self.total_size,
                seen: self.seen,
            })
        }
    }
}

// ============================================================================
// ATTACHMENT PIPELINE
// ============================================================================

/// Everything needed to decrypt and verify an attachment, minus the key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentManifest {
    /// Attachment id
    pub id: String,
    /// Stream header the chunks were encrypted under
    #[serde(with = "header_bytes")]
    pub header: [u8; STREAM_HEADER_SIZE],
    /// Plaintext chunk size the attachment was split at
    pub chunk_size: usize,
    /// Total plaintext size in bytes
    pub total_size: u64,
    /// SHA-256 hex of the plaintext; the attachment's content address
    pub content_hash: String,
    /// When the attachment was encrypted, Unix millis
    pub date_created: i64,
}

/// Chunk, tag, and stream-encrypt an attachment
///
/// Returns the manifest plus one ciphertext blob per chunk, in stream order.
/// An empty attachment still produces one (empty) final chunk so the stream
/// terminates verifiably.
pub fn encrypt_attachment(
    key: &EncryptionKey,
    data: &[u8],
    chunk_size: usize,
) -> Result<(AttachmentManifest, Vec<Vec<u8>>)> {
    let mut chunker = Chunker::new(chunk_size)?;
    let mut plain_chunks = chunker.push(data);
    if let Some(tail) = chunker.flush() {
        plain_chunks.push(tail);
    }
    if plain_chunks.is_empty() {
        plain_chunks.push(Vec::new());
    }

    let mut tagger = ChunkTagger::new(data.len() as u64);
    let mut stream = EncryptionStream::new(key)?;
    let header = *stream.header();

    let last = plain_chunks.len() - 1;
    let mut encrypted = Vec::with_capacity(plain_chunks.len());
    for (i, plain) in plain_chunks.into_iter().enumerate() {
        let chunk = tagger.tag(plain);
        if i == last {
            encrypted.push(stream.finish(&chunk.data)?);
            break;
        }
        encrypted.push(stream.push(&chunk.data)?);
    }
    tagger.finish()?;

    let manifest = AttachmentManifest {
        id: Uuid::new_v4().to_string(),
        header,
        chunk_size,
        total_size: data.len() as u64,
        content_hash: hex::encode(Sha256::digest(data)),
        date_created: now_timestamp_millis(),
    };
    Ok((manifest, encrypted))
}

/// Decrypt an attachment's chunks and verify size and content address
pub fn decrypt_attachment(
    key: &EncryptionKey,
    manifest: &AttachmentManifest,
    chunks: &[Vec<u8>],
) -> Result<Vec<u8>> {
    let mut stream = DecryptionStream::new(key, &manifest.header)?;
    let mut data = Vec::with_capacity(manifest.total_size as usize);

    let last = match chunks.len().checked_sub(1) {
        Some(last) => last,
        None => {
            return Err(Error::StreamSizeMismatch {
                declared: manifest.total_size,
                seen: 0,
            })
        }
    };
    for chunk in &chunks[..last] {
        data.extend_from_slice(&stream.pull(chunk)?);
    }
    data.extend_from_slice(&stream.finish(&chunks[last])?);

    if data.len() as u64 != manifest.total_size {
        return Err(Error::StreamSizeMismatch {
            declared: manifest.total_size,
            seen: data.len() as u64,
        });
    }

    let hash = hex::encode(Sha256::digest(&data));
    if hash != manifest.content_hash {
        return Err(Error::ContentHashMismatch {
            expected: manifest.content_hash.clone(),
            actual: hash,
        });
    }
    Ok(data)
}

mod header_bytes {
    use super::STREAM_HEADER_SIZE;
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        header: &[u8; STREAM_HEADER_SIZE],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(header))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<[u8; STREAM_HEADER_SIZE], D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = STANDARD.decode(&encoded).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("stream header must be 19 bytes"))
    }
}

// ============================================================================
// TESTS
// ============================================================================

//! # Streaming Cipher
//!
//! Chunked authenticated encryption for payloads too large to buffer,
//! built on the STREAM construction over XChaCha20-Poly1305.
//!
//! ## Stream Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      ENCRYPTED STREAM LAYOUT                            │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Header (19 bytes, random, exchanged once at stream start)             │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  Per-chunk nonce = header ‖ BE32 counter ‖ last-block flag             │
//! │                                                                         │
//! │  ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────────┐           │
//! │  │ chunk 0  │  │ chunk 1  │  │ chunk 2  │  │ final chunk  │           │
//! │  │ ctr=0    │  │ ctr=1    │  │ ctr=2    │  │ ctr=3,last=1 │           │
//! │  │ +16B tag │  │ +16B tag │  │ +16B tag │  │ +16B tag     │           │
//! │  └──────────┘  └──────────┘  └──────────┘  └──────────────┘           │
//! │                                                                         │
//! │  Each chunk is authenticated independently but bound to its position   │
//! │  and to the stream end, so reordering, truncation, or tampering is     │
//! │  detected at decrypt time.                                             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use aead::generic_array::GenericArray;
use aead::stream::{DecryptorBE32, EncryptorBE32};
use chacha20poly1305::{aead::KeyInit, XChaCha20Poly1305};
use rand::RngCore;

use crate::crypto::cipher::EncryptionKey;
use crate::error::{Error, Result};

/// Size of the stream header in bytes
///
/// The XChaCha nonce is 24 bytes; the STREAM construction reserves 4 bytes
/// for the chunk counter and 1 for the last-block flag, leaving 19 for the
/// random per-stream prefix.
pub const STREAM_HEADER_SIZE: usize = 19;

/// Per-chunk ciphertext overhead (the Poly1305 tag)
pub const STREAM_CHUNK_OVERHEAD: usize = 16;

fn stream_aead(key: &EncryptionKey) -> Result<XChaCha20Poly1305> {
    XChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|e| Error::InvalidKey(e.to_string()))
}

/// Encrypting half of a chunked stream
///
/// Feed intermediate chunks through [`push`](Self::push) and close the
/// stream with [`finish`](Self::finish); the final chunk is what lets the
/// decryptor verify the stream was not truncated.
pub struct EncryptionStream {
    inner: EncryptorBE32<XChaCha20Poly1305>,
    header: [u8; STREAM_HEADER_SIZE],
}

impl EncryptionStream {
    /// Start a new stream with a fresh random header
    pub fn new(key: &EncryptionKey) -> Result<Self> {
        let mut header = [0u8; STREAM_HEADER_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut header);
        let inner = EncryptorBE32::from_aead(stream_aead(key)?, GenericArray::from_slice(&header));
        Ok(Self { inner, header })
    }

    /// The stream header; must be stored/transmitted for decryption
    pub fn header(&self) -> &[u8; STREAM_HEADER_SIZE] {
        &self.header
    }

    /// Encrypt an intermediate (non-final) chunk
    pub fn push(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.inner
            .encrypt_next(plaintext)
            .map_err(|_| Error::EncryptionFailed("stream chunk encryption failed".into()))
    }

    /// Encrypt the final chunk and finalize the stream
    pub fn finish(self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.inner
            .encrypt_last(plaintext)
            .map_err(|_| Error::EncryptionFailed("stream finalization failed".into()))
    }
}

/// Decrypting half of a chunked stream
///
/// Chunks must be fed back in encryption order; the last-written chunk goes
/// through [`finish`](Self::finish). Reordered, truncated, or tampered
/// chunks fail with [`Error::AuthenticationFailed`].
pub struct DecryptionStream {
    inner: DecryptorBE32<XChaCha20Poly1305>,
}

impl DecryptionStream {
    /// Resume a stream from its stored header
    pub fn new(key: &EncryptionKey, header: &[u8; STREAM_HEADER_SIZE]) -> Result<Self> {
        let inner = DecryptorBE32::from_aead(stream_aead(key)?, GenericArray::from_slice(header));
        Ok(Self { inner })
    }

    /// Decrypt an intermediate (non-final) chunk
    pub fn pull(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.inner
            .decrypt_next(ciphertext)
            .map_err(|_| Error::AuthenticationFailed)
    }

    /// Decrypt the final chunk and verify the stream terminated here
    pub fn finish(self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.inner
            .decrypt_last(ciphertext)
            .map_err(|_| Error::AuthenticationFailed)
    }
}

// ============================================================================
// TESTS
// ============================================================================

//! # Cryptography Module
//!
//! All cryptographic primitives used by Inkhaven Core.
//!
//! ## Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    CRYPTOGRAPHIC ARCHITECTURE                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  Whole-Buffer Encryption (cipher.rs)                            │   │
//! │  │  ───────────────────────────────────                             │   │
//! │  │                                                                 │   │
//! │  │  XChaCha20-Poly1305, random 24-byte nonce per payload.          │   │
//! │  │  Used for item records and locked history-session content.     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  Streaming Encryption (stream.rs)                               │   │
//! │  │  ────────────────────────────────                                │   │
//! │  │                                                                 │   │
//! │  │  STREAM construction over XChaCha20-Poly1305: one random        │   │
//! │  │  19-byte header per stream, per-chunk authentication chained    │   │
//! │  │  by a BE32 counter and a last-block flag. Used for chunked     │   │
//! │  │  attachment encryption without buffering whole files.          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  Key Derivation (kdf.rs)                                        │   │
//! │  │  ───────────────────────                                         │   │
//! │  │                                                                 │   │
//! │  │  Argon2id: password + salt → vault master key                   │   │
//! │  │  HKDF-SHA256: master key → item / attachment / history subkeys  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod cipher;
pub mod kdf;
pub mod stream;

pub use cipher::{
    decrypt, decrypt_with_password, encrypt, encrypt_with_password, Cipher, CipherFormat,
    EncryptionKey, Nonce, KEY_SIZE, NONCE_SIZE, SALT_SIZE, TAG_SIZE,
};
pub use kdf::{derive_key_from_password, derive_subkey, generate_salt};
pub use stream::{DecryptionStream, EncryptionStream, STREAM_HEADER_SIZE};

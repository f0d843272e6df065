//! # Error Handling
//!
//! This module provides the error types for Inkhaven Core.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Crypto Errors                                                     │
//! │  │   ├── EncryptionFailed      - Encryption operation failed           │
//! │  │   ├── AuthenticationFailed  - Ciphertext failed authentication      │
//! │  │   ├── InvalidCiphertext     - Malformed cipher bundle               │
//! │  │   ├── KeyDerivationFailed   - Failed to derive a key                │
//! │  │   ├── InvalidKey            - Invalid key format/length             │
//! │  │   └── MissingSalt           - Password decrypt without a salt       │
//! │  │                                                                      │
//! │  ├── Storage Errors                                                    │
//! │  │   ├── StorageReadError      - Failed to read from the backend       │
//! │  │   ├── StorageWriteError     - Failed to write to the backend        │
//! │  │   └── StorageCorrupted      - Persisted data failed to parse        │
//! │  │                                                                      │
//! │  ├── Collection Errors                                                 │
//! │  │   ├── CollectionNotInitialized - Used before init()                 │
//! │  │   └── KindMismatch          - Item kind doesn't match collection    │
//! │  │                                                                      │
//! │  ├── Migration Errors                                                  │
//! │  │   ├── MigrationFailed       - A transform step failed for one item  │
//! │  │   └── ItemVersionAhead      - Item newer than this build            │
//! │  │                                                                      │
//! │  ├── Chunking Errors                                                   │
//! │  │   ├── InvalidChunkSize      - Chunk size of zero                    │
//! │  │   ├── StreamSizeMismatch    - Declared size != bytes seen           │
//! │  │   └── ContentHashMismatch   - Reassembled data hash mismatch        │
//! │  │                                                                      │
//! │  └── Internal Errors                                                   │
//! │      └── Serialization         - serde round-trip failure              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for Inkhaven Core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Inkhaven Core
///
/// All errors are categorized by module/domain to make error handling
/// clearer and to provide meaningful error messages to callers.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Crypto Errors (200-299)
    // ========================================================================

    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Ciphertext failed authentication
    ///
    /// The key is wrong, the nonce is wrong, or the data was tampered with.
    /// Decryption fails closed: no partial plaintext is ever returned.
    #[error("Decryption failed: authentication tag mismatch")]
    AuthenticationFailed,

    /// Malformed cipher bundle (bad encoding, truncated payload)
    #[error("Invalid ciphertext: {0}")]
    InvalidCiphertext(String),

    /// Key derivation failed
    #[error("Failed to derive key: {0}")]
    KeyDerivationFailed(String),

    /// Invalid key format or length
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Cipher bundle has no salt but a password-derived key was requested
    #[error("Cipher has no salt; cannot derive key from password")]
    MissingSalt,

    // ========================================================================
    // Storage Errors (300-399)
    // ========================================================================

    /// Failed to read from the storage backend
    #[error("Failed to read from storage: {0}")]
    StorageReadError(String),

    /// Failed to write to the storage backend
    #[error("Failed to write to storage: {0}")]
    StorageWriteError(String),

    /// Persisted data exists but could not be parsed
    #[error("Data corruption detected: {0}")]
    StorageCorrupted(String),

    // ========================================================================
    // Collection Errors (400-499)
    // ========================================================================

    /// Collection used before `init()` completed
    #[error("Collection '{0}' has not been initialized. Call init() first.")]
    CollectionNotInitialized(String),

    /// Item kind does not match the collection it was written to
    #[error("Item kind mismatch: collection holds '{expected}', got '{actual}'")]
    KindMismatch {
        /// Kind the collection stores
        expected: String,
        /// Kind of the rejected item
        actual: String,
    },

    // ========================================================================
    // Migration Errors (500-599)
    // ========================================================================

    /// A transform step failed for one item
    #[error("Migration failed for item '{id}': {reason}")]
    MigrationFailed {
        /// Id of the item that failed
        id: String,
        /// What went wrong
        reason: String,
    },

    /// Item was written by a newer version of the schema
    #[error("Item '{id}' has version {version}, newer than this build supports")]
    ItemVersionAhead {
        /// Id of the offending item
        id: String,
        /// The item's on-disk version
        version: u32,
    },

    // ========================================================================
    // Chunking Errors (600-699)
    // ========================================================================

    /// Chunk size must be greater than zero
    #[error("Chunk size must be > 0")]
    InvalidChunkSize,

    /// Declared stream size does not match the bytes actually seen
    #[error("Stream size mismatch: declared {declared} bytes, saw {seen}")]
    StreamSizeMismatch {
        /// Size the caller declared up front
        declared: u64,
        /// Bytes that actually flowed through
        seen: u64,
    },

    /// Reassembled attachment does not hash to its content address
    #[error("Content hash mismatch: expected {expected}, got {actual}")]
    ContentHashMismatch {
        /// Hash recorded in the manifest
        expected: String,
        /// Hash of the reassembled bytes
        actual: String,
    },

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Get the numeric error code
    ///
    /// Error codes are organized by category:
    /// - 200-299: Crypto
    /// - 300-399: Storage
    /// - 400-499: Collection
    /// - 500-599: Migration
    /// - 600-699: Chunking
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            // Crypto (200-299)
            Error::EncryptionFailed(_) => 200,
            Error::AuthenticationFailed => 201,
            Error::InvalidCiphertext(_) => 202,
            Error::KeyDerivationFailed(_) => 203,
            Error::InvalidKey(_) => 204,
            Error::MissingSalt => 205,

            // Storage (300-399)
            Error::StorageReadError(_) => 300,
            Error::StorageWriteError(_) => 301,
            Error::StorageCorrupted(_) => 302,

            // Collection (400-499)
            Error::CollectionNotInitialized(_) => 400,
            Error::KindMismatch { .. } => 401,

            // Migration (500-599)
            Error::MigrationFailed { .. } => 500,
            Error::ItemVersionAhead { .. } => 501,

            // Chunking (600-699)
            Error::InvalidChunkSize => 600,
            Error::StreamSizeMismatch { .. } => 601,
            Error::ContentHashMismatch { .. } => 602,

            // Internal (900-999)
            Error::Serialization(_) => 900,
        }
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors can potentially be resolved by retrying.
    /// Crypto failures never are: a failed authentication tag means the
    /// data is gone for that key, not that a retry will help.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::StorageReadError(_) | Error::StorageWriteError(_)
        )
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::StorageReadError(err.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::EncryptionFailed("test".into()).code(), 200);
        assert_eq!(Error::AuthenticationFailed.code(), 201);
        assert_eq!(Error::StorageReadError("test".into()).code(), 300);
        assert_eq!(Error::CollectionNotInitialized("notes".into()).code(), 400);
        assert_eq!(
            Error::MigrationFailed {
                id: "x".into(),
                reason: "y".into()
            }
            .code(),
            500
        );
        assert_eq!(Error::InvalidChunkSize.code(), 600);
        assert_eq!(Error::Serialization("test".into()).code(), 900);
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(Error::StorageReadError("io".into()).is_recoverable());
        assert!(Error::StorageWriteError("io".into()).is_recoverable());
        assert!(!Error::AuthenticationFailed.is_recoverable());
        assert!(!Error::InvalidChunkSize.is_recoverable());
    }

    #[test]
    fn test_size_mismatch_message() {
        let err = Error::StreamSizeMismatch {
            declared: 10,
            seen: 7,
        };
        assert!(err.to_string().contains("declared 10"));
        assert!(err.to_string().contains("saw 7"));
    }
}

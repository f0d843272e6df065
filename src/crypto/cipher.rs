//! # Symmetric Encryption
//!
//! Whole-buffer authenticated encryption with XChaCha20-Poly1305.
//!
//! ## Encryption Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      BUFFER ENCRYPTION FLOW                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Step 1: Obtain a Key                                                  │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  Raw 32 bytes (vault master key or derived subkey)          │       │
//! │  │           — or —                                             │       │
//! │  │  Argon2id(password, salt) → 32 bytes                        │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  Step 2: Generate Nonce (unique per payload)                           │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  Random 24 bytes from CSPRNG                                 │       │
//! │  │  (XChaCha's extended nonce makes random nonces safe)        │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  Step 3: Encrypt                                                       │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  XChaCha20-Poly1305(key, nonce, plaintext)                   │       │
//! │  │           ↓                                                  │       │
//! │  │  Ciphertext + 16-byte Auth Tag                              │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  Output: Cipher { ciphertext, nonce, salt?, format }                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Properties
//!
//! | Property | Guarantee |
//! |----------|-----------|
//! | Confidentiality | Only a holder of the key can read the payload |
//! | Integrity | Any modification is detected at decrypt time |
//! | Fail-closed | Decrypt returns the exact plaintext or an error, never both |

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::ZeroizeOnDrop;

use crate::crypto::kdf;
use crate::error::{Error, Result};

/// Size of the XChaCha20-Poly1305 nonce in bytes (192 bits)
pub const NONCE_SIZE: usize = 24;

/// Size of the Poly1305 authentication tag in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

/// Size of the encryption key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Size of a password-derivation salt in bytes
pub const SALT_SIZE: usize = 16;

/// A nonce (number used once) for XChaCha20-Poly1305
///
/// XChaCha's 192-bit nonce makes random generation safe: collisions are
/// negligible even across billions of payloads under one key.
#[derive(Clone, Copy, Debug)]
pub struct Nonce(pub [u8; NONCE_SIZE]);

impl Nonce {
    /// Generate a cryptographically random nonce
    pub fn random() -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from existing bytes
    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

/// An XChaCha20-Poly1305 encryption key
///
/// Zeroized when dropped.
#[derive(Clone, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; KEY_SIZE]);

impl EncryptionKey {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh random key
    pub fn random() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Derive a key from a password and salt (Argon2id)
    pub fn from_password(password: &str, salt: &[u8; SALT_SIZE]) -> Result<Self> {
        Ok(Self(kdf::derive_key_from_password(password, salt)?))
    }

    /// Get the raw key bytes (for subkey derivation)
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

/// Text encoding of a cipher payload for transport/storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CipherFormat {
    /// Standard base64 (default for persisted payloads)
    Base64,
    /// Lowercase hex
    Hex,
    /// Raw bytes, no text encoding
    Raw,
}

/// An authenticated-encrypted payload bundle
///
/// Carries everything needed to decrypt except the key itself: the
/// ciphertext (with trailing auth tag), the nonce, and — for password-derived
/// keys — the salt the key was derived with. Decryption requires the same
/// key and nonce; any mismatch fails closed with
/// [`Error::AuthenticationFailed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cipher {
    /// Ciphertext with the [`TAG_SIZE`]-byte authentication tag appended
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    /// The nonce used at encryption time (24 bytes)
    #[serde(with = "base64_bytes")]
    pub nonce: Vec<u8>,
    /// Salt for password-derived keys (absent for raw keys)
    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64_bytes_opt")]
    pub salt: Option<Vec<u8>>,
    /// Transport encoding of the ciphertext
    pub format: CipherFormat,
}

impl Cipher {
    /// Encode the ciphertext per this bundle's [`CipherFormat`]
    ///
    /// `Raw` payloads have no text encoding; asking for one is an error.
    pub fn encode_ciphertext(&self) -> Result<String> {
        match self.format {
            CipherFormat::Base64 => {
                use base64::Engine;
                Ok(base64::engine::general_purpose::STANDARD.encode(&self.ciphertext))
            }
            CipherFormat::Hex => Ok(hex::encode(&self.ciphertext)),
            CipherFormat::Raw => Err(Error::InvalidCiphertext(
                "raw ciphertext has no text encoding".into(),
            )),
        }
    }

    /// Decode an encoded ciphertext back to bytes
    pub fn decode_ciphertext(encoded: &str, format: CipherFormat) -> Result<Vec<u8>> {
        match format {
            CipherFormat::Base64 => {
                use base64::Engine;
                base64::engine::general_purpose::STANDARD
                    .decode(encoded)
                    .map_err(|e| Error::InvalidCiphertext(format!("bad base64: {}", e)))
            }
            CipherFormat::Hex => hex::decode(encoded)
                .map_err(|e| Error::InvalidCiphertext(format!("bad hex: {}", e))),
            CipherFormat::Raw => Ok(encoded.as_bytes().to_vec()),
        }
    }
}

/// Encrypt a buffer with XChaCha20-Poly1305
///
/// A fresh random nonce is generated per call. The returned [`Cipher`]
/// carries no salt; use [`encrypt_with_password`] for password-derived keys.
pub fn encrypt(key: &EncryptionKey, plaintext: &[u8], format: CipherFormat) -> Result<Cipher> {
    let nonce = Nonce::random();
    let cipher = XChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|e| Error::EncryptionFailed(format!("Invalid key: {}", e)))?;

    let ciphertext = cipher
        .encrypt(XNonce::from_slice(nonce.as_bytes()), plaintext)
        .map_err(|e| Error::EncryptionFailed(format!("Encryption failed: {}", e)))?;

    Ok(Cipher {
        ciphertext,
        nonce: nonce.as_bytes().to_vec(),
        salt: None,
        format,
    })
}

/// Encrypt a buffer with a password-derived key
///
/// Generates a fresh salt, derives the key with Argon2id, and records the
/// salt in the bundle so [`decrypt_with_password`] can re-derive the key.
pub fn encrypt_with_password(
    password: &str,
    plaintext: &[u8],
    format: CipherFormat,
) -> Result<Cipher> {
    let salt = kdf::generate_salt();
    let key = EncryptionKey::from_password(password, &salt)?;
    let mut bundle = encrypt(&key, plaintext, format)?;
    bundle.salt = Some(salt.to_vec());
    Ok(bundle)
}

/// Decrypt a [`Cipher`] bundle
///
/// ## Errors
///
/// Returns [`Error::AuthenticationFailed`] if the key is wrong, the nonce
/// is wrong, or the ciphertext was tampered with. No partially-decrypted
/// data is ever returned.
pub fn decrypt(key: &EncryptionKey, bundle: &Cipher) -> Result<Vec<u8>> {
    if bundle.nonce.len() != NONCE_SIZE {
        return Err(Error::InvalidCiphertext(format!(
            "nonce must be {} bytes, got {}",
            NONCE_SIZE,
            bundle.nonce.len()
        )));
    }
    if bundle.ciphertext.len() < TAG_SIZE {
        return Err(Error::InvalidCiphertext(format!(
            "ciphertext shorter than the {}-byte tag",
            TAG_SIZE
        )));
    }

    let cipher = XChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|e| Error::InvalidKey(e.to_string()))?;

    cipher
        .decrypt(XNonce::from_slice(&bundle.nonce), bundle.ciphertext.as_ref())
        .map_err(|_| Error::AuthenticationFailed)
}

/// Decrypt a [`Cipher`] bundle produced by [`encrypt_with_password`]
///
/// The bundle must carry the salt the key was derived with.
pub fn decrypt_with_password(password: &str, bundle: &Cipher) -> Result<Vec<u8>> {
    let salt = bundle.salt.as_deref().ok_or(Error::MissingSalt)?;
    let salt: [u8; SALT_SIZE] = salt
        .try_into()
        .map_err(|_| Error::InvalidCiphertext(format!("salt must be {} bytes", SALT_SIZE)))?;

    let key = EncryptionKey::from_password(password, &salt)?;
    decrypt(&key, bundle)
}

// ============================================================================
// SERDE HELPERS
// ============================================================================

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(&encoded).map_err(serde::de::Error::custom)
    }
}

mod base64_bytes_opt {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => serializer.serialize_some(&STANDARD.encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        match encoded {
            Some(s) => STANDARD
                .decode(&s)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let key = EncryptionKey::from_bytes([42u8; KEY_SIZE]);
        let plaintext = b"Hello, Inkhaven!";

        let bundle = encrypt(&key, plaintext, CipherFormat::Base64).unwrap();
        let decrypted = decrypt(&key, &bundle).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_encrypt_decrypt_empty() {
        let key = EncryptionKey::from_bytes([42u8; KEY_SIZE]);

        let bundle = encrypt(&key, b"", CipherFormat::Base64).unwrap();
        let decrypted = decrypt(&key, &bundle).unwrap();

        assert!(decrypted.is_empty());
    }

    #[test]
    fn test_wrong_key_fails_closed() {
        let key = EncryptionKey::from_bytes([42u8; KEY_SIZE]);
        let other = EncryptionKey::from_bytes([99u8; KEY_SIZE]);

        let bundle = encrypt(&key, b"secret", CipherFormat::Base64).unwrap();
        let result = decrypt(&other, &bundle);

        assert!(matches!(result, Err(Error::AuthenticationFailed)));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = EncryptionKey::from_bytes([42u8; KEY_SIZE]);

        let mut bundle = encrypt(&key, b"secret", CipherFormat::Base64).unwrap();
        bundle.ciphertext[0] ^= 0xFF;

        let result = decrypt(&key, &bundle);
        assert!(matches!(result, Err(Error::AuthenticationFailed)));
    }

    #[test]
    fn test_tampered_nonce_fails() {
        let key = EncryptionKey::from_bytes([42u8; KEY_SIZE]);

        let mut bundle = encrypt(&key, b"secret", CipherFormat::Base64).unwrap();
        bundle.nonce[0] ^= 0xFF;

        let result = decrypt(&key, &bundle);
        assert!(matches!(result, Err(Error::AuthenticationFailed)));
    }

    #[test]
    fn test_truncated_ciphertext_rejected() {
        let key = EncryptionKey::from_bytes([42u8; KEY_SIZE]);

        let mut bundle = encrypt(&key, b"secret", CipherFormat::Base64).unwrap();
        bundle.ciphertext.truncate(TAG_SIZE - 1);

        let result = decrypt(&key, &bundle);
        assert!(matches!(result, Err(Error::InvalidCiphertext(_))));
    }

    #[test]
    fn test_different_nonces_per_call() {
        let key = EncryptionKey::from_bytes([42u8; KEY_SIZE]);

        let a = encrypt(&key, b"same plaintext", CipherFormat::Base64).unwrap();
        let b = encrypt(&key, b"same plaintext", CipherFormat::Base64).unwrap();

        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_password_round_trip() {
        let bundle =
            encrypt_with_password("hunter2", b"locked note content", CipherFormat::Base64)
                .unwrap();
        assert!(bundle.salt.is_some());

        let decrypted = decrypt_with_password("hunter2", &bundle).unwrap();
        assert_eq!(decrypted, b"locked note content");
    }

    #[test]
    fn test_wrong_password_fails() {
        let bundle = encrypt_with_password("hunter2", b"secret", CipherFormat::Base64).unwrap();
        let result = decrypt_with_password("*******", &bundle);
        assert!(matches!(result, Err(Error::AuthenticationFailed)));
    }

    #[test]
    fn test_password_decrypt_requires_salt() {
        let key = EncryptionKey::from_bytes([42u8; KEY_SIZE]);
        let bundle = encrypt(&key, b"secret", CipherFormat::Base64).unwrap();

        let result = decrypt_with_password("hunter2", &bundle);
        assert!(matches!(result, Err(Error::MissingSalt)));
    }

    #[test]
    fn test_ciphertext_encodings() {
        let key = EncryptionKey::from_bytes([42u8; KEY_SIZE]);

        let b64 = encrypt(&key, b"payload", CipherFormat::Base64).unwrap();
        let encoded = b64.encode_ciphertext().unwrap();
        assert_eq!(
            Cipher::decode_ciphertext(&encoded, CipherFormat::Base64).unwrap(),
            b64.ciphertext
        );

        let hexed = encrypt(&key, b"payload", CipherFormat::Hex).unwrap();
        let encoded = hexed.encode_ciphertext().unwrap();
        assert_eq!(
            Cipher::decode_ciphertext(&encoded, CipherFormat::Hex).unwrap(),
            hexed.ciphertext
        );

        let raw = encrypt(&key, b"payload", CipherFormat::Raw).unwrap();
        assert!(raw.encode_ciphertext().is_err());
    }

    #[test]
    fn test_cipher_serde_round_trip() {
        let bundle = encrypt_with_password("pw", b"payload", CipherFormat::Base64).unwrap();

        let json = serde_json::to_string(&bundle).unwrap();
        let parsed: Cipher = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, bundle);
        // Bytes travel as base64 strings, not integer arrays
        assert!(!json.contains('['));
    }
}

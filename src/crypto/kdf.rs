//! # Key Derivation
//!
//! Two derivation paths feed the store:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    KEY DERIVATION HIERARCHY                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  User Password ──► Argon2id(password, salt) ──► Vault Master Key       │
//! │                                                      │                  │
//! │            ┌─────────────────────────────────────────┤                  │
//! │            ▼                         ▼               ▼                  │
//! │  HKDF("item-key-v1")    HKDF("attachment-key-v1")   HKDF("history-     │
//! │            │                         │               key-v1")           │
//! │            ▼                         ▼               ▼                  │
//! │     Item Encryption         Attachment Stream    Locked-Session        │
//! │     Key                     Key                  Content Key           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Argon2id is memory-hard, so an attacker with the encrypted store cannot
//! cheaply brute-force the password. HKDF-SHA256 with distinct `info`
//! strings gives each subsystem a cryptographically independent key from
//! the single master key.

use argon2::Argon2;
use hkdf::Hkdf;
use sha2::Sha256;

use crate::crypto::cipher::{KEY_SIZE, SALT_SIZE};
use crate::error::{Error, Result};

/// Domain separation strings for HKDF
///
/// These ensure that keys derived for different purposes are cryptographically
/// independent, even when derived from the same master key.
pub mod domain {
    /// Domain for item-record encryption
    pub const ITEM_KEY: &[u8] = b"inkhaven-item-key-v1";

    /// Domain for attachment stream encryption
    pub const ATTACHMENT_KEY: &[u8] = b"inkhaven-attachment-key-v1";

    /// Domain for locked history-session content encryption
    pub const HISTORY_KEY: &[u8] = b"inkhaven-history-key-v1";
}

/// Generate a fresh random salt for password derivation
pub fn generate_salt() -> [u8; SALT_SIZE] {
    use rand::RngCore;
    let mut salt = [0u8; SALT_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive a 256-bit key from a password and salt with Argon2id
///
/// The same (password, salt) pair always yields the same key; the salt must
/// therefore travel with the ciphertext it protects.
pub fn derive_key_from_password(password: &str, salt: &[u8; SALT_SIZE]) -> Result<[u8; KEY_SIZE]> {
    let mut key = [0u8; KEY_SIZE];
    Argon2::default()
        .hash_password_into(password.as_bytes(), salt, &mut key)
        .map_err(|e| Error::KeyDerivationFailed(format!("Argon2 failed: {}", e)))?;
    Ok(key)
}

/// Derive a purpose-bound subkey from a master key
///
/// Uses HKDF-SHA256 with one of the [`domain`] info strings.
pub fn derive_subkey(master: &[u8; KEY_SIZE], info: &[u8]) -> Result<[u8; KEY_SIZE]> {
    let hkdf = Hkdf::<Sha256>::new(None, master);
    let mut key = [0u8; KEY_SIZE];
    hkdf.expand(info, &mut key)
        .map_err(|_| Error::KeyDerivationFailed("HKDF expansion failed".into()))?;
    Ok(key)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_derivation_deterministic() {
        let salt = [7u8; SALT_SIZE];

        let key1 = derive_key_from_password("correct horse", &salt).unwrap();
        let key2 = derive_key_from_password("correct horse", &salt).unwrap();

        assert_eq!(key1, key2);
    }

    #[test]
    fn test_different_salts_different_keys() {
        let key1 = derive_key_from_password("pw", &[1u8; SALT_SIZE]).unwrap();
        let key2 = derive_key_from_password("pw", &[2u8; SALT_SIZE]).unwrap();

        assert_ne!(key1, key2);
    }

    #[test]
    fn test_different_passwords_different_keys() {
        let salt = [7u8; SALT_SIZE];

        let key1 = derive_key_from_password("pw-one", &salt).unwrap();
        let key2 = derive_key_from_password("pw-two", &salt).unwrap();

        assert_ne!(key1, key2);
    }

    #[test]
    fn test_subkeys_independent_per_domain() {
        let master = [42u8; KEY_SIZE];

        let item = derive_subkey(&master, domain::ITEM_KEY).unwrap();
        let attachment = derive_subkey(&master, domain::ATTACHMENT_KEY).unwrap();
        let history = derive_subkey(&master, domain::HISTORY_KEY).unwrap();

        assert_ne!(item, attachment);
        assert_ne!(attachment, history);
        assert_ne!(item, history);
    }

    #[test]
    fn test_subkey_deterministic() {
        let master = [42u8; KEY_SIZE];

        let key1 = derive_subkey(&master, domain::HISTORY_KEY).unwrap();
        let key2 = derive_subkey(&master, domain::HISTORY_KEY).unwrap();

        assert_eq!(key1, key2);
    }

    #[test]
    fn test_generated_salts_unique() {
        assert_ne!(generate_salt(), generate_salt());
    }
}

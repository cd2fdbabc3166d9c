//! Authenticated encryption of header values at rest.
//!
//! AES-256-GCM with a fresh 96-bit random nonce per call. The stored blob is
//! `hex(nonce || ciphertext || tag)`, so a value can be moved around as text.

use std::sync::Arc;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use secrecy::{ExposeSecret, Secret, SecretString};
use thiserror::Error;

use crate::models::EncryptedValue;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// Failure kinds, kept apart for logs. Callers outside the process only ever
/// see a single "decryption failed" outcome.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("secret key must be 32 bytes of hex, got {0} bytes")]
    InvalidKeyLength(usize),

    #[error("secret key is not valid hex")]
    InvalidKeyEncoding,

    #[error("ciphertext is not valid hex")]
    InvalidEncoding,

    #[error("ciphertext too short: {0} bytes")]
    Truncated(usize),

    #[error("authentication tag mismatch")]
    Authentication,

    #[error("plaintext is not valid UTF-8")]
    InvalidUtf8,

    #[error("encryption failed")]
    Encryption,
}

impl CipherError {
    /// Stable label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CipherError::InvalidKeyLength(_) => "invalid_key_length",
            CipherError::InvalidKeyEncoding => "invalid_key_encoding",
            CipherError::InvalidEncoding => "invalid_encoding",
            CipherError::Truncated(_) => "truncated",
            CipherError::Authentication => "authentication",
            CipherError::InvalidUtf8 => "invalid_utf8",
            CipherError::Encryption => "encryption",
        }
    }
}

/// Process-wide cipher built once from the configured key.
#[derive(Clone)]
pub struct SecretCipher {
    aead: Arc<Aes256Gcm>,
}

impl SecretCipher {
    /// Build from raw key bytes.
    pub fn new(key: &[u8]) -> Result<Self, CipherError> {
        if key.len() != KEY_LEN {
            return Err(CipherError::InvalidKeyLength(key.len()));
        }
        let aead =
            Aes256Gcm::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength(key.len()))?;
        Ok(Self {
            aead: Arc::new(aead),
        })
    }

    /// Build from the hex key held in configuration.
    pub fn from_hex_key(key: &Secret<String>) -> Result<Self, CipherError> {
        let bytes = Secret::new(
            hex::decode(key.expose_secret().trim()).map_err(|_| CipherError::InvalidKeyEncoding)?,
        );
        Self::new(bytes.expose_secret())
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<EncryptedValue, CipherError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = self
            .aead
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CipherError::Encryption)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + sealed.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&sealed);
        Ok(EncryptedValue::from_stored(hex::encode(blob)))
    }

    pub fn decrypt(&self, value: &EncryptedValue) -> Result<SecretString, CipherError> {
        let blob = hex::decode(value.as_str()).map_err(|_| CipherError::InvalidEncoding)?;
        if blob.len() < NONCE_LEN + TAG_LEN {
            return Err(CipherError::Truncated(blob.len()));
        }

        let (nonce, sealed) = blob.split_at(NONCE_LEN);
        let opened = self
            .aead
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CipherError::Authentication)?;

        String::from_utf8(opened)
            .map(Secret::new)
            .map_err(|_| CipherError::InvalidUtf8)
    }
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretCipher(AES-256-GCM)")
    }
}

/// Fresh key for `SECRET_KEY`, hex-encoded.
pub fn generate_key_hex() -> String {
    let mut key = [0u8; KEY_LEN];
    rand::rngs::OsRng.fill_bytes(&mut key);
    hex::encode(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> SecretCipher {
        SecretCipher::new(&[7u8; KEY_LEN]).unwrap()
    }

    #[test]
    fn round_trips_plaintext() {
        let cipher = cipher();
        let sealed = cipher.encrypt("secret-token").unwrap();
        assert_eq!(cipher.decrypt(&sealed).unwrap().expose_secret(), "secret-token");
    }

    #[test]
    fn round_trips_empty_and_unicode() {
        let cipher = cipher();
        for value in ["", "Bearer ключ-🔑"] {
            let sealed = cipher.encrypt(value).unwrap();
            assert_eq!(cipher.decrypt(&sealed).unwrap().expose_secret(), value);
        }
    }

    #[test]
    fn same_plaintext_encrypts_differently() {
        let cipher = cipher();
        let a = cipher.encrypt("secret-token").unwrap();
        let b = cipher.encrypt("secret-token").unwrap();
        assert_ne!(a, b);
        assert_ne!(&a.as_str()[..NONCE_LEN * 2], &b.as_str()[..NONCE_LEN * 2]);
    }

    #[test]
    fn blob_never_contains_plaintext() {
        let sealed = cipher().encrypt("secret-token").unwrap();
        assert!(!sealed.as_str().contains("secret-token"));
        assert!(!sealed.as_str().contains(&hex::encode("secret-token")));
    }

    #[test]
    fn tampered_blob_fails_authentication() {
        let cipher = cipher();
        let sealed = cipher.encrypt("secret-token").unwrap();

        let mut bytes = hex::decode(sealed.as_str()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = EncryptedValue::from_stored(hex::encode(&bytes));

        assert_eq!(cipher.decrypt(&tampered).unwrap_err(), CipherError::Authentication);

        let mut bytes = hex::decode(sealed.as_str()).unwrap();
        bytes[NONCE_LEN] ^= 0x80;
        let tampered = EncryptedValue::from_stored(hex::encode(&bytes));
        assert_eq!(cipher.decrypt(&tampered).unwrap_err(), CipherError::Authentication);
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let sealed = cipher().encrypt("secret-token").unwrap();
        let other = SecretCipher::new(&[8u8; KEY_LEN]).unwrap();
        assert_eq!(other.decrypt(&sealed).unwrap_err(), CipherError::Authentication);
    }

    #[test]
    fn short_blob_is_rejected() {
        let short = EncryptedValue::from_stored(hex::encode([0u8; NONCE_LEN]));
        assert_eq!(cipher().decrypt(&short).unwrap_err(), CipherError::Truncated(NONCE_LEN));
    }

    #[test]
    fn non_hex_blob_is_rejected() {
        let junk = EncryptedValue::from_stored("not-hex".to_string());
        assert_eq!(cipher().decrypt(&junk).unwrap_err(), CipherError::InvalidEncoding);
    }

    #[test]
    fn key_must_be_32_bytes_of_hex() {
        let short = Secret::new(hex::encode([1u8; 16]));
        assert_eq!(
            SecretCipher::from_hex_key(&short).unwrap_err(),
            CipherError::InvalidKeyLength(16)
        );

        let junk = Secret::new("zz".repeat(32));
        assert_eq!(
            SecretCipher::from_hex_key(&junk).unwrap_err(),
            CipherError::InvalidKeyEncoding
        );

        assert!(SecretCipher::from_hex_key(&Secret::new(generate_key_hex())).is_ok());
    }

    #[test]
    fn generated_keys_are_distinct() {
        let a = generate_key_hex();
        assert_eq!(a.len(), KEY_LEN * 2);
        assert_ne!(a, generate_key_hex());
    }
}

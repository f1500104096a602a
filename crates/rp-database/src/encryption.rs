// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Field-level encryption at rest.
//!
//! Sensitive document fields are sealed with XChaCha20-Poly1305 before they
//! reach the store. A sealed value is `nonce (24 bytes) || ciphertext`, kept
//! in the document as standard base64.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};

use crate::error::{DatabaseError, Result};

/// Key length in bytes.
pub const KEY_LEN: usize = 32;

const NONCE_LEN: usize = 24;

/// Symmetric AEAD used to seal sensitive fields.
#[derive(Clone)]
pub struct Cipher {
    aead: XChaCha20Poly1305,
}

impl fmt::Debug for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cipher").finish_non_exhaustive()
    }
}

impl Cipher {
    /// Create a cipher from a raw 32-byte key.
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() != KEY_LEN {
            return Err(DatabaseError::Encryption(format!(
                "key must be {} bytes, got {}",
                KEY_LEN,
                key.len()
            )));
        }

        let aead = XChaCha20Poly1305::new_from_slice(key)
            .map_err(|_| DatabaseError::Encryption("invalid key".to_string()))?;

        Ok(Self { aead })
    }

    /// Create a cipher from a base64-encoded 32-byte key.
    pub fn from_base64(key: &str) -> Result<Self> {
        let key = STANDARD
            .decode(key.trim())
            .map_err(|e| DatabaseError::Encryption(format!("key is not valid base64: {}", e)))?;
        Self::new(&key)
    }

    /// Generate a fresh random key.
    pub fn generate_key() -> Vec<u8> {
        XChaCha20Poly1305::generate_key(&mut OsRng).to_vec()
    }

    /// Cipher over a freshly generated key.
    pub fn generate() -> Self {
        let aead = XChaCha20Poly1305::new(&XChaCha20Poly1305::generate_key(&mut OsRng));
        Self { aead }
    }

    /// Encrypt `plaintext` under a random nonce.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .aead
            .encrypt(&nonce, plaintext)
            .map_err(|_| DatabaseError::Encryption("seal failed".to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Decrypt a value produced by [`Cipher::seal`].
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < NONCE_LEN {
            return Err(DatabaseError::Encryption(
                "sealed value is shorter than a nonce".to_string(),
            ));
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        self.aead
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| DatabaseError::Encryption("open failed".to_string()))
    }

    /// Seal a string and encode the result as base64.
    pub fn seal_string(&self, plaintext: &str) -> Result<String> {
        Ok(STANDARD.encode(self.seal(plaintext.as_bytes())?))
    }

    /// Reverse of [`Cipher::seal_string`].
    pub fn open_string(&self, sealed: &str) -> Result<String> {
        let raw = STANDARD
            .decode(sealed)
            .map_err(|e| DatabaseError::Encryption(format!("sealed value is not base64: {}", e)))?;
        let plaintext = self.open(&raw)?;
        String::from_utf8(plaintext)
            .map_err(|e| DatabaseError::Encryption(format!("plaintext is not UTF-8: {}", e)))
    }
}

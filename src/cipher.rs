//! AES-256-GCM with per-instance nonce management
//!
//! Sealed output is `nonce(12) || ciphertext || tag(16)`.
//!
//! Nonces: the first encryption under a key draws all 12 bytes from the OS
//! random source. Every later encryption through the same instance treats
//! the trailing 8 bytes as a big-endian counter and increments it, and
//! redraws the leading 4 bytes, since a store file restored from a backup
//! replays an old counter under the same key.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use tracing::trace;

use crate::error::{ErrorCategory, ErrorKind, PassmgrError, Result};
use crate::kdf::{self, DerivedKey};

/// Length of nonce in bytes
pub const NONCE_LEN: usize = 12;

/// Length of the GCM authentication tag in bytes
pub const TAG_LEN: usize = 16;

/// Bytes of the nonce that are redrawn on every increment
const NONCE_RANDOM_LEN: usize = 4;

type NonceBytes = [u8; NONCE_LEN];

/// Authenticated cipher bound to a single derived key.
///
/// A new key always means a new `GcmCipher`; nonce state is never carried
/// across keys.
pub struct GcmCipher {
    aead: Aes256Gcm,
    nonce: Option<NonceBytes>,
}

impl GcmCipher {
    pub fn new(key: &DerivedKey) -> Self {
        let key: &[u8] = key.as_slice();
        Self {
            aead: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
            nonce: None,
        }
    }

    /// Seal `plaintext` under a fresh nonce, returning `nonce || ciphertext || tag`.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = self.next_nonce()?;
        trace!(plaintext_len = plaintext.len(), "encrypting");

        let sealed = self
            .aead
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| {
                PassmgrError::with_kind(
                    ErrorCategory::Internal,
                    ErrorKind::InternalInvariant,
                    "encryption failed",
                )
            })?;

        let mut output = Vec::with_capacity(NONCE_LEN + sealed.len());
        output.extend_from_slice(&nonce);
        output.extend_from_slice(&sealed);
        Ok(output)
    }

    /// Open `nonce || ciphertext || tag`.
    ///
    /// The nonce is taken from the input; the instance's own nonce state is
    /// neither consulted nor updated.
    pub fn decrypt(&self, input: &[u8]) -> Result<Vec<u8>> {
        if input.len() < NONCE_LEN {
            return Err(PassmgrError::with_kind(
                ErrorCategory::User,
                ErrorKind::CiphertextTooShort,
                "ciphertext too short",
            ));
        }
        let (nonce, sealed) = input.split_at(NONCE_LEN);
        trace!(ciphertext_len = sealed.len(), "decrypting");

        self.aead
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| {
                PassmgrError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::AuthenticationFailed,
                    "corrupt input, tampered-with data, or bad passphrase",
                )
            })
    }

    fn next_nonce(&mut self) -> Result<NonceBytes> {
        let nonce = match self.nonce {
            None => {
                let mut fresh = [0u8; NONCE_LEN];
                kdf::fill_random(&mut fresh)?;
                fresh
            }
            Some(mut prev) => {
                increment_counter(&mut prev);
                kdf::fill_random(&mut prev[..NONCE_RANDOM_LEN])?;
                prev
            }
        };
        self.nonce = Some(nonce);
        Ok(nonce)
    }
}

fn increment_counter(nonce: &mut NonceBytes) {
    let mut counter = [0u8; NONCE_LEN - NONCE_RANDOM_LEN];
    counter.copy_from_slice(&nonce[NONCE_RANDOM_LEN..]);
    let next = u64::from_be_bytes(counter).wrapping_add(1);
    nonce[NONCE_RANDOM_LEN..].copy_from_slice(&next.to_be_bytes());
}

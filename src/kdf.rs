//! Passphrase-based key derivation using scrypt
//!
//! The cost parameters are fixed by the passmgr1 file format; changing them
//! would make every existing store unreadable.

use rand::RngCore;
use rand::rngs::OsRng;
use scrypt::{Params, scrypt};
use tracing::trace;
use zeroize::Zeroizing;

use crate::error::{ErrorCategory, ErrorKind, PassmgrError, Result};

/// Length of salt in bytes
pub const SALT_LEN: usize = 32;

/// Length of derived key in bytes (AES-256)
pub const KEY_LEN: usize = 32;

/// scrypt N parameter (CPU/memory cost)
const SCRYPT_N: u32 = 32768;

/// scrypt r parameter (block size)
const SCRYPT_R: u32 = 8;

/// scrypt p parameter (parallelization)
const SCRYPT_P: u32 = 4;

pub type Salt = [u8; SALT_LEN];

/// A derived symmetric key, wiped from memory on drop.
pub type DerivedKey = Zeroizing<[u8; KEY_LEN]>;

/// Derive a 32-byte key from a passphrase and salt using scrypt.
///
/// Deterministic, and slow on purpose: one call takes on the order of
/// hundreds of milliseconds.
pub fn derive_key(passphrase: &[u8], salt: &Salt) -> Result<DerivedKey> {
    let params = Params::new(SCRYPT_N.ilog2() as u8, SCRYPT_R, SCRYPT_P, KEY_LEN).map_err(|e| {
        PassmgrError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::KeyDerivation,
            "failed to create scrypt params",
            e,
        )
    })?;

    trace!("deriving key");
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    scrypt(passphrase, salt, &params, key.as_mut_slice()).map_err(|e| {
        PassmgrError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::KeyDerivation,
            "scrypt key derivation failed",
            e,
        )
    })?;

    Ok(key)
}

/// Generate a fresh random salt for a new store or a key rotation.
pub fn gen_salt() -> Result<Salt> {
    let mut salt = [0u8; SALT_LEN];
    fill_random(&mut salt)?;
    trace!("generated new salt");
    Ok(salt)
}

/// Fill `buf` from the operating system's CSPRNG.
pub(crate) fn fill_random(buf: &mut [u8]) -> Result<()> {
    OsRng.try_fill_bytes(buf).map_err(|e| {
        PassmgrError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::RandomnessUnavailable,
            "failed to read from the system random source",
            e,
        )
    })
}

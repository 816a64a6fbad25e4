//! passmgr - a single-user credential store sealed into one encrypted file
//!
//! Subjects (credential records keyed by user and URL) live in memory as a
//! [`Store`]. [`FileStore`] persists them as JSON sealed with AES-256-GCM
//! under a key derived from the master passphrase with scrypt.

#![forbid(unsafe_code)]

pub mod cipher;
pub mod commands;
pub mod error;
pub mod file_store;
pub mod import;
pub mod kdf;
pub mod passphrase;
pub mod store;
pub mod subject;

pub use error::{ErrorCategory, ErrorKind, PassmgrError, Result};
pub use file_store::FileStore;
pub use store::{MemoryStore, Store};
pub use subject::{Subject, SubjectId};

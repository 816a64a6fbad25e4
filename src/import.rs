//! Bulk import of plaintext subject dumps
//!
//! The input is a JSON array of `{"User": ..., "URL": ..., "Secrets": {...}}`
//! objects, the same shape the store encrypts.

use std::fs;
use std::path::Path;

use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{ErrorCategory, ErrorKind, PassmgrError, Result};
use crate::store::Store;
use crate::subject::Subject;

/// Parse a JSON subject array.
pub fn parse_subjects(json: &[u8]) -> Result<Vec<Subject>> {
    serde_json::from_slice(json).map_err(|e| {
        PassmgrError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::ImportInvalid,
            format!("import data is not a JSON array of subjects: {}", e),
            e,
        )
    })
}

/// Read and parse a JSON subject array from `path`.
pub fn read_subjects(path: &Path) -> Result<Vec<Subject>> {
    let content = Zeroizing::new(fs::read(path).map_err(|e| {
        PassmgrError::io(
            ErrorCategory::User,
            format!("failed to read from {}", path.display()),
            e,
        )
    })?);
    let subjects = parse_subjects(&content)?;
    debug!(path = %path.display(), subjects = subjects.len(), "parsed import file");
    Ok(subjects)
}

/// Upsert every subject into `store`, returning how many were applied.
///
/// Subjects sharing an identity collapse into the last one given.
pub fn import_into(store: &mut dyn Store, subjects: Vec<Subject>) -> usize {
    let count = subjects.len();
    for subject in subjects {
        store.store(subject);
    }
    count
}

//! Command implementations behind the `passmgr` binary
//!
//! Every command opens the store, applies one change or query and, when
//! something changed, persists before returning.

use std::io::Write;
use std::path::Path;

use tracing::info;

use crate::error::{ErrorCategory, ErrorKind, PassmgrError, Result};
use crate::file_store::FileStore;
use crate::import;
use crate::passphrase::{PassphraseReader, read_confirmed};
use crate::store::Store;
use crate::subject::{Subject, SubjectId};

/// Secret name used when none is given.
pub const DEFAULT_SECRET_NAME: &str = "passphrase";

/// Create a new, empty store file.
pub fn init(path: &Path, reader: &mut dyn PassphraseReader, out: &mut dyn Write) -> Result<()> {
    if path.exists() {
        return Err(PassmgrError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidInput,
            format!("{} already exists", path.display()),
        ));
    }
    let mut store = create_new(path, reader)?;
    store.persist()?;
    info!(path = %path.display(), "initialized store");
    emit(out, format_args!("Initialized {}", path.display()))
}

/// Print the identities in the store, optionally filtered by a substring
/// of user or URL.
pub fn list(
    path: &Path,
    reader: &mut dyn PassphraseReader,
    filter: Option<&str>,
    out: &mut dyn Write,
) -> Result<()> {
    let store = open_existing(path, reader)?;
    let ids = store.list();
    if ids.is_empty() {
        return emit(out, format_args!("-- store is empty --"));
    }

    let filter = filter.unwrap_or("");
    let rows: Vec<(String, &SubjectId)> = ids
        .iter()
        .enumerate()
        .filter(|(_, id)| id.user.contains(filter) || id.url.contains(filter))
        .map(|(i, id)| (format!("{})", i + 1), id))
        .collect();

    let n_width = rows.iter().map(|(n, _)| n.len()).max().unwrap_or(0).max("n)".len());
    let user_width = rows
        .iter()
        .map(|(_, id)| id.user.chars().count())
        .max()
        .unwrap_or(0)
        .max("User".len());

    emit(
        out,
        format_args!("{:<n_width$}   {:<user_width$}   URL", "n)", "User"),
    )?;
    for (n, id) in rows {
        emit(
            out,
            format_args!("{:<n_width$}   {:<user_width$}   {}", n, id.user, id.url),
        )?;
    }
    Ok(())
}

/// Print one named secret of a subject.
pub fn show(
    path: &Path,
    reader: &mut dyn PassphraseReader,
    id: &SubjectId,
    name: &str,
    out: &mut dyn Write,
) -> Result<()> {
    let store = open_existing(path, reader)?;
    let subject = store.load(id).ok_or_else(|| not_found(id))?;
    let secret = subject.secret(name).ok_or_else(|| {
        PassmgrError::with_kind(
            ErrorCategory::User,
            ErrorKind::NotFound,
            format!("{} | {} has no secret named '{}'", id.user, id.url, name),
        )
    })?;
    emit(out, format_args!("{}", secret))
}

/// Set one named secret of a subject, creating the subject (and the store)
/// as needed.
pub fn add(
    path: &Path,
    reader: &mut dyn PassphraseReader,
    id: &SubjectId,
    name: &str,
    out: &mut dyn Write,
) -> Result<()> {
    let mut store = if path.exists() {
        open_existing(path, reader)?
    } else {
        create_new(path, reader)?
    };

    let value = reader.read_passphrase(&format!("{} for {} | {}: ", name, id.user, id.url))?;
    let value = String::from_utf8(value.to_vec()).map_err(|e| {
        PassmgrError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::InvalidInput,
            "secret values must be valid UTF-8",
            e,
        )
    })?;

    let subject = store
        .load(id)
        .unwrap_or_else(|| Subject::new(id.clone()))
        .with_secret(name, value);
    store.store(subject);
    store.persist()?;
    info!(user = %id.user, url = %id.url, secret = name, "stored secret");
    emit(out, format_args!("OK"))
}

/// Remove a subject and all its secrets.
pub fn delete(
    path: &Path,
    reader: &mut dyn PassphraseReader,
    id: &SubjectId,
    out: &mut dyn Write,
) -> Result<()> {
    let mut store = open_existing(path, reader)?;
    if !store.delete(id) {
        return Err(not_found(id));
    }
    store.persist()?;
    info!(user = %id.user, url = %id.url, "deleted subject");
    emit(out, format_args!("Deleted {} | {}", id.user, id.url))
}

/// Upsert every subject from a plaintext JSON dump.
pub fn import(
    path: &Path,
    reader: &mut dyn PassphraseReader,
    source: &Path,
    out: &mut dyn Write,
) -> Result<()> {
    let subjects = import::read_subjects(source)?;
    let mut store = if path.exists() {
        open_existing(path, reader)?
    } else {
        create_new(path, reader)?
    };
    let count = import::import_into(&mut store, subjects);
    store.persist()?;
    info!(count, source = %source.display(), "imported subjects");
    emit(out, format_args!("Imported {} subjects", count))
}

/// Re-encrypt the store under a new master passphrase.
pub fn passwd(path: &Path, reader: &mut dyn PassphraseReader, out: &mut dyn Write) -> Result<()> {
    let mut store = open_existing(path, reader)?;
    let new_passphrase = read_confirmed(
        reader,
        &format!("[passmgr] new master passphrase for {}: ", path.display()),
        &format!("[passmgr] retype new master passphrase for {}: ", path.display()),
    )?;
    store.change_key(&new_passphrase)?;
    store.persist()?;
    info!(path = %path.display(), "master passphrase changed");
    emit(out, format_args!("Master passphrase changed"))
}

fn open_existing(path: &Path, reader: &mut dyn PassphraseReader) -> Result<FileStore> {
    if !path.is_file() {
        return Err(PassmgrError::with_kind(
            ErrorCategory::User,
            ErrorKind::NotFound,
            format!(
                "the passmgr store {} does not exist yet; run `passmgr init` first",
                path.display()
            ),
        ));
    }
    let passphrase =
        reader.read_passphrase(&format!("[passmgr] master passphrase for {}: ", path.display()))?;
    FileStore::open(path, &passphrase)
        .map_err(|e| e.with_context(format!("failed to open {}", path.display())))
}

fn create_new(path: &Path, reader: &mut dyn PassphraseReader) -> Result<FileStore> {
    let passphrase = read_confirmed(
        reader,
        &format!("[passmgr] new master passphrase for {}: ", path.display()),
        &format!("[passmgr] retype master passphrase for {}: ", path.display()),
    )?;
    FileStore::open(path, &passphrase)
}

fn not_found(id: &SubjectId) -> PassmgrError {
    PassmgrError::with_kind(
        ErrorCategory::User,
        ErrorKind::NotFound,
        format!("no entry for {} | {}", id.user, id.url),
    )
}

fn emit(out: &mut dyn Write, line: std::fmt::Arguments<'_>) -> Result<()> {
    writeln!(out, "{}", line)
        .map_err(|e| PassmgrError::io(ErrorCategory::Internal, "failed to write output", e))
}

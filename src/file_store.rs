//! Encrypted single-file store
//!
//! File layout (passmgr1):
//!
//! ```text
//!  0      7 8                             39 40        51 52           n
//! +--------+--------------------------------+------------+-----    -----+
//! |passmgr1|              salt              |   nonce    |  ciphertext  |
//! +--------+--------------------------------+------------+-----    -----+
//! ```
//!
//! - magic: `70 61 73 73 6d 67 72 01`
//! - salt: 32 bytes of scrypt salt, fixed until the passphrase changes
//! - nonce: 12 byte AES-GCM nonce, fresh on every write
//! - ciphertext: AES-256-GCM sealed JSON array of subjects, tag appended
//!
//! A file holding only `magic || salt` is an initialized but empty store.

use std::fmt;
use std::fs::{self, File, Metadata};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use zeroize::Zeroizing;

use crate::cipher::GcmCipher;
use crate::error::{ErrorCategory, ErrorKind, PassmgrError, Result};
use crate::kdf::{self, SALT_LEN, Salt};
use crate::store::{MemoryStore, Store};
use crate::subject::{Subject, SubjectId};

/// Magic number identifying the file format and its version.
pub const MAGIC: [u8; 8] = *b"passmgr\x01";

/// File name used when the configured store path is a directory.
pub const STORE_FILE_NAME: &str = ".passmgr_store";

const HEADER_LEN: usize = MAGIC.len() + SALT_LEN;

/// A [`Store`] whose contents are sealed into a single file.
///
/// The in-memory subjects and the file are not kept in sync; call
/// [`Store::persist`] to write changes.
pub struct FileStore {
    path: PathBuf,
    salt: Salt,
    cipher: GcmCipher,
    records: MemoryStore,
}

impl FileStore {
    /// Open the store at `path`, or start a new empty one if the file does not exist.
    ///
    /// A new store is not written until the first [`Store::persist`].
    pub fn open(path: impl Into<PathBuf>, passphrase: &[u8]) -> Result<Self> {
        let path = path.into();

        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "store file absent, starting new store");
                let salt = kdf::gen_salt()?;
                let key = kdf::derive_key(passphrase, &salt)?;
                return Ok(Self {
                    path,
                    salt,
                    cipher: GcmCipher::new(&key),
                    records: MemoryStore::new(),
                });
            }
            Err(e) => {
                return Err(PassmgrError::io(
                    ErrorCategory::Internal,
                    format!("failed to stat {}", path.display()),
                    e,
                ));
            }
        };
        check_permissions(&path, &metadata)?;

        let content = fs::read(&path).map_err(|e| {
            PassmgrError::io(
                ErrorCategory::Internal,
                format!("failed to read from {}", path.display()),
                e,
            )
        })?;
        debug!(path = %path.display(), len = content.len(), "opening store");

        let (salt, sealed) = split_header(&content)?;
        let key = kdf::derive_key(passphrase, &salt)?;
        let cipher = GcmCipher::new(&key);

        let records = if sealed.is_empty() {
            debug!("store file holds no ciphertext yet");
            MemoryStore::new()
        } else {
            let plaintext = Zeroizing::new(cipher.decrypt(sealed)?);
            MemoryStore::from_subjects(decode_subjects(&plaintext)?)
        };

        Ok(Self {
            path,
            salt,
            cipher,
            records,
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rebind the store to a new passphrase under a freshly generated salt.
    ///
    /// The file on disk keeps the old passphrase until the next persist.
    pub fn change_key(&mut self, new_passphrase: &[u8]) -> Result<()> {
        let salt = kdf::gen_salt()?;
        let key = kdf::derive_key(new_passphrase, &salt)?;
        self.salt = salt;
        self.cipher = GcmCipher::new(&key);
        debug!(path = %self.path.display(), "master key changed");
        Ok(())
    }

    /// Build the complete file contents for the current subjects.
    fn seal(&mut self) -> Result<Vec<u8>> {
        let plaintext = Zeroizing::new(serde_json::to_vec(self.records.subjects()).map_err(|e| {
            PassmgrError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::InternalInvariant,
                "failed to serialize subjects",
                e,
            )
        })?);
        let sealed = self.cipher.encrypt(&plaintext)?;

        let mut envelope = Vec::with_capacity(HEADER_LEN + sealed.len());
        envelope.extend_from_slice(&MAGIC);
        envelope.extend_from_slice(&self.salt);
        envelope.extend_from_slice(&sealed);
        Ok(envelope)
    }
}

impl Store for FileStore {
    fn list(&self) -> Vec<SubjectId> {
        self.records.list()
    }

    fn load(&self, id: &SubjectId) -> Option<Subject> {
        self.records.load(id)
    }

    fn store(&mut self, subject: Subject) {
        self.records.store(subject)
    }

    fn delete(&mut self, id: &SubjectId) -> bool {
        self.records.delete(id)
    }

    fn persist(&mut self) -> Result<()> {
        let envelope = self.seal()?;
        write_atomically(&self.path, |file| file.write_all(&envelope))?;
        debug!(
            path = %self.path.display(),
            subjects = self.records.len(),
            "persisted store"
        );
        Ok(())
    }
}

impl fmt::Debug for FileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStore")
            .field("path", &self.path)
            .field("subjects", &self.records.len())
            .finish_non_exhaustive()
    }
}

/// Resolve a configured store location: directories get the default file name.
pub fn resolve_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(STORE_FILE_NAME)
    } else {
        path.to_path_buf()
    }
}

fn split_header(content: &[u8]) -> Result<(Salt, &[u8])> {
    let Some(rest) = content.strip_prefix(&MAGIC[..]) else {
        return Err(PassmgrError::with_kind(
            ErrorCategory::User,
            ErrorKind::UnknownFormat,
            "unknown file type",
        ));
    };
    if rest.len() < SALT_LEN {
        return Err(PassmgrError::with_kind(
            ErrorCategory::User,
            ErrorKind::TruncatedInput,
            "input likely truncated while reading salt",
        ));
    }
    let (salt, sealed) = rest.split_at(SALT_LEN);
    let mut out = [0u8; SALT_LEN];
    out.copy_from_slice(salt);
    Ok((out, sealed))
}

fn decode_subjects(plaintext: &[u8]) -> Result<Vec<Subject>> {
    // Older stores wrote `null` for an empty subject list.
    let subjects: Option<Vec<Subject>> = serde_json::from_slice(plaintext).map_err(|e| {
        PassmgrError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::MalformedContent,
            "decrypted store content is not a valid subject list",
            e,
        )
    })?;
    Ok(subjects.unwrap_or_default())
}

#[cfg(unix)]
fn check_permissions(path: &Path, metadata: &Metadata) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = metadata.permissions().mode() & 0o777;
    if mode & 0o077 != 0 {
        return Err(PassmgrError::with_kind(
            ErrorCategory::User,
            ErrorKind::PermissionPolicy,
            format!(
                "{} is accessible by other users (mode {:o}); restrict it with chmod 600",
                path.display(),
                mode
            ),
        ));
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_permissions(_path: &Path, _metadata: &Metadata) -> Result<()> {
    Ok(())
}

/// Replace `path` with whatever `write` produces, atomically.
///
/// Contents go to a temporary file in the same directory which is flushed,
/// fsynced and restricted to the owner before being renamed over `path`.
/// If anything fails the temporary file is removed and `path` is untouched.
fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp_file = tempfile::Builder::new()
        .prefix(".passmgr-")
        .tempfile_in(dir)
        .map_err(|e| PassmgrError::io(ErrorCategory::Internal, "failed to create tempfile", e))?;

    write(temp_file.as_file_mut())
        .map_err(|e| PassmgrError::io(ErrorCategory::Internal, "failed to write to tempfile", e))?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file
        .flush()
        .map_err(|e| PassmgrError::io(ErrorCategory::Internal, "failed to flush tempfile", e))?;
    temp_file.as_file().sync_all().map_err(|e| {
        PassmgrError::io(
            ErrorCategory::Internal,
            "failed to sync file prior to rename",
            e,
        )
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp_file
            .as_file()
            .set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| {
                PassmgrError::io(
                    ErrorCategory::Internal,
                    "failed to set tempfile permissions",
                    e,
                )
            })?;
    }

    temp_file.persist(path).map_err(|e| {
        PassmgrError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to rename to target file {}", path.display()),
            e,
        )
    })?;
    Ok(())
}

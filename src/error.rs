use std::error::Error as StdError;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    ///
    /// In particular this means that use of Internal is never a guarantee
    /// the error is not, for example due to a user error - merely that it
    /// cannot be confidently determined by the code.
    Internal,

    /// The user provided invalid input or performed an action that is
    /// unsupported or impossible to complete.
    User,
}

/// Fine-grained condition flags for consumers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The file does not start with the passmgr magic number, or carries a
    /// format version we do not support.
    UnknownFormat,
    /// The file ended before the salt could be read.
    TruncatedInput,
    /// Sealed data is shorter than the nonce that must prefix it.
    CiphertextTooShort,
    /// Authentication failed due to an incorrect passphrase or tampering
    /// or corruption. The two cases are deliberately indistinguishable.
    AuthenticationFailed,
    /// Decryption succeeded but the plaintext is not a valid subject list.
    MalformedContent,
    /// The store file is readable or writable by someone other than its owner.
    PermissionPolicy,
    /// Low-level scrypt key derivation failed.
    KeyDerivation,
    /// The operating system random source failed.
    RandomnessUnavailable,
    /// Passphrase could not be obtained from the configured reader.
    PassphraseUnavailable,
    /// A bulk import file is not a JSON array of subjects.
    ImportInvalid,
    /// No subject (or secret) matched the requested identity.
    NotFound,
    /// The request conflicts with the current state, e.g. mismatched
    /// passphrase confirmation or initializing an existing store.
    InvalidInput,
    /// Unexpected state reached within passmgr logic.
    InternalInvariant,
    /// Interaction with the filesystem, stdin/stdout, or other I/O failed.
    Io,
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct PassmgrError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional specific condition tag for consumers that need to
    /// branch their behavior. Any code consuming errors MUST handle
    /// the absence of a defined kind.
    pub kind: Option<ErrorKind>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl PassmgrError {
    /// Creates a new error with a required category and display message.
    pub fn new(category: ErrorCategory, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: None,
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that also tags the failure with a kind.
    pub fn with_kind(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// Shorthand for filesystem and stream failures.
    pub(crate) fn io(category: ErrorCategory, msg: impl Into<String>, err: std::io::Error) -> Self {
        Self::with_kind_and_source(category, ErrorKind::Io, msg, err)
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// True when the error carries the given kind tag.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == Some(kind)
    }

    /// Wraps the current error with a higher-level message while preserving the original as source.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let category = self.category;
        let kind = self.kind;
        Self {
            category,
            kind,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, PassmgrError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn context_keeps_kind_and_category() {
        let err = PassmgrError::with_kind(
            ErrorCategory::User,
            ErrorKind::AuthenticationFailed,
            "bad passphrase",
        )
        .with_context("failed to open store");

        assert_eq!(err.category, ErrorCategory::User);
        assert!(err.is(ErrorKind::AuthenticationFailed));
        assert_eq!(err.message(), "failed to open store");
        assert_eq!(err.source().unwrap().to_string(), "bad passphrase");
    }

    #[test]
    fn plain_error_has_no_kind() {
        let err = PassmgrError::new(ErrorCategory::Internal, "boom");
        assert_eq!(err.kind, None);
        assert!(err.source().is_none());
    }
}

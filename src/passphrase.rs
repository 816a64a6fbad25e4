//! Passphrase reading functionality

use crate::error::{ErrorCategory, ErrorKind, PassmgrError, Result};
use std::io::{self, BufRead, IsTerminal};
use zeroize::Zeroizing;

/// Trait for reading passphrases and secret values from various sources
pub trait PassphraseReader {
    /// Read one passphrase as arbitrary bytes (not necessarily UTF-8).
    ///
    /// `prompt` describes what is being asked for; readers that do not
    /// interact with a user ignore it. Returns the passphrase wrapped in
    /// `Zeroizing` to ensure it is securely wiped from memory when dropped.
    fn read_passphrase(&mut self, prompt: &str) -> Result<Zeroizing<Vec<u8>>>;
}

/// Returns a fixed passphrase (for testing)
pub struct ConstantPassphraseReader {
    passphrase: Zeroizing<Vec<u8>>,
}

impl ConstantPassphraseReader {
    pub fn new(passphrase: Vec<u8>) -> Self {
        Self {
            passphrase: Zeroizing::new(passphrase),
        }
    }
}

impl PassphraseReader for ConstantPassphraseReader {
    fn read_passphrase(&mut self, _prompt: &str) -> Result<Zeroizing<Vec<u8>>> {
        Ok(Zeroizing::new((*self.passphrase).clone()))
    }
}

/// Reads one line per request from any buffered source, e.g. stdin.
///
/// The trailing line terminator (`\n` or `\r\n`) is stripped.
pub struct LinePassphraseReader {
    reader: Box<dyn BufRead>,
}

impl LinePassphraseReader {
    pub fn new(reader: Box<dyn BufRead>) -> Self {
        Self { reader }
    }
}

impl PassphraseReader for LinePassphraseReader {
    fn read_passphrase(&mut self, prompt: &str) -> Result<Zeroizing<Vec<u8>>> {
        let mut line = Zeroizing::new(Vec::new());
        let n = self.reader.read_until(b'\n', &mut line).map_err(|e| {
            PassmgrError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("error reading passphrase: {}", e),
                e,
            )
        })?;
        if n == 0 {
            return Err(PassmgrError::with_kind(
                ErrorCategory::User,
                ErrorKind::PassphraseUnavailable,
                format!("input ended before {}", prompt.trim_end_matches([':', ' '])),
            ));
        }
        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }
        Ok(line)
    }
}

/// Reads passphrase from terminal with no echo
pub struct TerminalPassphraseReader;

impl TerminalPassphraseReader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TerminalPassphraseReader {
    fn default() -> Self {
        Self::new()
    }
}

impl PassphraseReader for TerminalPassphraseReader {
    /// Read passphrase from terminal.
    ///
    /// Note: Terminal input is limited to UTF-8 due to rpassword library constraints.
    /// For non-UTF-8 passphrases, use --passphrase-stdin instead.
    fn read_passphrase(&mut self, prompt: &str) -> Result<Zeroizing<Vec<u8>>> {
        if !io::stdin().is_terminal() {
            return Err(PassmgrError::with_kind(
                ErrorCategory::User,
                ErrorKind::PassphraseUnavailable,
                "cannot read passphrase from terminal - stdin is not a terminal",
            ));
        }

        // Prompt goes to the tty and the password is read *without echo*.
        // Note: rpassword returns String (UTF-8 only), not zeroized
        let passphrase = rpassword::prompt_password(prompt).map_err(|e| {
            PassmgrError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::PassphraseUnavailable,
                format!("failure reading passphrase: {}", e),
                e,
            )
        })?;

        Ok(Zeroizing::new(passphrase.into_bytes()))
    }
}

/// Ask twice and require both answers to match.
pub fn read_confirmed(
    reader: &mut dyn PassphraseReader,
    prompt: &str,
    confirm_prompt: &str,
) -> Result<Zeroizing<Vec<u8>>> {
    let first = reader.read_passphrase(prompt)?;
    let second = reader.read_passphrase(confirm_prompt)?;
    if *first != *second {
        return Err(PassmgrError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidInput,
            "passphrases did not match",
        ));
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(data: &'static [u8]) -> LinePassphraseReader {
        LinePassphraseReader::new(Box::new(data))
    }

    #[test]
    fn test_constant_reader() {
        let mut reader = ConstantPassphraseReader::new(b"test123".to_vec());
        assert_eq!(&*reader.read_passphrase("a: ").unwrap(), b"test123");
        assert_eq!(&*reader.read_passphrase("b: ").unwrap(), b"test123");
    }

    /// Tests the terminal reader. This is ignored by default and must be run
    /// explicitly and with human input:
    ///
    /// cargo test test_terminal_reader_interactive -- --ignored --nocapture
    #[test]
    #[ignore]
    fn test_terminal_reader_interactive() {
        let mut reader = TerminalPassphraseReader::new();
        let passphrase = reader.read_passphrase("Please enter a test passphrase: ").unwrap();
        println!("You entered: {}", String::from_utf8_lossy(&passphrase));
        assert!(!passphrase.is_empty(), "Expected non-empty passphrase");
    }

    #[test]
    fn test_line_reader_one_line_per_call() {
        let mut reader = lines(b"master\nsecret value\r\nlast");
        assert_eq!(&*reader.read_passphrase("").unwrap(), b"master");
        assert_eq!(&*reader.read_passphrase("").unwrap(), b"secret value");
        assert_eq!(&*reader.read_passphrase("").unwrap(), b"last");
    }

    #[test]
    fn test_line_reader_empty_line() {
        let mut reader = lines(b"\n");
        assert_eq!(&*reader.read_passphrase("").unwrap(), b"");
    }

    #[test]
    fn test_line_reader_eof() {
        let mut reader = lines(b"");
        let err = reader.read_passphrase("Master passphrase: ").unwrap_err();
        assert!(err.is(ErrorKind::PassphraseUnavailable));
        assert_eq!(err.message(), "input ended before Master passphrase");
    }

    /// Verifies that LinePassphraseReader accepts arbitrary byte sequences,
    /// not just valid UTF-8.
    #[test]
    fn test_line_reader_non_utf8() {
        let mut reader = lines(&[0xff, 0xfe, 0x00, 0x01, b'\n']);
        assert_eq!(&*reader.read_passphrase("").unwrap(), &[0xff, 0xfe, 0x00, 0x01]);
    }

    #[test]
    fn test_read_confirmed() {
        let mut reader = lines(b"same\nsame\n");
        assert_eq!(&*read_confirmed(&mut reader, "", "").unwrap(), b"same");

        let mut reader = lines(b"one\ntwo\n");
        let err = read_confirmed(&mut reader, "", "").unwrap_err();
        assert!(err.is(ErrorKind::InvalidInput));
    }
}

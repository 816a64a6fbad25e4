//! CLI integration tests
//!
//! Tests the command-line interface end-to-end.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

/// Get path to the passmgr binary
fn passmgr_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_passmgr"))
}

/// Run passmgr against `store` with passphrases fed line by line on stdin
fn run_passmgr(store: &Path, args: &[&str], input: &str) -> Output {
    let mut child = Command::new(passmgr_bin())
        .arg("--passphrase-stdin")
        .arg("--file")
        .arg(store)
        .args(args)
        .env_remove("PASSMGR_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn passmgr");

    {
        let stdin = child.stdin.as_mut().expect("failed to open stdin");
        // Ignore BrokenPipe errors - the command may exit before reading stdin
        // if it encounters an error (e.g., store not found)
        let _ = stdin.write_all(input.as_bytes());
    }

    child.wait_with_output().expect("failed to wait for passmgr")
}

fn assert_success(output: &Output, what: &str) {
    assert!(
        output.status.success(),
        "{} failed: {}",
        what,
        String::from_utf8_lossy(&output.stderr)
    );
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_init_add_show_list_delete() {
    let temp_dir = TempDir::new().unwrap();
    let store = temp_dir.path().join("store");

    let result = run_passmgr(&store, &["init"], "master\nmaster\n");
    assert_success(&result, "init");
    assert!(store.exists());

    let result = run_passmgr(
        &store,
        &["add", "--user", "u1", "--url", "example.com"],
        "master\ns3cr3t\n",
    );
    assert_success(&result, "add");

    let result = run_passmgr(&store, &["show", "-u", "u1", "-l", "example.com"], "master\n");
    assert_success(&result, "show");
    assert_eq!(stdout(&result), "s3cr3t\n");

    let result = run_passmgr(&store, &["list"], "master\n");
    assert_success(&result, "list");
    assert!(stdout(&result).contains("u1"));
    assert!(stdout(&result).contains("example.com"));
    assert!(!stdout(&result).contains("s3cr3t"));

    let result = run_passmgr(&store, &["delete", "-u", "u1", "-l", "example.com"], "master\n");
    assert_success(&result, "delete");

    let result = run_passmgr(&store, &["list"], "master\n");
    assert_success(&result, "list");
    assert_eq!(stdout(&result), "-- store is empty --\n");
}

#[test]
fn test_wrong_master_passphrase() {
    let temp_dir = TempDir::new().unwrap();
    let store = temp_dir.path().join("store");
    assert_success(
        &run_passmgr(
            &store,
            &["add", "-u", "u1", "-l", "example.com"],
            "master\nmaster\nsecret\n",
        ),
        "add",
    );

    let result = run_passmgr(&store, &["show", "-u", "u1", "-l", "example.com"], "wrong\n");
    assert!(!result.status.success());
    assert!(stdout(&result).is_empty());
    assert!(stderr(&result).contains("bad passphrase"));
}

#[test]
fn test_list_missing_store() {
    let temp_dir = TempDir::new().unwrap();
    let store = temp_dir.path().join("store");

    let result = run_passmgr(&store, &["list"], "master\n");
    assert!(!result.status.success());
    assert!(stderr(&result).contains("does not exist yet"));
    assert!(!store.exists());
}

#[test]
fn test_directory_resolves_to_default_file() {
    let temp_dir = TempDir::new().unwrap();

    let result = run_passmgr(temp_dir.path(), &["init"], "master\nmaster\n");
    assert_success(&result, "init");
    assert!(temp_dir.path().join(".passmgr_store").is_file());
}

#[test]
fn test_import_then_passwd() {
    let temp_dir = TempDir::new().unwrap();
    let store = temp_dir.path().join("store");
    let dump = temp_dir.path().join("dump.json");
    fs::write(
        &dump,
        r#"[
            {"User": "alice", "URL": "mail.test", "Secrets": {"passphrase": "a1"}},
            {"User": "bob", "URL": "bank.test", "Secrets": {"passphrase": "b1"}}
        ]"#,
    )
    .unwrap();

    let result = run_passmgr(&store, &["import", dump.to_str().unwrap()], "old\nold\n");
    assert_success(&result, "import");
    assert_eq!(stdout(&result), "Imported 2 subjects\n");

    let result = run_passmgr(&store, &["passwd"], "old\nnew\nnew\n");
    assert_success(&result, "passwd");

    let result = run_passmgr(&store, &["show", "-u", "bob", "-l", "bank.test"], "old\n");
    assert!(!result.status.success());

    let result = run_passmgr(&store, &["show", "-u", "bob", "-l", "bank.test"], "new\n");
    assert_success(&result, "show");
    assert_eq!(stdout(&result), "b1\n");
}

#[test]
fn test_passwd_mismatch_keeps_file() {
    let temp_dir = TempDir::new().unwrap();
    let store = temp_dir.path().join("store");
    assert_success(&run_passmgr(&store, &["init"], "old\nold\n"), "init");
    let before = fs::read(&store).unwrap();

    let result = run_passmgr(&store, &["passwd"], "old\nnew\nnwe\n");
    assert!(!result.status.success());
    assert!(stderr(&result).contains("passphrases did not match"));
    assert_eq!(fs::read(&store).unwrap(), before);
}

#[test]
#[cfg(unix)]
fn test_rejects_world_readable_store() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    let store = temp_dir.path().join("store");
    assert_success(&run_passmgr(&store, &["init"], "pw\npw\n"), "init");
    assert_eq!(
        fs::metadata(&store).unwrap().permissions().mode() & 0o777,
        0o600
    );
    fs::set_permissions(&store, fs::Permissions::from_mode(0o644)).unwrap();

    let result = run_passmgr(&store, &["list"], "pw\n");
    assert!(!result.status.success());
    assert!(stderr(&result).contains("accessible by other users"));
}

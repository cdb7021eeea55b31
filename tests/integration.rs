use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn docask_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("docask");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let doc = root.join("manual.md");
    fs::write(
        &doc,
        "# Operations Manual\n\n\
         ## Log rotation\n\n\
         Logs rotate nightly. To force a rotation, run the rotate-logs \
         command with the service name. Rotated files are compressed and \
         kept for thirty days before deletion.\n\n\
         ## Backups\n\n\
         Database backups run every six hours and are uploaded to the \
         archive bucket. Restoring a backup requires the restore token \
         from the operations vault.\n",
    )
    .unwrap();

    (tmp, doc)
}

fn run_docask(args: &[&str]) -> (String, String, bool) {
    let binary = docask_binary();
    let output = Command::new(&binary)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docask binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn doc_arg(doc: &Path) -> &str {
    doc.to_str().unwrap()
}

#[test]
fn test_chunks_reports_statistics() {
    let (_tmp, doc) = setup_test_env();

    let (stdout, stderr, success) = run_docask(&["--doc", doc_arg(&doc), "chunks"]);
    assert!(success, "chunks failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("chunks:"));
    assert!(stdout.contains("fingerprint:"));
}

#[test]
fn test_context_retrieves_matching_section() {
    let (_tmp, doc) = setup_test_env();

    // Small chunks so retrieval can separate the two sections.
    let config_path = doc.parent().unwrap().join("docask.toml");
    fs::write(
        &config_path,
        "[retrieval]\nchunk_size = 160\noverlap = 40\nmin_context_chars = 40\n",
    )
    .unwrap();

    let (stdout, stderr, success) = run_docask(&[
        "--config",
        config_path.to_str().unwrap(),
        "--doc",
        doc_arg(&doc),
        "context",
        "force a log rotation",
    ]);
    assert!(success, "context failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("rotate"), "context missing topic: {}", stdout);
}

#[test]
fn test_context_falls_back_to_full_document() {
    let (_tmp, doc) = setup_test_env();

    let (stdout, _, success) = run_docask(&[
        "--doc",
        doc_arg(&doc),
        "context",
        "xylophone zeppelin quagga",
    ]);
    assert!(success);
    // Zero lexical overlap: the whole document comes back.
    assert!(stdout.contains("Log rotation"));
    assert!(stdout.contains("Backups"));
}

#[test]
fn test_ask_surfaces_request_failure_and_exits_zero() {
    let (_tmp, doc) = setup_test_env();

    let config_path = doc.parent().unwrap().join("docask.toml");
    // Unroutable endpoint, no retries: the query fails fast but the
    // session must not crash.
    fs::write(
        &config_path,
        "[api]\nurl = \"http://127.0.0.1:9/v1/chat/completions\"\nmax_retries = 0\ntimeout_secs = 2\n",
    )
    .unwrap();

    let (stdout, stderr, success) = run_docask(&[
        "--config",
        config_path.to_str().unwrap(),
        "--doc",
        doc_arg(&doc),
        "ask",
        "How do I rotate the logs?",
    ]);
    assert!(success, "ask should exit zero: stdout={}, stderr={}", stdout, stderr);
    assert!(
        stdout.contains("Request failed:"),
        "expected error-prefixed answer, got: {}",
        stdout
    );
}

#[test]
fn test_missing_document_is_fatal() {
    let (stdout, stderr, success) = run_docask(&["--doc", "/no/such/manual.md", "chunks"]);
    assert!(!success, "expected failure: stdout={}", stdout);
    assert!(stderr.contains("document not found"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_config_is_rejected() {
    let (_tmp, doc) = setup_test_env();

    let config_path = doc.parent().unwrap().join("docask.toml");
    fs::write(&config_path, "[retrieval]\nchunk_size = 100\noverlap = 200\n").unwrap();

    let (_, stderr, success) = run_docask(&[
        "--config",
        config_path.to_str().unwrap(),
        "--doc",
        doc_arg(&doc),
        "chunks",
    ]);
    assert!(!success);
    assert!(stderr.contains("overlap"), "stderr: {}", stderr);
}

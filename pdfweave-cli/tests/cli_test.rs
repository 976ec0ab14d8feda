//! Integration tests for the pdfweave CLI

use anyhow::Result;
use pdfweave::{PdfReader, SourceDocument};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::{tempdir, TempDir};

fn run(args: &[&str]) -> Result<Output> {
    Ok(Command::new(env!("CARGO_BIN_EXE_pdfweave"))
        .args(args)
        .output()?)
}

fn setup_temp_dir() -> TempDir {
    tempdir().expect("Failed to create temp directory")
}

fn create(path: &Path, pages: &str) {
    let output = run(&["create", "-o", path.to_str().unwrap(), "--pages", pages]).unwrap();
    assert!(
        output.status.success(),
        "create failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn test_create_command() {
    let dir = setup_temp_dir();
    let path = dir.path().join("created.pdf");

    let output = run(&[
        "create",
        "-o",
        path.to_str().unwrap(),
        "--pages",
        "12",
        "--text",
        "Hello (world)",
        "--title",
        "CLI test",
        "--max-kids",
        "4",
    ])
    .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("PDF created successfully"));

    let bytes = fs::read(&path).unwrap();
    assert!(bytes.starts_with(b"%PDF-1.7"));
    let reader = PdfReader::from_bytes(bytes).unwrap();
    assert_eq!(reader.page_count().unwrap(), 12);
}

#[test]
fn test_create_with_xref_stream() {
    let dir = setup_temp_dir();
    let path = dir.path().join("stream.pdf");

    let output = run(&[
        "create",
        "-o",
        path.to_str().unwrap(),
        "--xref-stream",
        "--pdf-version",
        "1.5",
    ])
    .unwrap();
    assert!(output.status.success());

    let reader = PdfReader::open(&path).unwrap();
    assert!(reader.uses_xref_stream());
}

#[test]
fn test_invalid_version_is_rejected() {
    let dir = setup_temp_dir();
    let path = dir.path().join("bad.pdf");

    let output = run(&["create", "-o", path.to_str().unwrap(), "--pdf-version", "3.1"]).unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid PDF version"));
}

#[test]
fn test_append_command() {
    let dir = setup_temp_dir();
    let input = dir.path().join("input.pdf");
    let updated = dir.path().join("updated.pdf");
    create(&input, "3");

    let output = run(&[
        "append",
        input.to_str().unwrap(),
        "-o",
        updated.to_str().unwrap(),
        "--pages",
        "2",
        "--link",
        "https://example.com/",
    ])
    .unwrap();
    assert!(
        output.status.success(),
        "append failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let original = fs::read(&input).unwrap();
    let bytes = fs::read(&updated).unwrap();
    assert!(bytes.starts_with(&original));

    let reader = PdfReader::from_bytes(bytes).unwrap();
    assert_eq!(reader.page_count().unwrap(), 5);
    assert!(reader.trailer().get_integer("Prev").is_some());
}

#[test]
fn test_pdf_2_0_document_can_be_appended_and_inspected() {
    let dir = setup_temp_dir();
    let input = dir.path().join("modern.pdf");
    let updated = dir.path().join("modern-v2.pdf");

    let output = run(&[
        "create",
        "-o",
        input.to_str().unwrap(),
        "--pdf-version",
        "2.0",
    ])
    .unwrap();
    assert!(output.status.success());
    assert!(fs::read(&input).unwrap().starts_with(b"%PDF-2.0"));

    let output = run(&[
        "append",
        input.to_str().unwrap(),
        "-o",
        updated.to_str().unwrap(),
    ])
    .unwrap();
    assert!(
        output.status.success(),
        "append failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let output = run(&["inspect", updated.to_str().unwrap()]).unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("PDF Version: 2.0"));
    assert!(stdout.contains("Pages: 2"));
}

#[test]
fn test_append_refuses_to_overwrite_input() {
    let dir = setup_temp_dir();
    let input = dir.path().join("same.pdf");
    create(&input, "1");

    let output = run(&[
        "append",
        input.to_str().unwrap(),
        "-o",
        input.to_str().unwrap(),
    ])
    .unwrap();
    assert!(!output.status.success());
    assert_eq!(PdfReader::open(&input).unwrap().page_count().unwrap(), 1);
}

#[test]
fn test_inspect_command() {
    let dir = setup_temp_dir();
    let path = dir.path().join("inspect.pdf");
    create(&path, "4");

    let output = run(&["inspect", path.to_str().unwrap()]).unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Pages: 4"));
    assert!(stdout.contains("Cross-reference: table"));
    assert!(stdout.contains("Incremental update: No"));
}

#[test]
fn test_inspect_missing_file() {
    let output = run(&["inspect", "/nonexistent/missing.pdf"]).unwrap();
    assert!(!output.status.success());
}

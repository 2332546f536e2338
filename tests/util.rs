//! Shared test utilities for integration tests
//!
//! Command builders and state inspection helpers used across
//! multiple test files.

#![allow(dead_code)]

use assert_fs::prelude::*;
use snipweave::core::{Command, InitialChunk, State, apply_all};

/// Upload `contents` as the reference file at `path`.
pub fn upload(
    path: &str,
    contents: &str,
) -> Command
{
    Command::UploadFileContents { path: path.into(), contents: contents.into() }
}

/// Reveal `text` starting at reference line `line`, after the selected cell.
pub fn reveal(
    path: &str,
    line: u32,
    text: &str,
) -> Command
{
    Command::InsertSnippet { index: None, fragments: vec![InitialChunk::new(path, line, text)] }
}

/// Apply commands to an empty state, panicking on the first failure.
pub fn replay(commands: &[Command]) -> State
{
    apply_all(&State::new(), commands).expect("script applies cleanly")
}

/// Version-0 chunks on `path` as `(start line, text)`, in line order.
pub fn reference_chunks(
    state: &State,
    path: &str,
) -> Vec<(u32, String)>
{
    let mut chunks: Vec<(u32, String)> = state
        .chunks
        .values()
        .filter(|c| c.location.path == path)
        .map(|c| (c.location.line, state.chunk_versions[&c.versions[0]].text.clone()))
        .collect();
    chunks.sort();
    chunks
}

/// Write a JSON command script into a fresh temp dir.
pub fn script_fixture(commands: &[Command]) -> assert_fs::TempDir
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    tmp.child("script.json")
        .write_str(&serde_json::to_string_pretty(commands).expect("serialize script"))
        .expect("write script");
    tmp
}

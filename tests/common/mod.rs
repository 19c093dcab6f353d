//! Common test utilities for end-to-end tests.

use std::io::Write;
use std::process::{Command, Output};
use tempfile::NamedTempFile;

/// Write IR text to a temporary `.dw` file.
pub fn write_ir(source: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::with_suffix(".dw").expect("Failed to create temp file");
    temp_file
        .write_all(source.as_bytes())
        .expect("Failed to write IR");
    temp_file
}

/// Run the `deadwood` binary with `args`, with logging silenced.
#[allow(dead_code)]
pub fn run_deadwood(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_deadwood"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute deadwood")
}

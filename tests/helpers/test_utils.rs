#![allow(dead_code)]
use std::{io::Write, path::PathBuf};
use tempfile::NamedTempFile;

/// Writes `content` to a temporary file that lives as long as the returned handle.
pub fn temp_file(content: &str, suffix: &str) -> (NamedTempFile, PathBuf) {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    write!(file, "{}", content).unwrap();
    let path = file.path().to_path_buf();
    (file, path)
}

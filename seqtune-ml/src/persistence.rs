//! File output helpers: atomic writes, JSON and JSON Lines.
//!
//! Every artifact seqtune writes (prepared splits, run configuration, selection
//! reports) goes through a `.tmp` sibling followed by a rename, so a crash never
//! leaves a half-written file under the final name.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};

/// Record of a JSON Lines file written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrittenFile {
    pub path: PathBuf,
    pub rows: usize,
    /// Hex SHA-256 of the file contents.
    pub sha256: String,
}

/// Atomically write JSON data to a file.
///
/// Creates parent directories if they don't exist.
pub fn atomic_write_json<T: Serialize>(path: &Path, data: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(data).map_err(io::Error::other)?;
    atomic_write(path, json.as_bytes())
}

/// Atomically write raw bytes to a file.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Atomically write one JSON object per line and return a digest of the result.
pub fn write_jsonl<T: Serialize>(path: &Path, rows: &[T]) -> io::Result<WrittenFile> {
    let mut output = String::new();
    for row in rows {
        let line = serde_json::to_string(row).map_err(io::Error::other)?;
        output.push_str(&line);
        output.push('\n');
    }
    atomic_write(path, output.as_bytes())?;

    let sha256 = format!("{:x}", Sha256::digest(output.as_bytes()));
    Ok(WrittenFile {
        path: path.to_path_buf(),
        rows: rows.len(),
        sha256,
    })
}

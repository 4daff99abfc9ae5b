// src/watch/hash.rs

//! Content hashing to suppress no-op change triggers.
//!
//! With `[watch] use_hash = true`, a write that leaves a file's bytes
//! unchanged (editor save without edits, `touch`, formatter no-ops) does not
//! trigger a run. Hashes live in memory only; the first change to any file
//! after startup always triggers.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use blake3::Hasher;
use tracing::debug;

use crate::errors::Result;

/// Compute the blake3 hash of a single file.
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file = File::open(path)?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Per-file hash memory for the watcher loop.
#[derive(Debug, Default)]
pub struct ChangeHashCache {
    hashes: HashMap<PathBuf, String>,
}

impl ChangeHashCache {
    pub fn new() -> Self {
        ChangeHashCache::default()
    }

    /// Hash the file and compare against the cached value, updating the
    /// cache. Returns true when the content differs (or was never seen).
    pub fn content_changed(&mut self, path: &Path) -> Result<bool> {
        let hash = compute_file_hash(path)?;
        match self.hashes.insert(path.to_path_buf(), hash.clone()) {
            Some(previous) if previous == hash => {
                debug!(path = ?path, "file content unchanged");
                Ok(false)
            }
            _ => Ok(true),
        }
    }

    /// Drop the cached hash for a removed file so a later re-create
    /// triggers again.
    pub fn forget(&mut self, path: &Path) {
        self.hashes.remove(path);
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

//! Write-back cache of shard contents.
//!
//! Each entry holds the full, sorted line list of one shard keyed by its path
//! relative to the store root. Entries live until the next flush, which writes the
//! dirty ones back in parallel and clears the cache.

use anyhow::{Context, Result};
use log::trace;
use rayon::prelude::*;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Default, Clone)]
pub struct CacheEntry {
    lines: Vec<String>,
    dirty: bool,
}

impl CacheEntry {
    pub fn new(lines: Vec<String>) -> Self {
        CacheEntry {
            lines,
            dirty: false,
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }

    /// Inserts `line` at its sorted position. Returns false if it was already present.
    pub fn insert(&mut self, line: &str) -> bool {
        match self.lines.binary_search_by(|l| l.as_str().cmp(line)) {
            Ok(_) => false,
            Err(ix) => {
                self.lines.insert(ix, line.to_string());
                self.dirty = true;
                true
            }
        }
    }

    /// Removes `line`. Returns false if it was not present.
    pub fn remove(&mut self, line: &str) -> bool {
        match self.lines.binary_search_by(|l| l.as_str().cmp(line)) {
            Ok(ix) => {
                self.lines.remove(ix);
                self.dirty = true;
                true
            }
            Err(_) => false,
        }
    }
}

/// Reads a shard file into lines; a missing file is an empty shard.
pub fn read_shard(root: &Path, path: &str) -> Result<Vec<String>> {
    let full_path = root.join(path);
    if !full_path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(&full_path)
        .with_context(|| format!("Reading shard {}", full_path.display()))?;
    Ok(content
        .lines()
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Overwrites a shard file with `lines`, one per line.
pub fn write_shard(root: &Path, path: &str, lines: &[String]) -> Result<()> {
    let full_path = root.join(path);
    let mut content = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }
    std::fs::write(&full_path, content)
        .with_context(|| format!("Writing shard {}", full_path.display()))
}

#[derive(Debug, Default)]
pub struct ShardCache {
    entries: HashMap<String, CacheEntry>,
}

impl ShardCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        ShardCache {
            entries: HashMap::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn get(&self, path: &str) -> Option<&CacheEntry> {
        self.entries.get(path)
    }

    /// Cached entry for `path`, read from disk on first touch.
    pub fn get_or_load(&mut self, root: &Path, path: &str) -> Result<&mut CacheEntry> {
        let entry = match self.entries.entry(path.to_string()) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                trace!("Loading shard {}", path);
                e.insert(CacheEntry::new(read_shard(root, path)?))
            }
        };
        Ok(entry)
    }

    pub fn remove(&mut self, path: &str) -> Option<CacheEntry> {
        self.entries.remove(path)
    }

    pub fn paths(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drops every entry without pending changes. Returns how many were dropped.
    pub fn evict_clean(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_dirty());
        before - self.entries.len()
    }

    /// Creates the parent directory of every cached shard.
    pub fn ensure_directories(&self, root: &Path) -> Result<()> {
        for path in self.entries.keys() {
            if let Some(parent) = root.join(path).parent() {
                if !parent.exists() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("Creating {}", parent.display()))?;
                }
            }
        }
        Ok(())
    }

    /// Writes every dirty entry back to disk, in parallel. Returns the number of
    /// shards written; returns only once every write has finished.
    pub fn write_dirty(&self, root: &Path) -> Result<usize> {
        let written = self
            .entries
            .par_iter()
            .filter(|(_, entry)| entry.is_dirty())
            .map(|(path, entry)| write_shard(root, path, &entry.lines))
            .collect::<Result<Vec<()>>>()?;
        Ok(written.len())
    }
}

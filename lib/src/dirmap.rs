//! The directory map: which digest prefixes have been split out into directories.
//!
//! Keys are even-length prefixes of shard names (one level per two characters) and
//! values are directory paths relative to the store root, always `/`-separated.
//! Only longest-prefix-match is needed, so a sorted map stands in for a trie.

use crate::consts::{DIRMAP_FILE, SHARD_EXTENSION, VCS_DIR};
use crate::hasher::DIGEST_HEX_LEN;
use anyhow::{Context, Result};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::path::Path;
use walkdir::WalkDir;

/// Result of a longest-prefix lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixMatch<'a> {
    pub directory: &'a str,
    /// Number of two-character levels of the name consumed by the match.
    pub depth: usize,
}

#[derive(Debug, Default, Clone)]
pub struct DirectoryMap {
    entries: BTreeMap<String, String>,
}

impl DirectoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the map from the directories present under `root`.
    ///
    /// Every directory with a two-character name is registered under the
    /// concatenation of its ancestors' names. Only directories are visited: shard
    /// files, the version-control directory and anything else not shaped like a
    /// shard level are pruned with their subtrees.
    pub fn build(root: &Path) -> Result<Self> {
        let mut map = DirectoryMap::new();
        let walker = WalkDir::new(root)
            .min_depth(1)
            .max_depth(DIGEST_HEX_LEN / 2 + 1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.file_type().is_dir() && e.file_name() != VCS_DIR && e.file_name().len() == 2
            });
        for entry in walker {
            let entry = entry.with_context(|| format!("Scanning {}", root.display()))?;
            let relative = entry.path().strip_prefix(root)?;
            let parts: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            map.register(parts.concat(), parts.join("/"));
        }
        debug!("Built directory map with {} entries", map.len());
        Ok(map)
    }

    pub fn register(&mut self, prefix: impl Into<String>, directory: impl Into<String>) {
        let prefix = prefix.into();
        if prefix.is_empty() || prefix.len() % 2 != 0 {
            warn!("Ignoring directory map prefix of odd length: {}", prefix);
            return;
        }
        self.entries.insert(prefix, directory.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_directory(&self, directory: &str) -> bool {
        self.entries.values().any(|d| d == directory)
    }

    pub fn directories(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(String::as_str)
    }

    /// Deepest registered prefix of `name`.
    pub fn resolve(&self, name: &str) -> Option<PrefixMatch<'_>> {
        let mut len = name.len() - name.len() % 2;
        while len >= 2 {
            if let Some(directory) = name.get(..len).and_then(|p| self.entries.get(p)) {
                return Some(PrefixMatch {
                    directory,
                    depth: len / 2,
                });
            }
            len -= 2;
        }
        None
    }

    /// Path of the shard file holding `name`, relative to the store root.
    pub fn shard_path(&self, name: &str) -> String {
        match self.resolve(name) {
            None => format!("{}.{}", &name[..2], SHARD_EXTENSION),
            Some(m) if m.depth * 2 >= name.len() => {
                format!("{}/{}.{}", m.directory, name, SHARD_EXTENSION)
            }
            Some(m) => {
                let start = m.depth * 2;
                format!(
                    "{}/{}.{}",
                    m.directory,
                    &name[start..start + 2],
                    SHARD_EXTENSION
                )
            }
        }
    }

    /// Writes every directory path, one per line, to the manifest at `root`.
    pub fn write_manifest(&self, root: &Path) -> Result<()> {
        let mut content = String::new();
        for directory in self.directories() {
            content.push_str(directory);
            content.push('\n');
        }
        let path = root.join(DIRMAP_FILE);
        std::fs::write(&path, content).with_context(|| format!("Writing {}", path.display()))
    }

    /// Directory paths recorded in the manifest at `root`; empty if there is none.
    pub fn read_manifest(root: &Path) -> Result<Vec<String>> {
        let path = root.join(DIRMAP_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content =
            std::fs::read_to_string(&path).with_context(|| format!("Reading {}", path.display()))?;
        Ok(content
            .lines()
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// The directory a shard turns into when it is split, with the map prefix that
/// directory is registered under. Shards named by a full digest cannot be split.
pub fn split_target(shard_path: &str) -> Option<(String, String)> {
    let directory = shard_path.strip_suffix(&format!(".{}", SHARD_EXTENSION))?;
    let file_stem = directory.rsplit('/').next()?;
    if file_stem.len() != 2 {
        return None;
    }
    Some((directory.replace('/', ""), directory.to_string()))
}

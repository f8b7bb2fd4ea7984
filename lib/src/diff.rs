//! Replaying textual diffs of a store directory.
//!
//! A store kept under version control changes by whole lines. A unified diff of
//! the store directory can therefore be turned back into quad-level changes,
//! applied to another checkout, or rendered as a SPARQL update. Every quad appears
//! in three shard files; only subject shards are read so each change counts once.

use crate::codec::{self, Segment};
use crate::store::DynamicFileStore;
use anyhow::Result;
use log::debug;
use oxigraph::model::{GraphName, Quad};
use std::collections::{BTreeMap, HashSet};

/// Lines removed from and added to one file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FileDiff {
    /// Path of the file after the change, relative to the repository root.
    pub path: String,
    pub deleted: Vec<String>,
    pub inserted: Vec<String>,
}

impl FileDiff {
    pub fn new(path: impl Into<String>) -> Self {
        FileDiff {
            path: path.into(),
            ..Default::default()
        }
    }
}

/// Splits `git diff` output into one [`FileDiff`] per file.
///
/// Changed lines are only collected inside hunks, so the `---`/`+++` file headers
/// are never mistaken for records. Several hunks of one file are merged.
pub fn parse_unified_diff(text: &str) -> Vec<FileDiff> {
    let mut diffs = Vec::new();
    let mut current: Option<FileDiff> = None;
    let mut in_hunk = false;
    for line in text.lines() {
        if line.starts_with("diff ") {
            if let Some(done) = current.take() {
                diffs.push(done);
            }
            in_hunk = false;
            let right = line
                .split_whitespace()
                .nth(3)
                .map(|t| t.strip_prefix("b/").unwrap_or(t));
            current = right.map(FileDiff::new);
            continue;
        }
        let Some(file) = current.as_mut() else {
            continue;
        };
        if line.starts_with("@@") {
            in_hunk = true;
        } else if !in_hunk {
            continue;
        } else if let Some(removed) = line.strip_prefix('-') {
            file.deleted.push(removed.to_string());
        } else if let Some(added) = line.strip_prefix('+') {
            file.inserted.push(added.to_string());
        }
    }
    if let Some(done) = current {
        diffs.push(done);
    }
    diffs
}

/// Quad-level changes recovered from a diff.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StoreDiff {
    pub deleted: Vec<Quad>,
    pub inserted: Vec<Quad>,
}

impl StoreDiff {
    /// Reads the changed lines of subject shards. A line that is both deleted and
    /// inserted moved between shards, as happens when a shard is split, and is
    /// left out.
    pub fn from_file_diffs(diffs: &[FileDiff]) -> Result<Self> {
        let subject_diffs: Vec<&FileDiff> = diffs
            .iter()
            .filter(|d| Segment::from_shard_path(&d.path) == Some(Segment::Subject))
            .collect();
        let deleted_lines: HashSet<&str> = subject_diffs
            .iter()
            .flat_map(|d| d.deleted.iter().map(String::as_str))
            .collect();
        let inserted_lines: HashSet<&str> = subject_diffs
            .iter()
            .flat_map(|d| d.inserted.iter().map(String::as_str))
            .collect();

        let mut result = StoreDiff::default();
        let mut seen: HashSet<&str> = HashSet::new();
        for diff in subject_diffs.iter() {
            for line in diff.deleted.iter() {
                if !inserted_lines.contains(line.as_str()) && seen.insert(line.as_str()) {
                    result.deleted.push(codec::parse_line(line, &diff.path)?);
                }
            }
        }
        for diff in subject_diffs.iter() {
            for line in diff.inserted.iter() {
                if !deleted_lines.contains(line.as_str()) && seen.insert(line.as_str()) {
                    result.inserted.push(codec::parse_line(line, &diff.path)?);
                }
            }
        }
        debug!(
            "Diff over {} subject shards: {} deleted, {} inserted",
            subject_diffs.len(),
            result.deleted.len(),
            result.inserted.len()
        );
        Ok(result)
    }

    pub fn from_unified_diff(text: &str) -> Result<Self> {
        Self::from_file_diffs(&parse_unified_diff(text))
    }

    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty() && self.inserted.is_empty()
    }

    /// Retracts the deleted quads, asserts the inserted ones and flushes.
    pub fn apply(&self, store: &mut DynamicFileStore) -> Result<()> {
        for quad in self.deleted.iter() {
            store.retract_quad(quad.as_ref())?;
        }
        for quad in self.inserted.iter() {
            store.assert_quad(quad.as_ref())?;
        }
        store.flush()
    }

    /// Renders the changes as `DELETE DATA` followed by `INSERT DATA`, with the
    /// triples of each graph in one `GRAPH` block.
    pub fn as_sparql_update(&self) -> String {
        let mut operations = Vec::new();
        if !self.deleted.is_empty() {
            operations.push(data_block("DELETE DATA", &self.deleted));
        }
        if !self.inserted.is_empty() {
            operations.push(data_block("INSERT DATA", &self.inserted));
        }
        operations.join(";\n")
    }
}

fn data_block(keyword: &str, quads: &[Quad]) -> String {
    let mut by_graph: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for quad in quads {
        let graph = match &quad.graph_name {
            GraphName::NamedNode(g) => g.to_string(),
            _ => continue,
        };
        by_graph.entry(graph).or_default().push(format!(
            "{} {} {} .",
            quad.subject, quad.predicate, quad.object
        ));
    }
    let mut out = format!("{} {{\n", keyword);
    for (graph, triples) in by_graph {
        out.push_str(&format!("  GRAPH {} {{\n", graph));
        for triple in triples {
            out.push_str(&format!("    {}\n", triple));
        }
        out.push_str("  }\n");
    }
    out.push('}');
    out.push('\n');
    out
}

//! The dynamic file store: quads kept as sorted N-Quads lines in hash-sharded files.
//!
//! Every quad is written to three shards, one per segment. A shard's file is found
//! by hashing the canonical token of the node it is indexed by and resolving the
//! resulting name against the [`DirectoryMap`]. Mutations go through a write-back
//! [`ShardCache`]; [`DynamicFileStore::flush`] splits shards that grew past the split
//! threshold, writes dirty shards back in parallel and records the directory map in
//! the `dirmap.txt` manifest.
//!
//! The store assumes a single writer. Nothing here locks the directory.

use crate::cache::{read_shard, write_shard, ShardCache};
use crate::codec::{self, Segment};
use crate::config::StoreConfig;
use crate::consts::{SHARD_EXTENSION, VCS_DIR};
use crate::dirmap::{split_target, DirectoryMap};
use crate::errors::{InvalidPatternError, StoreNotFoundError};
use crate::hasher::shard_name;
use crate::options::FlushPolicy;
use anyhow::{Context, Error, Result};
use log::{debug, error, info, trace, warn};
use oxigraph::model::{
    GraphNameRef, NamedNodeRef, NamedOrBlankNodeRef, Quad, QuadRef, TermRef, TripleRef,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

pub struct DynamicFileStore {
    config: StoreConfig,
    cache: ShardCache,
    directory_map: DirectoryMap,
}

impl DynamicFileStore {
    /// Opens the store rooted at `config.root`. The root must already exist.
    pub fn open(config: StoreConfig) -> Result<Self> {
        if !config.root.is_dir() {
            error!(
                "Could not find dynamic file store base directory at {}",
                config.root.display()
            );
            return Err(Error::new(StoreNotFoundError {
                path: config.root.clone(),
            }));
        }
        let directory_map = DirectoryMap::build(&config.root)?;
        let recorded = DirectoryMap::read_manifest(&config.root)?;
        for directory in recorded.iter() {
            if !directory_map.contains_directory(directory) {
                warn!(
                    "Directory {} is listed in the manifest but missing from {}",
                    directory,
                    config.root.display()
                );
            }
        }
        info!(
            "Opened store at {} ({} split directories)",
            config.root.display(),
            directory_map.len()
        );
        Ok(Self {
            cache: ShardCache::with_capacity(config.cache_threshold),
            config,
            directory_map,
        })
    }

    /// Opens the store at `root`, using `root/quince.json` if there is one.
    pub fn open_dir(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::new(StoreNotFoundError {
                path: root.to_path_buf(),
            }));
        }
        Self::open(StoreConfig::load_or_default(root)?)
    }

    /// Creates the store directory, writes its config file and opens it.
    pub fn init(config: StoreConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.root)
            .with_context(|| format!("Creating store directory {}", config.root.display()))?;
        config.save_to_file(&config.config_path())?;
        Self::open(config)
    }

    /// Flushes pending changes and releases the store.
    pub fn close(mut self) -> Result<()> {
        self.flush()
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn directory_map(&self) -> &DirectoryMap {
        &self.directory_map
    }

    /// Number of shards currently held in the cache.
    pub fn cached_shards(&self) -> usize {
        self.cache.len()
    }

    /// Path, relative to the root, of the shard indexing `token` under `segment`.
    pub fn shard_path(&self, segment: Segment, token: &str) -> String {
        self.directory_map.shard_path(&shard_name(segment, token))
    }

    pub fn shard_path_for(&self, segment: Segment, node: TermRef) -> String {
        self.shard_path(segment, &codec::format_term(node))
    }

    fn assert_line(&mut self, segment: Segment, line: &str, path: &str) -> Result<bool> {
        trace!("Assert: segment={}, path={}, data={}", segment, path, line);
        Ok(self.cache.get_or_load(&self.config.root, path)?.insert(line))
    }

    fn retract_line(&mut self, line: &str, path: &str) -> Result<bool> {
        trace!("Retract: path={}, data={}", path, line);
        Ok(self.cache.get_or_load(&self.config.root, path)?.remove(line))
    }

    fn maybe_flush(&mut self) -> Result<()> {
        if self.cache.len() >= self.config.cache_threshold {
            self.flush()?;
        }
        Ok(())
    }

    /// Adds a quad. Returns false, without touching the predicate and object
    /// shards, when the quad is already stored.
    pub fn assert(
        &mut self,
        subject: NamedOrBlankNodeRef,
        predicate: NamedNodeRef,
        object: TermRef,
        graph: NamedNodeRef,
    ) -> Result<bool> {
        let line = codec::format_line(subject, predicate, object, graph);
        let added = self.insert_line(&line, subject.into(), predicate.into(), object)?;
        self.maybe_flush()?;
        Ok(added)
    }

    fn insert_line(
        &mut self,
        line: &str,
        subject: TermRef,
        predicate: TermRef,
        object: TermRef,
    ) -> Result<bool> {
        let subject_path = self.shard_path_for(Segment::Subject, subject);
        if !self.assert_line(Segment::Subject, line, &subject_path)? {
            return Ok(false);
        }
        let object_path = self.shard_path_for(Segment::Object, object);
        self.assert_line(Segment::Object, line, &object_path)?;
        let predicate_path = self.shard_path_for(Segment::Predicate, predicate);
        self.assert_line(Segment::Predicate, line, &predicate_path)?;
        Ok(true)
    }

    /// Adds a quad given as a whole. The quad must be in a named graph.
    pub fn assert_quad(&mut self, quad: QuadRef) -> Result<bool> {
        match quad.graph_name {
            GraphNameRef::NamedNode(graph) => {
                self.assert(quad.subject, quad.predicate, quad.object, graph)
            }
            _ => Err(anyhow::anyhow!(
                "Cannot assert {}: quads must belong to a named graph",
                quad
            )),
        }
    }

    /// Adds every quad, returning how many were new.
    pub fn assert_quads<I>(&mut self, quads: I) -> Result<usize>
    where
        I: IntoIterator<Item = Quad>,
    {
        let mut added = 0;
        for quad in quads {
            if self.assert_quad(quad.as_ref())? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Adds every triple to `graph`, returning how many were new.
    pub fn assert_graph<'a, I>(&mut self, graph: NamedNodeRef, triples: I) -> Result<usize>
    where
        I: IntoIterator<Item = TripleRef<'a>>,
    {
        debug!("AssertGraph: {}", graph);
        let mut added = 0;
        for t in triples {
            if self.assert(t.subject, t.predicate, t.object, graph)? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Removes every stored quad matching the pattern; `None` matches anything.
    /// Either the subject or the object must be given. Returns the number of
    /// quads removed; an absent quad is not an error.
    pub fn retract(
        &mut self,
        subject: Option<NamedOrBlankNodeRef>,
        predicate: Option<NamedNodeRef>,
        object: Option<TermRef>,
        graph: Option<NamedNodeRef>,
    ) -> Result<usize> {
        trace!(
            "Retract: {} {} {} {}",
            subject.map_or("?".to_string(), |n| n.to_string()),
            predicate.map_or("?".to_string(), |n| n.to_string()),
            object.map_or("?".to_string(), |n| n.to_string()),
            graph.map_or("?".to_string(), |n| n.to_string())
        );
        let retracted = match (subject, predicate, object, graph) {
            (Some(s), Some(p), Some(o), Some(g)) => {
                let line = codec::format_line(s, p, o, g);
                usize::from(self.remove_line(&line, s.into(), p.into(), o)?)
            }
            (Some(s), _, _, _) => {
                let matches: Vec<Quad> = self
                    .lookup(Segment::Subject, s.into())?
                    .into_iter()
                    .filter(|q| matches_pattern(q, predicate, object, graph))
                    .collect();
                self.retract_all(&matches)?
            }
            (None, _, Some(o), _) => {
                let matches: Vec<Quad> = self
                    .lookup(Segment::Object, o)?
                    .into_iter()
                    .filter(|q| matches_pattern(q, predicate, None, graph))
                    .collect();
                self.retract_all(&matches)?
            }
            (None, _, None, _) => return Err(Error::new(InvalidPatternError)),
        };
        self.maybe_flush()?;
        Ok(retracted)
    }

    /// Removes one quad. Returns false if it was not stored.
    pub fn retract_quad(&mut self, quad: QuadRef) -> Result<bool> {
        let GraphNameRef::NamedNode(graph) = quad.graph_name else {
            return Ok(false);
        };
        let removed = self.retract(
            Some(quad.subject),
            Some(quad.predicate),
            Some(quad.object),
            Some(graph),
        )?;
        Ok(removed > 0)
    }

    fn retract_all(&mut self, quads: &[Quad]) -> Result<usize> {
        let mut removed = 0;
        for quad in quads {
            let line = codec::format_quad(quad.as_ref())?;
            if self.remove_line(
                &line,
                quad.subject.as_ref().into(),
                quad.predicate.as_ref().into(),
                quad.object.as_ref(),
            )? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn remove_line(
        &mut self,
        line: &str,
        subject: TermRef,
        predicate: TermRef,
        object: TermRef,
    ) -> Result<bool> {
        let subject_path = self.shard_path_for(Segment::Subject, subject);
        if !self.retract_line(line, &subject_path)? {
            return Ok(false);
        }
        let object_path = self.shard_path_for(Segment::Object, object);
        self.retract_line(line, &object_path)?;
        let predicate_path = self.shard_path_for(Segment::Predicate, predicate);
        self.retract_line(line, &predicate_path)?;
        Ok(true)
    }

    /// Removes every quad in `graph` by rewriting the shard files directly.
    ///
    /// Pending changes are flushed first. Files are rewritten one at a time and a
    /// failure part way through leaves the files already visited rewritten.
    /// Returns the number of lines removed.
    pub fn drop_graph(&mut self, graph: NamedNodeRef) -> Result<usize> {
        self.flush()?;
        let marker = codec::graph_marker(graph);
        let timer = Instant::now();
        let mut removed = 0;
        let mut rewritten = 0;
        for file in self.shard_files(&Segment::ALL)? {
            let path = relative_path(&self.config.root, &file)?;
            let mut lines = read_shard(&self.config.root, &path)?;
            let before = lines.len();
            lines.retain(|l| !l.ends_with(&marker));
            if lines.len() < before {
                write_shard(&self.config.root, &path, &lines)?;
                removed += before - lines.len();
                rewritten += 1;
            }
        }
        info!(
            "DropGraph {}: removed {} lines from {} shards in {:?}",
            graph,
            removed,
            rewritten,
            timer.elapsed()
        );
        Ok(removed)
    }

    /// Splits oversized shards, writes every dirty shard, clears the cache and
    /// rewrites the directory map manifest.
    pub fn flush(&mut self) -> Result<()> {
        debug!("Flush started");
        let timer = Instant::now();
        let cached = self.cache.len();

        for path in self.cache.paths() {
            let oversized = self
                .cache
                .get(&path)
                .is_some_and(|entry| entry.len() > self.config.split_threshold);
            if oversized {
                self.split_shard(&path)?;
            }
        }

        self.cache.ensure_directories(&self.config.root)?;
        let written = self.cache.write_dirty(&self.config.root)?;
        self.cache.clear();
        self.directory_map.write_manifest(&self.config.root)?;
        debug!(
            "Flush completed: {} cached shards, {} written in {:?}",
            cached,
            written,
            timer.elapsed()
        );
        Ok(())
    }

    /// Moves the lines of an oversized shard one directory level down.
    ///
    /// A shard whose lines all share the indexed node cannot be spread out and is
    /// left as it is; it is looked at again on every flush. Returns whether the
    /// shard was split.
    fn split_shard(&mut self, path: &str) -> Result<bool> {
        let Some(segment) = Segment::from_shard_path(path) else {
            return Ok(false);
        };
        let Some((prefix, directory)) = split_target(path) else {
            debug!("SplitFile: {} is at maximum depth", path);
            return Ok(false);
        };
        let Some(entry) = self.cache.get(path) else {
            return Ok(false);
        };
        let quads = codec::parse_lines(entry.lines().iter().map(String::as_str), path)?;
        let Some(first) = quads.first().map(|q| segment.node_of(q)) else {
            return Ok(false);
        };
        // only the first line's node is compared against the rest
        if quads.iter().skip(1).all(|q| segment.node_of(q) == first) {
            debug!(
                "SplitFile: {} holds {} lines for a single {}, leaving it unsplit",
                path,
                quads.len(),
                segment
            );
            return Ok(false);
        }

        debug!("SplitFile: {} -> {}", path, directory);
        let full_directory = self.config.root.join(&directory);
        std::fs::create_dir_all(&full_directory)
            .with_context(|| format!("Creating {}", full_directory.display()))?;
        self.directory_map.register(prefix, directory);

        let lines = match self.cache.remove(path) {
            Some(entry) => entry.into_lines(),
            None => return Ok(false),
        };
        for (line, quad) in lines.iter().zip(quads.iter()) {
            let target = self.shard_path_for(segment, segment.node_of(quad).as_ref());
            self.cache
                .get_or_load(&self.config.root, &target)?
                .insert(line);
        }

        let old_file = self.config.root.join(path);
        if old_file.exists() {
            std::fs::remove_file(&old_file)
                .with_context(|| format!("Removing {}", old_file.display()))?;
        }
        Ok(true)
    }

    /// All quads with `node` as subject.
    pub fn get_for_subject(&mut self, node: TermRef) -> Result<Vec<Quad>> {
        self.query(Segment::Subject, node, FlushPolicy::Auto)
    }

    /// All quads with `node` as predicate.
    pub fn get_for_predicate(&mut self, node: NamedNodeRef) -> Result<Vec<Quad>> {
        self.query(Segment::Predicate, node.into(), FlushPolicy::Auto)
    }

    /// All quads with `node` as object.
    pub fn get_for_object(&mut self, node: TermRef) -> Result<Vec<Quad>> {
        self.query(Segment::Object, node, FlushPolicy::Auto)
    }

    pub(crate) fn query(
        &mut self,
        segment: Segment,
        node: TermRef,
        policy: FlushPolicy,
    ) -> Result<Vec<Quad>> {
        let quads = self.lookup(segment, node)?;
        if policy.allows_flush() {
            self.maybe_flush()?;
        }
        Ok(quads)
    }

    /// Point query through the cache. Never flushes.
    fn lookup(&mut self, segment: Segment, node: TermRef) -> Result<Vec<Quad>> {
        if segment != Segment::Object && matches!(node, TermRef::Literal(_)) {
            return Ok(Vec::new());
        }
        let token = codec::format_term(node);
        let path = self.shard_path(segment, &token);
        let entry = self.cache.get_or_load(&self.config.root, &path)?;
        let candidates: Vec<&str> = match segment {
            Segment::Subject => {
                let prefix = format!("{} ", token);
                entry
                    .lines()
                    .iter()
                    .map(String::as_str)
                    .filter(|l| l.starts_with(&prefix))
                    .collect()
            }
            Segment::Predicate | Segment::Object => entry
                .lines()
                .iter()
                .map(String::as_str)
                .filter(|l| l.contains(&token))
                .collect(),
        };
        let node = node.into_owned();
        Ok(codec::parse_lines(candidates, &path)?
            .into_iter()
            .filter(|q| segment.node_of(q) == node)
            .collect())
    }

    /// Shard files of the given segments, in a stable order: the root-level file
    /// of each segment first, then its directory tree sorted by name.
    pub fn shard_files(&self, segments: &[Segment]) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for segment in segments {
            let root_file = self
                .config
                .root
                .join(format!("{}.{}", segment.tag(), SHARD_EXTENSION));
            if root_file.is_file() {
                files.push(root_file);
            }
            let tree = self.config.root.join(segment.tag());
            if !tree.is_dir() {
                continue;
            }
            let walker = WalkDir::new(&tree)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| e.file_name() != VCS_DIR);
            for entry in walker {
                let entry = entry.with_context(|| format!("Scanning {}", tree.display()))?;
                let is_shard = entry.file_type().is_file()
                    && entry.path().extension().is_some_and(|e| e == SHARD_EXTENSION);
                if is_shard {
                    files.push(entry.into_path());
                }
            }
        }
        Ok(files)
    }

    /// Drops cached shards that have no pending changes once the cache is full.
    pub(crate) fn trim_cache(&mut self) {
        if self.cache.len() >= self.config.cache_threshold {
            let evicted = self.cache.evict_clean();
            trace!("Evicted {} clean shards from the cache", evicted);
        }
    }
}

pub(crate) fn relative_path(root: &Path, file: &Path) -> Result<String> {
    let relative = file.strip_prefix(root)?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

fn matches_pattern(
    quad: &Quad,
    predicate: Option<NamedNodeRef>,
    object: Option<TermRef>,
    graph: Option<NamedNodeRef>,
) -> bool {
    predicate.map_or(true, |p| quad.predicate.as_ref() == p)
        && object.map_or(true, |o| quad.object.as_ref() == o)
        && graph.map_or(true, |g| quad.graph_name.as_ref() == GraphNameRef::NamedNode(g))
}

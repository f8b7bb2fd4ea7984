//! Bulk enumeration of the store, grouped by subject or by object.
//!
//! Enumeration reads shard files straight from disk rather than through the cache,
//! so every enumeration starts with a flush. Handlers return `false` to stop early.

use crate::codec::{self, Segment};
use crate::options::FlushPolicy;
use crate::store::{relative_path, DynamicFileStore};
use anyhow::{Context, Result};
use log::debug;
use oxigraph::model::{Quad, Term};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Instant;

/// Receives every quad of one subject (or one object) at a time.
pub trait TripleCollectionHandler {
    fn handle_triple_collection(&mut self, quads: &[Quad]) -> bool;
}

impl<F> TripleCollectionHandler for F
where
    F: FnMut(&[Quad]) -> bool,
{
    fn handle_triple_collection(&mut self, quads: &[Quad]) -> bool {
        self(quads)
    }
}

/// Receives a resource with the quads it is the subject of and the quads it is
/// the object of.
pub trait ResourceStatementHandler {
    fn handle_resource(
        &mut self,
        resource: &Term,
        subject_statements: &[Quad],
        object_statements: &[Quad],
    ) -> bool;
}

impl<F> ResourceStatementHandler for F
where
    F: FnMut(&Term, &[Quad], &[Quad]) -> bool,
{
    fn handle_resource(
        &mut self,
        resource: &Term,
        subject_statements: &[Quad],
        object_statements: &[Quad],
    ) -> bool {
        self(resource, subject_statements, object_statements)
    }
}

/// Streams a subject shard, calling `emit` once per run of lines with the same
/// subject. Returns false if `emit` asked to stop.
fn stream_subject_groups<F>(root: &Path, file: &Path, mut emit: F) -> Result<bool>
where
    F: FnMut(Vec<Quad>) -> Result<bool>,
{
    let label = relative_path(root, file)?;
    let reader =
        BufReader::new(File::open(file).with_context(|| format!("Opening {}", file.display()))?);
    let mut group: Vec<Quad> = Vec::new();
    for quad in codec::read_quads(reader, &label) {
        let quad = quad?;
        let same_subject = group.first().is_some_and(|q| q.subject == quad.subject);
        if !same_subject && !group.is_empty() && !emit(std::mem::take(&mut group))? {
            return Ok(false);
        }
        group.push(quad);
    }
    if group.is_empty() {
        return Ok(true);
    }
    emit(group)
}

/// Reads a whole object shard and groups its quads by object, in order of first
/// appearance.
fn read_object_groups(root: &Path, file: &Path) -> Result<Vec<Vec<Quad>>> {
    let label = relative_path(root, file)?;
    let reader =
        BufReader::new(File::open(file).with_context(|| format!("Opening {}", file.display()))?);
    let mut index: HashMap<Term, usize> = HashMap::new();
    let mut groups: Vec<Vec<Quad>> = Vec::new();
    for quad in codec::read_quads(reader, &label) {
        let quad = quad?;
        match index.get(&quad.object) {
            Some(&ix) => groups[ix].push(quad),
            None => {
                index.insert(quad.object.clone(), groups.len());
                groups.push(vec![quad]);
            }
        }
    }
    Ok(groups)
}

impl DynamicFileStore {
    /// Calls `handler` with the quads of every subject in the store. Returns the
    /// number of groups delivered.
    pub fn enumerate_subjects<H: TripleCollectionHandler>(&mut self, handler: &mut H) -> Result<usize> {
        self.flush()?;
        let timer = Instant::now();
        let root = self.root().to_path_buf();
        let mut delivered = 0;
        for file in self.shard_files(&[Segment::Subject])? {
            let keep_going = stream_subject_groups(&root, &file, |group| {
                delivered += 1;
                Ok(handler.handle_triple_collection(&group))
            })?;
            if !keep_going {
                break;
            }
        }
        debug!(
            "EnumerateSubjects: {} groups in {:?}",
            delivered,
            timer.elapsed()
        );
        Ok(delivered)
    }

    /// Calls `handler` with the quads of every object in the store. Returns the
    /// number of groups delivered.
    pub fn enumerate_objects<H: TripleCollectionHandler>(&mut self, handler: &mut H) -> Result<usize> {
        self.flush()?;
        let timer = Instant::now();
        let root = self.root().to_path_buf();
        let mut delivered = 0;
        'files: for file in self.shard_files(&[Segment::Object])? {
            for group in read_object_groups(&root, &file)? {
                delivered += 1;
                if !handler.handle_triple_collection(&group) {
                    break 'files;
                }
            }
        }
        debug!(
            "EnumerateObjects: {} groups in {:?}",
            delivered,
            timer.elapsed()
        );
        Ok(delivered)
    }

    /// Calls `handler` once per subject with the quads it is the subject of and
    /// the quads it is the object of.
    pub fn enumerate_subject_resources<H: ResourceStatementHandler>(
        &mut self,
        handler: &mut H,
    ) -> Result<usize> {
        self.flush()?;
        let root = self.root().to_path_buf();
        let mut delivered = 0;
        for file in self.shard_files(&[Segment::Subject])? {
            let keep_going = stream_subject_groups(&root, &file, |group| {
                let resource: Term = group[0].subject.clone().into();
                let as_object = self.query(Segment::Object, resource.as_ref(), FlushPolicy::Deferred)?;
                delivered += 1;
                Ok(handler.handle_resource(&resource, &group, &as_object))
            })?;
            self.trim_cache();
            if !keep_going {
                break;
            }
        }
        Ok(delivered)
    }

    /// Calls `handler` once per object with the quads it is the subject of and
    /// the quads it is the object of. Literal objects have no subject quads.
    pub fn enumerate_object_resources<H: ResourceStatementHandler>(
        &mut self,
        handler: &mut H,
    ) -> Result<usize> {
        self.flush()?;
        let root = self.root().to_path_buf();
        let mut delivered = 0;
        'files: for file in self.shard_files(&[Segment::Object])? {
            for group in read_object_groups(&root, &file)? {
                let resource = group[0].object.clone();
                let as_subject =
                    self.query(Segment::Subject, resource.as_ref(), FlushPolicy::Deferred)?;
                delivered += 1;
                if !handler.handle_resource(&resource, &as_subject, &group) {
                    break 'files;
                }
            }
            self.trim_cache();
        }
        Ok(delivered)
    }
}

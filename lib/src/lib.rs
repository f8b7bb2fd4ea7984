//! quince: a file-system-backed RDF quad store.
//!
//! Quads are stored as N-Quads lines in sorted text files sharded by the hash of
//! their subject, predicate and object, so a store directory can be kept under
//! version control and diffed line by line.
//!
//! ```no_run
//! use quince::{DynamicFileStore, StoreConfig};
//! use oxigraph::model::NamedNode;
//! use std::path::PathBuf;
//!
//! let mut store = DynamicFileStore::init(StoreConfig::new(PathBuf::from("data"))).unwrap();
//! let s = NamedNode::new("http://example.org/s").unwrap();
//! let p = NamedNode::new("http://example.org/p").unwrap();
//! let g = NamedNode::new("http://example.org/g").unwrap();
//! store.assert(s.as_ref().into(), p.as_ref(), s.as_ref().into(), g.as_ref()).unwrap();
//! store.close().unwrap();
//! ```

extern crate derive_builder;

pub mod cache;
pub mod codec;
pub mod config;
pub mod consts;
pub mod diff;
pub mod dirmap;
pub mod enumerate;
pub mod errors;
pub mod hasher;
pub mod io;
pub mod options;
pub mod store;

pub use crate::codec::Segment;
pub use crate::config::{StoreConfig, StoreConfigBuilder};
pub use crate::diff::{parse_unified_diff, FileDiff, StoreDiff};
pub use crate::dirmap::DirectoryMap;
pub use crate::enumerate::{ResourceStatementHandler, TripleCollectionHandler};
pub use crate::errors::{InvalidPatternError, MalformedLineError, StoreNotFoundError};
pub use crate::io::{format_from_path, ImportSummary};
pub use crate::options::{FlushPolicy, Strictness};
pub use crate::store::DynamicFileStore;

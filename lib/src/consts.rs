//! File names, extensions and segment tags that make up the on-disk layout of a store.

/// Extension carried by every shard file.
pub const SHARD_EXTENSION: &str = "nq";

/// Manifest written at the store root on every flush, one directory path per line.
pub const DIRMAP_FILE: &str = "dirmap.txt";

/// Optional store configuration kept at the store root.
pub const CONFIG_FILE: &str = "quince.json";

/// Version-control metadata directory that is never treated as part of the shard tree.
pub const VCS_DIR: &str = ".git";

pub const SUBJECT_TAG: &str = "_s";
pub const PREDICATE_TAG: &str = "_p";
pub const OBJECT_TAG: &str = "_o";

pub const DEFAULT_CACHE_THRESHOLD: usize = 1000;
pub const DEFAULT_SPLIT_THRESHOLD: usize = 2048;

//! Shared option types that replace boolean flag parameters in the Rust API.

/// Controls whether loading a shard into the cache may trigger a flush once the
/// cache has reached its configured size.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum FlushPolicy {
    /// Flush as soon as the cache holds `cache_threshold` shards.
    #[default]
    Auto,
    /// Never flush from a load; used while a flush or split is already running
    /// and while an enumeration is reading shard files.
    Deferred,
}

impl FlushPolicy {
    pub fn allows_flush(self) -> bool {
        matches!(self, FlushPolicy::Auto)
    }
}

/// Controls whether the first error from a bulk operation aborts it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum Strictness {
    /// Abort on the first unparsable record.
    #[default]
    Strict,
    /// Log unparsable records at warn level and carry on.
    Lenient,
}

impl Strictness {
    pub fn is_strict(self) -> bool {
        matches!(self, Strictness::Strict)
    }
}

impl From<bool> for Strictness {
    fn from(value: bool) -> Self {
        if value {
            Strictness::Strict
        } else {
            Strictness::Lenient
        }
    }
}

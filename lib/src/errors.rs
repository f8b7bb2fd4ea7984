// Error types surfaced by the store. They are returned wrapped in `anyhow::Error`;
// callers that need to branch on the kind can `downcast_ref` to these structs.

use std::fmt;
use std::path::PathBuf;

/// The store root did not exist when the store was opened.
#[derive(Debug)]
pub struct StoreNotFoundError {
    pub path: PathBuf,
}

impl fmt::Display for StoreNotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Could not find store directory at {}", self.path.display())
    }
}

impl std::error::Error for StoreNotFoundError {}

/// A stored line could not be parsed back into a quad.
#[derive(Debug)]
pub struct MalformedLineError {
    /// Shard (or other input) the line was read from.
    pub shard: String,
    pub line: String,
    pub message: String,
}

impl fmt::Display for MalformedLineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Malformed line in {}: {} ({})",
            self.shard, self.line, self.message
        )
    }
}

impl std::error::Error for MalformedLineError {}

/// A retract pattern left both the subject and the object unbound.
#[derive(Debug)]
pub struct InvalidPatternError;

impl fmt::Display for InvalidPatternError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Retract requires either subject or object to be specified")
    }
}

impl std::error::Error for InvalidPatternError {}

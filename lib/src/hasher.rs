//! Content hashing for shard placement.
//!
//! A node's canonical token is hashed with BLAKE3 and the digest is rendered as
//! lowercase hex. The segment tag is prepended to form the shard *name*, which the
//! directory map consumes two characters at a time.

use crate::codec::Segment;

/// Hex length of a digest produced by [`digest`].
pub const DIGEST_HEX_LEN: usize = blake3::OUT_LEN * 2;

/// Hex digest of a canonical node token.
pub fn digest(token: &str) -> String {
    blake3::hash(token.as_bytes()).to_hex().to_string()
}

/// Shard name for a node token under `segment`, e.g. `_s` followed by the digest.
pub fn shard_name(segment: Segment, token: &str) -> String {
    let mut name = String::with_capacity(2 + DIGEST_HEX_LEN);
    name.push_str(segment.tag());
    name.push_str(&digest(token));
    name
}

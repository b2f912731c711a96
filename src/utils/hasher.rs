//! Deterministic short keys derived from target URLs.

use sha2::{Digest, Sha256};

/// Number of digest bytes kept in a short key (two hex characters each).
const KEY_BYTES: usize = 4;

/// Maps a URL to its short key.
///
/// Implementations must be pure: the same input yields the same key across calls
/// and process restarts, because the key is the record's identity.
pub trait UrlHasher: Send + Sync {
    fn hash(&self, url: &str) -> String;
}

/// SHA-256 based hasher producing 8 lowercase hex characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl UrlHasher for Sha256Hasher {
    fn hash(&self, url: &str) -> String {
        let digest = Sha256::digest(url.as_bytes());
        hex::encode(&digest[..KEY_BYTES])
    }
}

/// Returns true if `candidate` has the shape of a key produced by [`Sha256Hasher`].
pub fn looks_like_key(candidate: &str) -> bool {
    candidate.len() == KEY_BYTES * 2 && candidate.bytes().all(|b| b.is_ascii_hexdigit())
}

//! Content-addressed document identity.
//!
//! A document id is the 64-bit xxHash (seed `0xCAFEBABE`) of the UTF-8 bytes
//! of `"{author}/{permlink}"`, rendered as standard padded base64. The id is
//! shared by a post's own document and by every vote that targets it, so no
//! lookup table is needed to resolve a vote.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh64::xxh64;

const IDENTITY_SEED: u64 = 0xCAFE_BABE;

/// Identifier of a content document (12 printable characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap an id already produced by the store (e.g. a search hit `_id`).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the document id for `(author, permlink)`.
pub fn identity_of(author: &str, permlink: &str) -> DocumentId {
    let key = format!("{author}/{permlink}");
    let hash = xxh64(key.as_bytes(), IDENTITY_SEED);
    DocumentId(STANDARD.encode(hash.to_le_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn identity_is_deterministic() {
        assert_eq!(identity_of("alice", "post1"), identity_of("alice", "post1"));
    }

    #[test]
    fn identity_has_fixed_printable_length() {
        for (a, p) in [("a", "b"), ("alice", "a-very-long-permlink-with-many-words-2024")] {
            let id = identity_of(a, p);
            assert_eq!(id.as_str().len(), 12);
            assert!(id.as_str().is_ascii());
        }
    }

    #[test]
    fn identity_distinguishes_corpus() {
        let corpus = [
            ("alice", "post1"),
            ("alice", "post2"),
            ("bob", "post1"),
            ("alice/post", "1"),
            ("ali", "ce/post1"),
            ("", "alice/post1"),
        ];
        let ids: HashSet<_> = corpus.iter().map(|(a, p)| identity_of(a, p)).collect();
        assert_eq!(ids.len(), corpus.len());
        assert_ne!(identity_of("alice", "post1"), identity_of("bob", "post1"));
        assert_ne!(identity_of("alice", "post1"), identity_of("alice", "post2"));
    }
}

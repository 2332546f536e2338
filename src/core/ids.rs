//! Typed identifiers for the engine's tables.
//!
//! Ids are plain strings on the wire so scripts can name them, but every
//! table is keyed by its own newtype to keep chunk, version, snippet and cell
//! ids from being mixed up.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

typed_id!(
    /// A contiguous line range of one file.
    ChunkId
);
typed_id!(
    /// One text payload of a chunk.
    ChunkVersionId
);
typed_id!(
    /// The chunk-versions revealed at one tutorial step.
    SnippetId
);
typed_id!(
    /// A step-ordered slot in the tutorial.
    CellId
);

/// Deterministic id source.
///
/// Replaying the same command sequence always yields the same ids, so states
/// can be compared structurally and scripts can refer to ids created by
/// earlier commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdCounter(u64);

impl IdCounter {
    /// Next candidate id with the given prefix, e.g. `chunk-7`.
    pub fn next(&mut self, prefix: &str) -> String {
        self.0 += 1;
        format!("{prefix}-{}", self.0)
    }

    /// Draw ids until `taken` rejects none.
    pub fn fresh<T>(&mut self, prefix: &str, taken: impl Fn(&T) -> bool) -> T
    where
        T: From<String>,
    {
        loop {
            let candidate = T::from(self.next(prefix));
            if !taken(&candidate) {
                return candidate;
            }
        }
    }
}

use thiserror::Error;

use crate::core::ids::{CellId, ChunkId, ChunkVersionId};

/// Failures a command reports back to its caller.
///
/// Unknown ids are not errors: commands naming a missing chunk, version,
/// snippet or cell leave the state unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("chunk {chunk} has {versions} versions and cannot be split")]
    UnsupportedSplit { chunk: ChunkId, versions: usize },

    #[error("no earlier version to merge chunk version {0} into")]
    NoMergeTarget(ChunkVersionId),

    #[error("chunk version {0} is the reference implementation and cannot be merged away")]
    ReferenceVersionMerge(ChunkVersionId),

    #[error("contents for {0} were already uploaded")]
    AlreadyUploaded(String),

    #[error("cell index {index} is past the end of {len} cells")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("cell {cell} does not hold {content}")]
    ContentMismatch { cell: CellId, content: String },
}

pub type EngineResult<T> = Result<T, EngineError>;

//! Chunk store helpers: conversions between contiguous chunks and a flat
//! per-line map, chunk creation, and keeping chunk offsets aligned with the
//! reference file.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::core::error::{EngineError, EngineResult};
use crate::core::ids::{ChunkId, ChunkVersionId};
use crate::core::model::{Chunk, ChunkVersion, InitialChunk, Location, State};
use crate::core::text;

/// Reference-file lines by path, then by 1-based line number.
pub type ChunkLines = BTreeMap<String, BTreeMap<u32, String>>;

/// A freshly created chunk with its single version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedChunk {
    pub chunk: ChunkId,
    pub chunk_version: ChunkVersionId,
    pub location: Location,
    pub line_count: u32,
}

impl AddedChunk {
    pub fn contains_line(&self, line: u32) -> bool {
        line >= self.location.line && line < self.location.line + self.line_count
    }
}

pub fn split_into_lines(chunks: &[InitialChunk]) -> ChunkLines {
    let mut lines = ChunkLines::new();
    for chunk in chunks {
        let per_path = lines
            .entry(chunk.location.path.clone())
            .or_default();
        for (offset, line) in text::to_lines(&chunk.text)
            .into_iter()
            .enumerate()
        {
            per_path.insert(chunk.location.line + offset as u32, line.to_string());
        }
    }
    lines
}

/// Group strictly consecutive lines of each path into one chunk.
pub fn merge_into_initial_chunks(lines: &ChunkLines) -> Vec<InitialChunk> {
    let mut chunks = Vec::new();
    for (path, per_path) in lines {
        let mut current: Option<(u32, Vec<&str>)> = None;
        let mut last_line = 0u32;
        for (&line, content) in per_path {
            let consecutive = current.is_some() && line == last_line + 1;
            if consecutive {
                if let Some((_, texts)) = current.as_mut() {
                    texts.push(content.as_str());
                }
            } else {
                if let Some((start, texts)) = current.take() {
                    chunks.push(InitialChunk::new(path.clone(), start, text::join(&texts)));
                }
                current = Some((line, vec![content.as_str()]));
            }
            last_line = line;
        }
        if let Some((start, texts)) = current {
            chunks.push(InitialChunk::new(path.clone(), start, text::join(&texts)));
        }
    }
    chunks
}

/// Create one chunk plus its version 0 per initial chunk.
pub(crate) fn add_chunks(state: &mut State, initial: Vec<InitialChunk>) -> Vec<AddedChunk> {
    let mut added = Vec::with_capacity(initial.len());
    for InitialChunk { location, text: content } in initial {
        let chunk = state.new_chunk_id();
        let chunk_version = state.new_chunk_version_id();
        let line_count = text::line_count(&content);
        trace!(%chunk, %chunk_version, path = %location.path, line = location.line, "add chunk");

        state.chunks.insert(
            chunk.clone(),
            Chunk {
                location: location.clone(),
                versions: vec![chunk_version.clone()],
            },
        );
        state.chunk_versions.insert(
            chunk_version.clone(),
            ChunkVersion {
                chunk: chunk.clone(),
                text: content,
            },
        );
        added.push(AddedChunk {
            chunk,
            chunk_version,
            location,
            line_count,
        });
    }
    added
}

/// Seed a path with one chunk holding the whole file.
pub(crate) fn upload_file_contents(state: &mut State, path: &str, contents: &str) -> EngineResult<()> {
    if state
        .chunks
        .values()
        .any(|chunk| chunk.location.path == path)
    {
        return Err(EngineError::AlreadyUploaded(path.to_string()));
    }
    let added = add_chunks(state, vec![InitialChunk::new(path, 1, contents)]);
    debug!(path, chunks = added.len(), "uploaded file contents");
    Ok(())
}

/// Move every chunk on `path` that starts after `after_line` by `delta` lines.
pub(crate) fn shift_chunks(state: &mut State, path: &str, after_line: u32, delta: i64) {
    if delta == 0 {
        return;
    }
    for (id, chunk) in state.chunks.iter_mut() {
        if chunk.location.path == path && chunk.location.line > after_line {
            let moved = text::offset_line(chunk.location.line, delta);
            trace!(chunk = %id, from = chunk.location.line, to = moved, "shift chunk");
            chunk.location.line = moved;
        }
    }
}

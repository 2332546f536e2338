//! Text edits in either coordinate frame.
//!
//! An edit names its range relative to the reference file or to one
//! chunk-version. Edits that land in a version 0 change the reference file,
//! so chunks further down the same path are moved to keep the partition
//! aligned. Chunks are never split or merged here.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::core::ids::ChunkVersionId;
use crate::core::model::State;
use crate::core::store;
use crate::core::text::{self, Position, Range, Source, SourcedRange};

/// Replace `range` with `new_text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    pub range: SourcedRange,
    pub new_text: String,
}

#[instrument(level = "debug", skip(state, edit), fields(path = %edit.range.path, source = ?edit.range.relative_to))]
pub(crate) fn edit(state: &mut State, edit: &Edit) {
    let range = &edit.range.range;
    if text::compare(&range.end, &range.start) == Ordering::Less {
        debug!(?range, "range ends before it starts");
        return;
    }

    let (path, reference_line) = match &edit.range.relative_to {
        Source::ChunkVersion(id) => {
            let Some((path, start_line, version)) = state
                .chunk_info(id)
                .map(|info| (info.path.to_string(), info.start_line, info.version))
            else {
                debug!(chunk_version = %id, "chunk version not found");
                return;
            };
            if !replace_in_chunk_version(state, id, range, &edit.new_text) {
                return;
            }
            if version > 0 {
                return;
            }
            (path, start_line + range.start.line.saturating_sub(1))
        }
        Source::ReferenceImplementation => {
            let targets = reference_targets(state, &edit.range);
            if targets.is_empty() {
                debug!("no single chunk contains the range");
                return;
            }
            let mut replaced = false;
            for (chunk_version, first) in targets {
                let local = Range::new(
                    Position::new(range.start.line - first + 1, range.start.character),
                    Position::new(range.end.line - first + 1, range.end.character),
                );
                replaced |= replace_in_chunk_version(state, &chunk_version, &local, &edit.new_text);
            }
            if !replaced {
                return;
            }
            (edit.range.path.clone(), range.start.line)
        }
    };

    let delta = i64::from(text::line_count(&edit.new_text)) - i64::from(range.line_span());
    store::shift_chunks(state, &path, reference_line, delta);
}

/// Version-0 chunk-versions on the range's path whose span holds the whole
/// range, with the reference line each one starts at.
fn reference_targets(state: &State, range: &SourcedRange) -> Vec<(ChunkVersionId, u32)> {
    state
        .chunks
        .iter()
        .filter(|(_, chunk)| chunk.location.path == range.path)
        .filter_map(|(id, chunk)| {
            let (first, last) = state.reference_span(id)?;
            if range.range.start.line < first || range.range.end.line > last {
                return None;
            }
            Some((chunk.versions.first()?.clone(), first))
        })
        .collect()
}

/// Apply `range` (chunk-version frame) and keep line-keyed visibility rules
/// on the same lines. Returns false when the range misses the text.
fn replace_in_chunk_version(
    state: &mut State,
    chunk_version: &ChunkVersionId,
    range: &Range,
    new_text: &str,
) -> bool {
    let Some(cv) = state.chunk_versions.get_mut(chunk_version) else {
        return false;
    };
    let Some(replaced) = text::replace(&cv.text, range, new_text) else {
        debug!(%chunk_version, "range falls outside chunk version text");
        return false;
    };
    cv.text = replaced;
    let total = text::line_count(&cv.text);
    trace!(%chunk_version, lines = total, "replaced text");

    // 0-based offsets of the replaced lines.
    let first = range.start.line - 1;
    let last = range.end.line.max(range.start.line) - 1;
    let inserted = text::line_count(new_text);
    let delta = i64::from(inserted) - i64::from(last - first + 1);

    state.visibility_rules.remap(chunk_version, |line| {
        let moved = if line > last {
            (i64::from(line) + delta) as u32
        } else if line >= first + inserted {
            return None;
        } else {
            line
        };
        (moved < total).then(|| (chunk_version.clone(), moved))
    });
    true
}

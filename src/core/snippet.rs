//! Snippet insertion and chunk splitting.
//!
//! Inserting a snippet is where the chunk partition changes shape: requested
//! lines that earlier steps already revealed are deduplicated, the remaining
//! lines become new chunks, and existing single-version chunks that overlap
//! them are split so every reference-file line belongs to exactly one chunk.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use indexmap::IndexMap;
use tracing::{debug, instrument, trace};

use crate::core::cells::Content;
use crate::core::error::{EngineError, EngineResult};
use crate::core::ids::{ChunkId, ChunkVersionId, SnippetId};
use crate::core::model::{InitialChunk, Snippet, State, Visibility};
use crate::core::store::{self, AddedChunk, ChunkLines};
use crate::core::text::{self, Source};

/// Where lines removed from a chunk went: reference line → (chunk-version, 0-based offset).
pub(crate) type Relocations = BTreeMap<u32, (ChunkVersionId, u32)>;

/// Cell index for a new cell: the explicit one, else right after the
/// selected cell, else the top.
pub(crate) fn insertion_index(state: &State, index: Option<usize>) -> EngineResult<usize> {
    match index {
        Some(index) if index > state.cells.len() => Err(EngineError::IndexOutOfBounds {
            index,
            len: state.cells.len(),
        }),
        Some(index) => Ok(index),
        None => Ok(state
            .selected_cell
            .as_ref()
            .and_then(|cell| state.cells.index_of(cell))
            .map_or(0, |i| i + 1)),
    }
}

#[instrument(level = "debug", skip(state, fragments), fields(fragments = fragments.len()))]
pub(crate) fn insert_snippet(
    state: &mut State,
    index: Option<usize>,
    fragments: &[InitialChunk],
) -> EngineResult<SnippetId> {
    let cell_index = insertion_index(state, index)?;
    let order = state.snippet_order();
    let position = state.cells.snippets_before(cell_index);
    let snippet_id = state.new_snippet_id();

    let mut requested = store::split_into_lines(fragments);
    let revealed_earlier = dedup_against_earlier(state, &order[..position], &mut requested);
    drop_multi_version_overlaps(state, &mut requested);

    let added = store::add_chunks(state, store::merge_into_initial_chunks(&requested));
    split_existing_chunks(state, &order[position..], &added)?;

    for (chunk_version, line) in revealed_earlier {
        state
            .visibility_rules
            .set(snippet_id.clone(), chunk_version, line, Visibility::Visible);
    }
    state.snippets.insert(
        snippet_id.clone(),
        Snippet {
            chunk_versions_added: added
                .iter()
                .map(|a| a.chunk_version.clone())
                .collect(),
        },
    );

    let cell = state.new_cell_id();
    state
        .cells
        .insert_at(cell_index, cell.clone(), Content::Snippet(snippet_id.clone()))?;
    state.selected_cell = Some(cell);

    debug!(snippet = %snippet_id, cell_index, position, new_chunks = added.len(), "inserted snippet");
    Ok(snippet_id)
}

/// Remove requested lines that earlier snippets already show.
///
/// Lines of an unedited chunk become VISIBLE rules for the new snippet.
/// Once an edited version of a chunk is seen, older copies of that chunk no
/// longer produce rules, though their lines are still consumed.
fn dedup_against_earlier(
    state: &State,
    earlier: &[SnippetId],
    requested: &mut ChunkLines,
) -> Vec<(ChunkVersionId, u32)> {
    let mut edited: HashSet<ChunkId> = HashSet::new();
    let mut rules = Vec::new();

    for snippet_id in earlier.iter().rev() {
        let Some(snippet) = state.snippets.get(snippet_id) else {
            continue;
        };
        for chunk_version in &snippet.chunk_versions_added {
            let Some(info) = state.chunk_info(chunk_version) else {
                continue;
            };
            if info.version > 0 {
                edited.insert(info.chunk.clone());
            }
            let Some((first, last)) = state.reference_span(info.chunk) else {
                continue;
            };
            let Some(lines) = requested.get_mut(info.path) else {
                continue;
            };

            let reveal = info.version == 0 && !edited.contains(info.chunk);
            for line in first..=last {
                if lines.remove(&line).is_some() && reveal {
                    trace!(%chunk_version, line, "line already revealed");
                    rules.push((chunk_version.clone(), line - first));
                }
            }
        }
    }
    rules
}

/// Chunks with more than one version are never split; their lines cannot be
/// revealed again.
fn drop_multi_version_overlaps(state: &State, requested: &mut ChunkLines) {
    for (chunk_id, chunk) in &state.chunks {
        if chunk.versions.len() < 2 {
            continue;
        }
        let Some((first, last)) = state.reference_span(chunk_id) else {
            continue;
        };
        if let Some(lines) = requested.get_mut(&chunk.location.path) {
            let before = lines.len();
            lines.retain(|line, _| *line < first || *line > last);
            if lines.len() != before {
                debug!(chunk = %chunk_id, dropped = before - lines.len(), "skipped lines of edited chunk");
            }
        }
    }
}

/// Split unedited chunks at or after the insertion point (and ones not yet
/// in any snippet) wherever they overlap the new chunks.
fn split_existing_chunks(state: &mut State, later: &[SnippetId], added: &[AddedChunk]) -> EngineResult<()> {
    if added.is_empty() {
        return Ok(());
    }
    let new_chunks: HashSet<&ChunkId> = added.iter().map(|a| &a.chunk).collect();

    let mut candidates: Vec<(ChunkVersionId, Option<SnippetId>)> = Vec::new();
    for snippet_id in later {
        let Some(snippet) = state.snippets.get(snippet_id) else {
            continue;
        };
        for chunk_version in &snippet.chunk_versions_added {
            if state
                .chunk_info(chunk_version)
                .is_some_and(|info| info.version == 0)
            {
                candidates.push((chunk_version.clone(), Some(snippet_id.clone())));
            }
        }
    }
    for (chunk_id, chunk) in &state.chunks {
        if new_chunks.contains(chunk_id) {
            continue;
        }
        if let Some(v0) = chunk.versions.first() {
            if !state.is_in_any_snippet(v0) {
                candidates.push((v0.clone(), None));
            }
        }
    }

    let mut removals: IndexMap<ChunkId, Relocations> = IndexMap::new();
    let mut owner_rules: Vec<(SnippetId, ChunkVersionId, u32)> = Vec::new();
    for (chunk_version, owner) in &candidates {
        let Some(info) = state.chunk_info(chunk_version) else {
            continue;
        };
        for new in added
            .iter()
            .filter(|a| a.location.path == info.path)
        {
            for line in (info.start_line..=info.end_line).filter(|l| new.contains_line(*l)) {
                let offset = line - new.location.line;
                removals
                    .entry(info.chunk.clone())
                    .or_default()
                    .insert(line, (new.chunk_version.clone(), offset));
                if let Some(owner) = owner {
                    owner_rules.push((owner.clone(), new.chunk_version.clone(), offset));
                }
            }
        }
    }

    for (chunk_id, relocations) in removals {
        let lines: BTreeSet<u32> = relocations.keys().copied().collect();
        remove_lines(state, &chunk_id, &lines, &relocations)?;
    }
    for (owner, chunk_version, offset) in owner_rules {
        state
            .visibility_rules
            .set_default(owner, chunk_version, offset, Visibility::Visible);
    }
    Ok(())
}

/// Cut `lines` (reference-file numbering) out of a single-version chunk.
///
/// The remaining lines become new chunks whose versions replace the old one,
/// in place, in every snippet that showed it. Visibility rules, suppressions
/// and selections on the old version move to the piece that now holds their
/// line, or to `relocated` for lines that moved elsewhere. Returns the new
/// chunk-version ids.
#[instrument(level = "debug", skip(state, relocated))]
pub(crate) fn remove_lines(
    state: &mut State,
    chunk_id: &ChunkId,
    lines: &BTreeSet<u32>,
    relocated: &Relocations,
) -> EngineResult<Vec<ChunkVersionId>> {
    let Some(chunk) = state.chunks.get(chunk_id) else {
        debug!("chunk not found");
        return Ok(Vec::new());
    };
    if chunk.versions.len() != 1 {
        return Err(EngineError::UnsupportedSplit {
            chunk: chunk_id.clone(),
            versions: chunk.versions.len(),
        });
    }
    let old = chunk.versions[0].clone();
    let location = chunk.location.clone();
    let Some(old_text) = state
        .chunk_versions
        .get(&old)
        .map(|cv| cv.text.clone())
    else {
        debug!(chunk_version = %old, "chunk version not found");
        return Ok(Vec::new());
    };

    let mut remaining = store::split_into_lines(&[InitialChunk {
        location: location.clone(),
        text: old_text,
    }]);
    if let Some(per_path) = remaining.get_mut(&location.path) {
        per_path.retain(|line, _| !lines.contains(line));
    }
    let pieces = store::add_chunks(state, store::merge_into_initial_chunks(&remaining));
    let piece_ids: Vec<ChunkVersionId> = pieces
        .iter()
        .map(|p| p.chunk_version.clone())
        .collect();

    for snippet in state.snippets.values_mut() {
        if let Some(pos) = snippet
            .chunk_versions_added
            .iter()
            .position(|cv| cv == &old)
        {
            snippet
                .chunk_versions_added
                .splice(pos..=pos, piece_ids.iter().cloned());
        }
    }

    // 0-based offset in the old version → new home.
    let locate = |offset: u32| -> Option<(ChunkVersionId, u32)> {
        let line = location.line + offset;
        pieces
            .iter()
            .find(|p| p.contains_line(line))
            .map(|p| (p.chunk_version.clone(), line - p.location.line))
            .or_else(|| relocated.get(&line).cloned())
    };

    state.visibility_rules.remap(&old, &locate);
    state
        .visibility_rules
        .remap_suppressions(&old, &piece_ids);

    for selection in state.selections.iter_mut() {
        if selection.relative_to.chunk_version() != Some(&old) {
            continue;
        }
        let anchor_offset = selection.anchor.line.saturating_sub(1);
        if let Some((target, target_offset)) = locate(anchor_offset) {
            let delta = i64::from(target_offset) - i64::from(anchor_offset);
            selection.anchor.line = text::offset_line(selection.anchor.line, delta);
            selection.active.line = text::offset_line(selection.active.line, delta);
            selection.relative_to = Source::ChunkVersion(target);
        }
    }
    state
        .selections
        .retain(|s| s.relative_to.chunk_version() != Some(&old));

    state.chunks.shift_remove(chunk_id);
    state.chunk_versions.shift_remove(&old);
    state.visibility_rules.drop_chunk_version(&old);

    debug!(removed = lines.len(), pieces = piece_ids.len(), "split chunk");
    Ok(piece_ids)
}

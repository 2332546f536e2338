//! Partial-program reconstruction.
//!
//! Rebuilds what one file looks like at one tutorial step, either as the
//! whole cumulative file (snapshot view) or as only what the step reveals
//! (snippet view), with per-line visibility and selections mapped into the
//! rebuilt text's coordinates.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::core::ids::{ChunkId, ChunkVersionId, SnippetId};
use crate::core::model::{State, Visibility};
use crate::core::text::{self, Position, Range, Selection, Source};

/// Which lines of a step a partial program shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    /// Everything the reader has seen up to and including the step.
    #[default]
    Snapshot,
    /// Only what the step itself reveals.
    Snippet,
}

/// First output line (1-based) of each chunk-version's run of lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkVersionOffset {
    pub line: u32,
    pub chunk_version: ChunkVersionId,
}

/// A selection in the rebuilt text's coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetSelection {
    pub anchor: Position,
    pub active: Position,
}

/// One rebuilt line and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramLine {
    /// Snippet that added the line's chunk-version, if any.
    pub snippet: Option<SnippetId>,
    pub chunk: ChunkId,
    pub chunk_version: ChunkVersionId,
    /// 1-based position in the full snapshot, before filtering.
    pub offset: u32,
    pub visibility: Visibility,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialProgram {
    pub path: String,
    pub text: String,
    pub visibilities: Vec<Visibility>,
    pub chunk_version_offsets: Vec<ChunkVersionOffset>,
    pub selections: Vec<SnippetSelection>,
    /// Set only when every selection names the same chunk-version and that
    /// version is part of the output.
    pub selected_chunk_version: Option<ChunkVersionId>,
    pub lines: Vec<ProgramLine>,
}

/// Latest chunk-version of every chunk on `path` as of `until` (or of the
/// last snippet), in reference-file order.
pub fn snapshot_ordered_chunk_versions(state: &State, until: Option<&SnippetId>, path: &str) -> Vec<ChunkVersionId> {
    sorted_chunk_versions_by_path(state, until)
        .remove(path)
        .unwrap_or_default()
}

fn sorted_chunk_versions_by_path(state: &State, until: Option<&SnippetId>) -> BTreeMap<String, Vec<ChunkVersionId>> {
    let mut latest: BTreeMap<String, IndexMap<ChunkId, ChunkVersionId>> = BTreeMap::new();
    for snippet_id in state.snippet_order() {
        if let Some(snippet) = state.snippets.get(&snippet_id) {
            for chunk_version in &snippet.chunk_versions_added {
                let Some(chunk_id) = state.chunk_of(chunk_version) else {
                    continue;
                };
                let Some(chunk) = state.chunks.get(chunk_id) else {
                    continue;
                };
                latest
                    .entry(chunk.location.path.clone())
                    .or_default()
                    .insert(chunk_id.clone(), chunk_version.clone());
            }
        }
        if until == Some(&snippet_id) {
            break;
        }
    }

    latest
        .into_iter()
        .map(|(path, per_chunk)| {
            let sorted = per_chunk
                .into_iter()
                .sorted_by_key(|(chunk_id, _)| {
                    state
                        .chunks
                        .get(chunk_id)
                        .map_or(u32::MAX, |c| c.location.line)
                })
                .map(|(_, chunk_version)| chunk_version)
                .collect();
            (path, sorted)
        })
        .collect()
}

/// Rebuild `path` as of `snippet`. `None` when the snippet does not exist.
pub fn partial_program(state: &State, snippet_id: &SnippetId, path: &str, view: View) -> Option<PartialProgram> {
    let snippet = state.snippets.get(snippet_id)?;
    let ordered = snapshot_ordered_chunk_versions(state, Some(snippet_id), path);
    let owners = chunk_version_owners(state);
    let rules = &state.visibility_rules;

    let mut lines = Vec::new();
    let mut offset = 1u32;
    for chunk_version in &ordered {
        let Some(record) = state.chunk_versions.get(chunk_version) else {
            continue;
        };
        let added_here = snippet
            .chunk_versions_added
            .contains(chunk_version);
        let suppressed = rules.is_suppressed(snippet_id, chunk_version);

        for (index, line_text) in text::to_lines(&record.text)
            .into_iter()
            .enumerate()
        {
            let rule = rules.get(snippet_id, chunk_version, index as u32);
            let include = match view {
                View::Snapshot => !suppressed && rule != Some(Visibility::Hidden),
                View::Snippet => added_here || rule == Some(Visibility::Visible),
            };
            if include {
                let default = if added_here { Visibility::Visible } else { Visibility::Hidden };
                lines.push(ProgramLine {
                    snippet: owners.get(chunk_version).cloned(),
                    chunk: record.chunk.clone(),
                    chunk_version: chunk_version.clone(),
                    offset,
                    visibility: rule.unwrap_or(default),
                    text: line_text.to_string(),
                });
            }
            offset += 1;
        }
    }

    let chunk_version_offsets = chunk_version_offsets(&lines);
    let selections = snippet_selections(state, path, &chunk_version_offsets);
    let selected_chunk_version = selected_chunk_version(&state.selections, &lines);

    Some(PartialProgram {
        path: path.to_string(),
        text: text::join(
            &lines
                .iter()
                .map(|l| l.text.as_str())
                .collect::<Vec<_>>(),
        ),
        visibilities: lines
            .iter()
            .map(|l| l.visibility)
            .collect(),
        chunk_version_offsets,
        selections,
        selected_chunk_version,
        lines,
    })
}

/// Snippet that added each chunk-version; later snippets win.
fn chunk_version_owners(state: &State) -> HashMap<&ChunkVersionId, SnippetId> {
    let mut owners = HashMap::new();
    for snippet_id in state.snippet_order() {
        if let Some(snippet) = state.snippets.get(&snippet_id) {
            for chunk_version in &snippet.chunk_versions_added {
                owners.insert(chunk_version, snippet_id.clone());
            }
        }
    }
    owners
}

fn chunk_version_offsets(lines: &[ProgramLine]) -> Vec<ChunkVersionOffset> {
    let mut offsets: Vec<ChunkVersionOffset> = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        if offsets.last().map(|o| &o.chunk_version) != Some(&line.chunk_version) {
            offsets.push(ChunkVersionOffset {
                line: index as u32 + 1,
                chunk_version: line.chunk_version.clone(),
            });
        }
    }
    offsets
}

fn snippet_selections(state: &State, path: &str, offsets: &[ChunkVersionOffset]) -> Vec<SnippetSelection> {
    let mut out = Vec::new();
    for ChunkVersionOffset { line, chunk_version } in offsets {
        let offset = i64::from(*line) - 1;

        out.extend(
            state
                .selections
                .iter()
                .filter(|s| s.relative_to.chunk_version() == Some(chunk_version))
                .map(|s| shift_selection(s, offset)),
        );

        // Reference selections only map onto unedited copies.
        let Some(info) = state.chunk_info(chunk_version) else {
            continue;
        };
        if info.version != 0 {
            continue;
        }
        let chunk_range = Range::whole_lines(info.start_line, info.end_line);
        let shift = offset + 1 - i64::from(info.start_line);
        out.extend(
            state
                .selections
                .iter()
                .filter(|s| s.relative_to == Source::ReferenceImplementation && s.path == path)
                .filter_map(|s| text::intersect(s, &chunk_range))
                .map(|s| shift_selection(&s, shift)),
        );
    }
    out
}

fn shift_selection(selection: &Selection, delta: i64) -> SnippetSelection {
    let shift = |p: Position| Position::new(text::offset_line(p.line, delta), p.character);
    SnippetSelection {
        anchor: shift(selection.anchor),
        active: shift(selection.active),
    }
}

fn selected_chunk_version(selections: &[Selection], lines: &[ProgramLine]) -> Option<ChunkVersionId> {
    let mut selected: Option<&ChunkVersionId> = None;
    for selection in selections {
        match &selection.relative_to {
            Source::ReferenceImplementation => return None,
            Source::ChunkVersion(id) => match selected {
                None => selected = Some(id),
                Some(current) if current != id => return None,
                Some(_) => {}
            },
        }
    }
    let selected = selected?;
    lines
        .iter()
        .any(|l| &l.chunk_version == selected)
        .then(|| selected.clone())
}

/// The uploaded file for `path` as it currently stands.
pub fn reference_implementation_text(state: &State, path: &str) -> Option<String> {
    let texts: Vec<&str> = state
        .chunks
        .values()
        .filter(|chunk| chunk.location.path == path)
        .sorted_by_key(|chunk| chunk.location.line)
        .filter_map(|chunk| chunk.versions.first())
        .filter_map(|v0| state.chunk_versions.get(v0))
        .map(|cv| cv.text.as_str())
        .collect();
    if texts.is_empty() { None } else { Some(text::join(&texts)) }
}

/// Every file's revealed text as of `until` (or of the last snippet).
pub fn file_contents(state: &State, until: Option<&SnippetId>) -> BTreeMap<String, String> {
    sorted_chunk_versions_by_path(state, until)
        .into_iter()
        .map(|(path, versions)| {
            let texts: Vec<&str> = versions
                .iter()
                .filter_map(|cv| state.chunk_versions.get(cv))
                .map(|cv| cv.text.as_str())
                .collect();
            (path, text::join(&texts))
        })
        .collect()
}

/// Paths a snippet adds content to.
pub fn snippet_paths(state: &State, snippet: &SnippetId) -> Vec<String> {
    let Some(snippet) = state.snippets.get(snippet) else {
        return Vec::new();
    };
    snippet
        .chunk_versions_added
        .iter()
        .filter_map(|cv| state.chunk_info(cv))
        .map(|info| info.path.to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Every uploaded path.
pub fn active_paths(state: &State) -> Vec<String> {
    state
        .chunks
        .values()
        .map(|chunk| chunk.location.path.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

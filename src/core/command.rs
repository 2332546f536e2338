//! Commands and the state-transition function.
//!
//! `apply` never mutates its input. It works on a clone and hands back either
//! the new state or the error, so a failed command leaves nothing half done.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::core::cells::Content;
use crate::core::edit::{self, Edit};
use crate::core::error::{EngineError, EngineResult};
use crate::core::ids::{CellId, ChunkId, ChunkVersionId, SnippetId};
use crate::core::model::{InitialChunk, Snippet, State, Visibility};
use crate::core::snippet;
use crate::core::store;
use crate::core::text::{Selection, SourcedRange};
use crate::core::versions::{self, MergeStrategy};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Partition a file into one reference chunk.
    UploadFileContents { path: String, contents: String },
    /// Reveal reference lines in a new step. Without an index the step goes
    /// after the selected cell.
    InsertSnippet {
        #[serde(default)]
        index: Option<usize>,
        fragments: Vec<InitialChunk>,
    },
    Fork { chunk_version: ChunkVersionId },
    PickChunkVersion {
        snippet: SnippetId,
        chunk: ChunkId,
        chunk_version: ChunkVersionId,
    },
    Merge {
        snippet: SnippetId,
        chunk_version: ChunkVersionId,
        strategy: MergeStrategy,
    },
    Edit { range: SourcedRange, new_text: String },
    SetSelections { selections: Vec<Selection> },
    /// Remove a cell. Deleting a snippet cell deletes the snippet and its
    /// visibility rules, but not its chunks.
    DeleteContent { cell: CellId, content: Content },
    SelectCell { cell: Option<CellId> },
    /// Add a cell for existing content. A snippet may only sit in one cell.
    InsertCell {
        #[serde(default)]
        index: Option<usize>,
        content: Content,
    },
    MoveCell { cell: CellId, to: usize },
    /// Override one line's visibility in one step, or clear the override.
    SetLineVisibility {
        snippet: SnippetId,
        chunk_version: ChunkVersionId,
        line: u32,
        visibility: Option<Visibility>,
    },
    /// Hide every line of a chunk-version in one step's snapshot.
    SuppressChunkVersion {
        snippet: SnippetId,
        chunk_version: ChunkVersionId,
        suppressed: bool,
    },
}

impl Command {
    /// Stable name of the command, matching its serialized tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::UploadFileContents { .. } => "upload_file_contents",
            Command::InsertSnippet { .. } => "insert_snippet",
            Command::Fork { .. } => "fork",
            Command::PickChunkVersion { .. } => "pick_chunk_version",
            Command::Merge { .. } => "merge",
            Command::Edit { .. } => "edit",
            Command::SetSelections { .. } => "set_selections",
            Command::DeleteContent { .. } => "delete_content",
            Command::SelectCell { .. } => "select_cell",
            Command::InsertCell { .. } => "insert_cell",
            Command::MoveCell { .. } => "move_cell",
            Command::SetLineVisibility { .. } => "set_line_visibility",
            Command::SuppressChunkVersion { .. } => "suppress_chunk_version",
        }
    }
}

/// Apply one command to a state, producing the next state.
#[instrument(level = "debug", skip_all, fields(kind = command.kind()))]
pub fn apply(state: &State, command: &Command) -> EngineResult<State> {
    let mut next = state.clone();
    match command {
        Command::UploadFileContents { path, contents } => {
            store::upload_file_contents(&mut next, path, contents)?;
        }
        Command::InsertSnippet { index, fragments } => {
            snippet::insert_snippet(&mut next, *index, fragments)?;
        }
        Command::Fork { chunk_version } => {
            versions::fork(&mut next, chunk_version);
        }
        Command::PickChunkVersion {
            snippet,
            chunk,
            chunk_version,
        } => versions::pick_chunk_version(&mut next, snippet, chunk, chunk_version),
        Command::Merge {
            snippet,
            chunk_version,
            strategy,
        } => versions::merge(&mut next, snippet, chunk_version, *strategy)?,
        Command::Edit { range, new_text } => edit::edit(
            &mut next,
            &Edit {
                range: range.clone(),
                new_text: new_text.clone(),
            },
        ),
        Command::SetSelections { selections } => next.selections = selections.clone(),
        Command::DeleteContent { cell, content } => delete_content(&mut next, cell, content)?,
        Command::SelectCell { cell } => select_cell(&mut next, cell.as_ref()),
        Command::InsertCell { index, content } => insert_cell(&mut next, *index, content)?,
        Command::MoveCell { cell, to } => next.cells.move_to(cell, *to)?,
        Command::SetLineVisibility {
            snippet,
            chunk_version,
            line,
            visibility,
        } => set_line_visibility(&mut next, snippet, chunk_version, *line, *visibility),
        Command::SuppressChunkVersion {
            snippet,
            chunk_version,
            suppressed,
        } => {
            if references_exist(&next, snippet, chunk_version) {
                next.visibility_rules
                    .set_suppressed(snippet.clone(), chunk_version.clone(), *suppressed);
            }
        }
    }
    Ok(next)
}

/// Apply commands in order, stopping at the first failure.
pub fn apply_all<'a>(state: &State, commands: impl IntoIterator<Item = &'a Command>) -> EngineResult<State> {
    commands
        .into_iter()
        .try_fold(state.clone(), |current, command| apply(&current, command))
}

fn delete_content(state: &mut State, cell: &CellId, content: &Content) -> EngineResult<()> {
    let Some(index) = state.cells.index_of(cell) else {
        debug!(%cell, "cell not found");
        return Ok(());
    };
    let held = state
        .cells
        .get(cell)
        .map(|c| &c.content);
    if held != Some(content) {
        return Err(EngineError::ContentMismatch {
            cell: cell.clone(),
            content: content.to_string(),
        });
    }

    if index > 0 {
        state.selected_cell = state.cells.id_at(index - 1).cloned();
    } else if state.selected_cell.as_ref() == Some(cell) {
        state.selected_cell = None;
    }
    state.cells.delete_by_id(cell);

    if let Content::Snippet(snippet) = content {
        state.snippets.shift_remove(snippet);
        state.visibility_rules.clear_snippet(snippet);
    }
    Ok(())
}

fn select_cell(state: &mut State, cell: Option<&CellId>) {
    match cell {
        Some(cell) if !state.cells.contains(cell) => debug!(%cell, "cell not found"),
        _ => state.selected_cell = cell.cloned(),
    }
}

fn insert_cell(state: &mut State, index: Option<usize>, content: &Content) -> EngineResult<()> {
    if let Content::Snippet(snippet) = content {
        if !state.snippets.contains_key(snippet) || state.cells.cell_of_snippet(snippet).is_some() {
            debug!(%snippet, "snippet missing or already placed");
            return Ok(());
        }
    }
    let index = snippet::insertion_index(state, index)?;
    let cell = state.new_cell_id();
    state
        .cells
        .insert_at(index, cell.clone(), content.clone())?;
    state.selected_cell = Some(cell);
    Ok(())
}

fn set_line_visibility(
    state: &mut State,
    snippet: &SnippetId,
    chunk_version: &ChunkVersionId,
    line: u32,
    visibility: Option<Visibility>,
) {
    if !references_exist(state, snippet, chunk_version) {
        return;
    }
    match visibility {
        Some(visibility) => state
            .visibility_rules
            .set(snippet.clone(), chunk_version.clone(), line, visibility),
        None => state
            .visibility_rules
            .remove(snippet, chunk_version, line),
    }
}

fn references_exist(state: &State, snippet: &SnippetId, chunk_version: &ChunkVersionId) -> bool {
    let found = state.snippets.contains_key(snippet) && state.chunk_versions.contains_key(chunk_version);
    if !found {
        debug!(%snippet, %chunk_version, "snippet or chunk version not found");
    }
    found
}

/// Snippets a state would render, paired with their records.
pub fn snippets_in_order(state: &State) -> Vec<(SnippetId, &Snippet)> {
    state
        .snippet_order()
        .into_iter()
        .filter_map(|id| {
            let snippet = state.snippets.get(&id)?;
            Some((id, snippet))
        })
        .collect()
}

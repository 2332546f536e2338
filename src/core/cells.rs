//! Step ordering.
//!
//! Cells place content (snippets, text blocks, console output) in tutorial
//! order. The engine only trusts the order of snippet cells; text blocks and
//! outputs are opaque ids owned by other stores.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::error::{EngineError, EngineResult};
use crate::core::ids::{CellId, SnippetId};

/// What a cell holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Content {
    Snippet(SnippetId),
    TextBlock(String),
    Output(String),
}

impl Content {
    pub fn snippet(&self) -> Option<&SnippetId> {
        match self {
            Content::Snippet(id) => Some(id),
            _ => None,
        }
    }

    pub fn content_id(&self) -> &str {
        match self {
            Content::Snippet(id) => id.as_str(),
            Content::TextBlock(id) | Content::Output(id) => id,
        }
    }
}

impl fmt::Display for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Content::Snippet(id) => write!(f, "snippet {id}"),
            Content::TextBlock(id) => write!(f, "text block {id}"),
            Content::Output(id) => write!(f, "output {id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub content: Content,
}

/// Cells in tutorial order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cells(IndexMap<CellId, Cell>);

impl Cells {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, id: &CellId) -> Option<&Cell> {
        self.0.get(id)
    }

    pub fn contains(&self, id: &CellId) -> bool {
        self.0.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CellId, &Cell)> {
        self.0.iter()
    }

    pub fn id_at(&self, index: usize) -> Option<&CellId> {
        self.0.get_index(index).map(|(id, _)| id)
    }

    pub fn index_of(&self, id: &CellId) -> Option<usize> {
        self.0.get_index_of(id)
    }

    pub fn ordered_content_ids(&self) -> Vec<&Content> {
        self.0.values().map(|cell| &cell.content).collect()
    }

    /// Snippet ids in cell order. This is the only snippet order the engine uses.
    pub fn snippet_order(&self) -> Vec<SnippetId> {
        self.0
            .values()
            .filter_map(|cell| cell.content.snippet().cloned())
            .collect()
    }

    /// Cell holding the given snippet.
    pub fn cell_of_snippet(&self, snippet: &SnippetId) -> Option<&CellId> {
        self.0
            .iter()
            .find(|(_, cell)| cell.content.snippet() == Some(snippet))
            .map(|(id, _)| id)
    }

    /// How many snippet cells come before cell index `index`.
    pub fn snippets_before(&self, index: usize) -> usize {
        self.0
            .values()
            .take(index)
            .filter(|cell| cell.content.snippet().is_some())
            .count()
    }

    pub fn insert_at(&mut self, index: usize, id: CellId, content: Content) -> EngineResult<()> {
        if index > self.0.len() {
            return Err(EngineError::IndexOutOfBounds {
                index,
                len: self.0.len(),
            });
        }
        self.0.shift_insert(index, id, Cell { content });
        Ok(())
    }

    pub fn delete_by_id(&mut self, id: &CellId) -> Option<Cell> {
        self.0.shift_remove(id)
    }

    /// Move a cell so it ends up at `to`.
    pub fn move_to(&mut self, id: &CellId, to: usize) -> EngineResult<()> {
        let Some(from) = self.0.get_index_of(id) else {
            return Ok(());
        };
        if to >= self.0.len() {
            return Err(EngineError::IndexOutOfBounds {
                index: to,
                len: self.0.len(),
            });
        }
        self.0.move_index(from, to);
        Ok(())
    }
}

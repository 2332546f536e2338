//! Engine state: id-indexed tables plus the visibility rules and selections
//! that refer into them.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::cells::Cells;
use crate::core::ids::{CellId, ChunkId, ChunkVersionId, IdCounter, SnippetId};
use crate::core::text::{self, Selection};

/// Where a chunk starts in the reference file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub path: String,
    /// 1-based line in the reference file's current numbering.
    pub line: u32,
}

impl Location {
    pub fn new(path: impl Into<String>, line: u32) -> Self {
        Self {
            path: path.into(),
            line,
        }
    }
}

/// Reference-file lines to reveal, as handed to snippet insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialChunk {
    pub location: Location,
    pub text: String,
}

impl InitialChunk {
    pub fn new(path: impl Into<String>, line: u32, text: impl Into<String>) -> Self {
        Self {
            location: Location::new(path, line),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub location: Location,
    /// `versions[0]` is the reference implementation text.
    pub versions: Vec<ChunkVersionId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkVersion {
    pub chunk: ChunkId,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    /// Chunk-versions first revealed by this snippet, in insertion order.
    pub chunk_versions_added: Vec<ChunkVersionId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Visible,
    Hidden,
}

type RuleKey = (SnippetId, ChunkVersionId, u32);

/// Per-snippet, per-chunk-version, per-line overrides of the default
/// show/hide policy.
///
/// Line offsets are 0-based within the chunk-version's own text. A
/// suppressed (snippet, chunk-version) pair shows nothing of that version in
/// the snippet's snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RulesRepr", into = "RulesRepr")]
pub struct VisibilityRules {
    rules: BTreeMap<RuleKey, Visibility>,
    suppressed: BTreeSet<(SnippetId, ChunkVersionId)>,
}

impl VisibilityRules {
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.suppressed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn get(&self, snippet: &SnippetId, chunk_version: &ChunkVersionId, line: u32) -> Option<Visibility> {
        self.rules
            .get(&(snippet.clone(), chunk_version.clone(), line))
            .copied()
    }

    pub fn set(&mut self, snippet: SnippetId, chunk_version: ChunkVersionId, line: u32, visibility: Visibility) {
        self.rules
            .insert((snippet, chunk_version, line), visibility);
    }

    /// Set a rule unless one already exists for that line.
    pub fn set_default(&mut self, snippet: SnippetId, chunk_version: ChunkVersionId, line: u32, visibility: Visibility) {
        self.rules
            .entry((snippet, chunk_version, line))
            .or_insert(visibility);
    }

    pub fn remove(&mut self, snippet: &SnippetId, chunk_version: &ChunkVersionId, line: u32) {
        self.rules
            .remove(&(snippet.clone(), chunk_version.clone(), line));
    }

    pub fn is_suppressed(&self, snippet: &SnippetId, chunk_version: &ChunkVersionId) -> bool {
        self.suppressed
            .contains(&(snippet.clone(), chunk_version.clone()))
    }

    pub fn set_suppressed(&mut self, snippet: SnippetId, chunk_version: ChunkVersionId, suppressed: bool) {
        if suppressed {
            self.suppressed.insert((snippet, chunk_version));
        } else {
            self.suppressed.remove(&(snippet, chunk_version));
        }
    }

    /// All rules as `(snippet, chunk_version, line, visibility)`.
    pub fn iter(&self) -> impl Iterator<Item = (&SnippetId, &ChunkVersionId, u32, Visibility)> {
        self.rules
            .iter()
            .map(|((s, cv, line), vis)| (s, cv, *line, *vis))
    }

    pub fn for_snippet<'a>(
        &'a self,
        snippet: &'a SnippetId,
    ) -> impl Iterator<Item = (&'a ChunkVersionId, u32, Visibility)> + 'a {
        self.iter()
            .filter(move |(s, ..)| *s == snippet)
            .map(|(_, cv, line, vis)| (cv, line, vis))
    }

    pub fn suppressions(&self) -> impl Iterator<Item = &(SnippetId, ChunkVersionId)> {
        self.suppressed.iter()
    }

    /// Drop everything recorded for a snippet.
    pub fn clear_snippet(&mut self, snippet: &SnippetId) {
        self.rules
            .retain(|(s, ..), _| s != snippet);
        self.suppressed
            .retain(|(s, _)| s != snippet);
    }

    /// Drop rules and suppressions of `snippet` whose chunk-version fails `keep`.
    pub fn retain_for_snippet(&mut self, snippet: &SnippetId, keep: impl Fn(&ChunkVersionId) -> bool) {
        self.rules
            .retain(|(s, cv, _), _| s != snippet || keep(cv));
        self.suppressed
            .retain(|(s, cv)| s != snippet || keep(cv));
    }

    /// Forget a chunk-version entirely.
    pub fn drop_chunk_version(&mut self, chunk_version: &ChunkVersionId) {
        self.rules
            .retain(|(_, cv, _), _| cv != chunk_version);
        self.suppressed
            .retain(|(_, cv)| cv != chunk_version);
    }

    /// Move every rule on `from` to wherever `map` sends its line.
    ///
    /// Rules whose line maps to `None` are dropped. An existing rule at the
    /// destination wins over a moved one.
    pub fn remap(&mut self, from: &ChunkVersionId, map: impl Fn(u32) -> Option<(ChunkVersionId, u32)>) {
        let moved: Vec<(RuleKey, Visibility)> = self
            .rules
            .iter()
            .filter(|((_, cv, _), _)| cv == from)
            .map(|(key, vis)| (key.clone(), *vis))
            .collect();

        for ((snippet, cv, line), _) in &moved {
            self.rules
                .remove(&(snippet.clone(), cv.clone(), *line));
        }
        for ((snippet, _, line), vis) in moved {
            if let Some((target, target_line)) = map(line) {
                self.set_default(snippet, target, target_line, vis);
            }
        }
    }

    /// Re-point suppressions on `from` at each of `to`.
    pub fn remap_suppressions(&mut self, from: &ChunkVersionId, to: &[ChunkVersionId]) {
        let snippets: Vec<SnippetId> = self
            .suppressed
            .iter()
            .filter(|(_, cv)| cv == from)
            .map(|(s, _)| s.clone())
            .collect();

        for snippet in snippets {
            self.suppressed
                .remove(&(snippet.clone(), from.clone()));
            for target in to {
                self.suppressed
                    .insert((snippet.clone(), target.clone()));
            }
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RuleEntry {
    snippet: SnippetId,
    chunk_version: ChunkVersionId,
    line: u32,
    visibility: Visibility,
}

#[derive(Serialize, Deserialize)]
struct SuppressionEntry {
    snippet: SnippetId,
    chunk_version: ChunkVersionId,
}

#[derive(Serialize, Deserialize, Default)]
struct RulesRepr {
    #[serde(default)]
    rules: Vec<RuleEntry>,
    #[serde(default)]
    suppressed: Vec<SuppressionEntry>,
}

impl From<VisibilityRules> for RulesRepr {
    fn from(value: VisibilityRules) -> Self {
        Self {
            rules: value
                .rules
                .into_iter()
                .map(|((snippet, chunk_version, line), visibility)| RuleEntry {
                    snippet,
                    chunk_version,
                    line,
                    visibility,
                })
                .collect(),
            suppressed: value
                .suppressed
                .into_iter()
                .map(|(snippet, chunk_version)| SuppressionEntry {
                    snippet,
                    chunk_version,
                })
                .collect(),
        }
    }
}

impl From<RulesRepr> for VisibilityRules {
    fn from(value: RulesRepr) -> Self {
        Self {
            rules: value
                .rules
                .into_iter()
                .map(|r| ((r.snippet, r.chunk_version, r.line), r.visibility))
                .collect(),
            suppressed: value
                .suppressed
                .into_iter()
                .map(|s| (s.snippet, s.chunk_version))
                .collect(),
        }
    }
}

/// Derived facts about one chunk-version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkInfo<'a> {
    pub chunk: &'a ChunkId,
    /// Index of the version in its chunk's `versions`.
    pub version: usize,
    pub of_versions: usize,
    pub path: &'a str,
    pub start_line: u32,
    /// Last line, counted from `start_line` with this version's own length.
    pub end_line: u32,
    pub text: &'a str,
}

/// Everything the engine knows. Commands produce new values of this type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub cells: Cells,
    pub selected_cell: Option<CellId>,
    pub snippets: IndexMap<SnippetId, Snippet>,
    pub chunks: IndexMap<ChunkId, Chunk>,
    pub chunk_versions: IndexMap<ChunkVersionId, ChunkVersion>,
    pub visibility_rules: VisibilityRules,
    pub selections: Vec<Selection>,
    pub ids: IdCounter,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snippet_order(&self) -> Vec<SnippetId> {
        self.cells.snippet_order()
    }

    pub fn chunk_info(&self, chunk_version: &ChunkVersionId) -> Option<ChunkInfo<'_>> {
        let (_, cv_id, cv) = self.chunk_versions.get_full(chunk_version)?;
        let (_, chunk_id, chunk) = self.chunks.get_full(&cv.chunk)?;
        let version = chunk
            .versions
            .iter()
            .position(|v| v == cv_id)?;
        Some(ChunkInfo {
            chunk: chunk_id,
            version,
            of_versions: chunk.versions.len(),
            path: &chunk.location.path,
            start_line: chunk.location.line,
            end_line: chunk.location.line + text::line_count(&cv.text) - 1,
            text: &cv.text,
        })
    }

    /// Chunk owning a chunk-version.
    pub fn chunk_of(&self, chunk_version: &ChunkVersionId) -> Option<&ChunkId> {
        self.chunk_versions
            .get(chunk_version)
            .map(|cv| &cv.chunk)
    }

    /// Reference-file line span `(first, last)` of a chunk, from its version 0.
    pub fn reference_span(&self, chunk: &ChunkId) -> Option<(u32, u32)> {
        let chunk = self.chunks.get(chunk)?;
        let v0 = self
            .chunk_versions
            .get(chunk.versions.first()?)?;
        let start = chunk.location.line;
        Some((start, start + text::line_count(&v0.text) - 1))
    }

    /// Is the chunk-version part of any snippet.
    pub fn is_in_any_snippet(&self, chunk_version: &ChunkVersionId) -> bool {
        self.snippets
            .values()
            .any(|s| s.chunk_versions_added.contains(chunk_version))
    }

    pub(crate) fn new_chunk_id(&mut self) -> ChunkId {
        let chunks = &self.chunks;
        self.ids
            .fresh("chunk", |id: &ChunkId| chunks.contains_key(id))
    }

    pub(crate) fn new_chunk_version_id(&mut self) -> ChunkVersionId {
        let versions = &self.chunk_versions;
        self.ids
            .fresh("cv", |id: &ChunkVersionId| versions.contains_key(id))
    }

    pub(crate) fn new_snippet_id(&mut self) -> SnippetId {
        let snippets = &self.snippets;
        self.ids
            .fresh("snippet", |id: &SnippetId| snippets.contains_key(id))
    }

    pub(crate) fn new_cell_id(&mut self) -> CellId {
        let cells = &self.cells;
        self.ids
            .fresh("cell", |id: &CellId| cells.contains(id))
    }
}

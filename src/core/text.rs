//! Text-range primitives shared by edits, selections and reconstruction.
//!
//! Lines are 1-based and characters are 0-based, the way editors report
//! positions. Everything here is pure.

use std::cmp::Ordering;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::core::ids::ChunkVersionId;
use crate::infra::line_index::LineIndex;

/// A point in a text buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// Characters from `start` up to (not including) `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Every character of lines `first..=last`.
    pub fn whole_lines(first: u32, last: u32) -> Self {
        Self {
            start: Position::new(first, 0),
            end: Position::new(last, u32::MAX),
        }
    }

    /// Number of lines the range touches.
    pub fn line_span(&self) -> u32 {
        self.end.line.saturating_sub(self.start.line) + 1
    }
}

/// Coordinate frame of a range or selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "source", content = "id", rename_all = "snake_case")]
pub enum Source {
    /// Lines count from the top of the reference file.
    ReferenceImplementation,
    /// Lines count from the top of one chunk-version's text.
    ChunkVersion(ChunkVersionId),
}

impl Source {
    pub fn chunk_version(&self) -> Option<&ChunkVersionId> {
        match self {
            Source::ChunkVersion(id) => Some(id),
            Source::ReferenceImplementation => None,
        }
    }
}

/// A range tagged with the file and frame it is expressed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcedRange {
    pub path: String,
    #[serde(flatten)]
    pub range: Range,
    pub relative_to: Source,
}

/// An editor selection. `active` may come before `anchor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub path: String,
    pub anchor: Position,
    pub active: Position,
    pub relative_to: Source,
}

/// Split on '\n'. An empty string is one empty line.
pub fn to_lines(text: &str) -> Vec<&str> {
    text.split('\n').collect()
}

/// Number of lines `to_lines` would return.
pub fn line_count(text: &str) -> u32 {
    LineIndex::build(text).line_count() as u32
}

/// Move a 1-based line by `delta`, never above line 1.
pub fn offset_line(line: u32, delta: i64) -> u32 {
    (i64::from(line) + delta).max(1) as u32
}

pub fn join<S: AsRef<str>>(lines: &[S]) -> String {
    lines.iter().map(AsRef::as_ref).join("\n")
}

/// Replace the characters covered by `range` with `new_text`.
///
/// Returns `None` when either line of the range is outside `text`. Columns
/// past the end of a line clamp to the line end.
pub fn replace(text: &str, range: &Range, new_text: &str) -> Option<String> {
    let index = LineIndex::build(text);
    let start = index.byte_of_position(
        text,
        range.start.line as usize,
        range.start.character as usize,
    )?;
    let end = index.byte_of_position(text, range.end.line as usize, range.end.character as usize)?;
    let end = end.max(start);

    let mut out = String::with_capacity(text.len() + new_text.len());
    out.push_str(&text[..start]);
    out.push_str(new_text);
    out.push_str(&text[end..]);
    Some(out)
}

/// Line-major, character-minor ordering of two points.
pub fn compare(p1: &Position, p2: &Position) -> Ordering {
    p1.cmp(p2)
}

/// Clamp a selection to `range`, or `None` when they do not overlap.
pub fn intersect(selection: &Selection, range: &Range) -> Option<Selection> {
    let before = |p: &Position| compare(p, &range.start) == Ordering::Less;
    let after = |p: &Position| compare(p, &range.end) == Ordering::Greater;

    if (before(&selection.anchor) && before(&selection.active))
        || (after(&selection.anchor) && after(&selection.active))
    {
        return None;
    }

    let clamp = |p: Position| p.max(range.start).min(range.end);
    Some(Selection {
        anchor: clamp(selection.anchor),
        active: clamp(selection.active),
        ..selection.clone()
    })
}

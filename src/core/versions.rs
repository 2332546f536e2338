//! Chunk-version operations: fork, pick and merge.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::core::error::{EngineError, EngineResult};
use crate::core::ids::{ChunkId, ChunkVersionId, SnippetId};
use crate::core::model::{ChunkVersion, State};
use crate::core::store;
use crate::core::text::{self, Source};

/// What happens to the merged version's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergeStrategy {
    /// Copy the merged version's text into the target.
    SaveChanges,
    /// Keep the target's text and discard the merged version's.
    RevertChanges,
}

/// The version of the same chunk shown by the nearest earlier snippet, or
/// the chunk's version 0 when `chunk_version` is a later version.
///
/// May return `chunk_version` itself when an earlier snippet shows it too.
pub fn previous_chunk_version(
    state: &State,
    snippet: &SnippetId,
    chunk_version: &ChunkVersionId,
) -> Option<ChunkVersionId> {
    let chunk_id = state.chunk_of(chunk_version)?;
    let order = state.snippet_order();
    let earlier = match order.iter().position(|s| s == snippet) {
        Some(index) => &order[..index],
        None => &[],
    };

    for previous in earlier.iter().rev() {
        let Some(previous) = state.snippets.get(previous) else {
            continue;
        };
        if let Some(found) = previous
            .chunk_versions_added
            .iter()
            .find(|cv| state.chunk_of(cv) == Some(chunk_id))
        {
            return Some(found.clone());
        }
    }

    let chunk = state.chunks.get(chunk_id)?;
    let version = chunk
        .versions
        .iter()
        .position(|v| v == chunk_version)?;
    if version > 0 { chunk.versions.first().cloned() } else { None }
}

/// Copy a chunk-version into a new version of the same chunk.
#[instrument(level = "debug", skip(state))]
pub(crate) fn fork(state: &mut State, chunk_version: &ChunkVersionId) -> Option<ChunkVersionId> {
    let Some((chunk_id, content)) = state
        .chunk_versions
        .get(chunk_version)
        .map(|cv| (cv.chunk.clone(), cv.text.clone()))
    else {
        debug!("chunk version not found");
        return None;
    };
    if !state
        .chunks
        .get(&chunk_id)
        .is_some_and(|c| c.versions.contains(chunk_version))
    {
        debug!(chunk = %chunk_id, "chunk version is not listed by any chunk");
        return None;
    }

    let fork_id = state.new_chunk_version_id();
    state.chunk_versions.insert(
        fork_id.clone(),
        ChunkVersion {
            chunk: chunk_id.clone(),
            text: content,
        },
    );
    if let Some(chunk) = state.chunks.get_mut(&chunk_id) {
        chunk.versions.push(fork_id.clone());
    }
    retarget_selections(state, chunk_version, &fork_id);

    debug!(fork = %fork_id, "forked chunk version");
    Some(fork_id)
}

/// Show `chunk_version` in `snippet` instead of whatever version of `chunk`
/// it showed before.
#[instrument(level = "debug", skip(state))]
pub(crate) fn pick_chunk_version(
    state: &mut State,
    snippet: &SnippetId,
    chunk: &ChunkId,
    chunk_version: &ChunkVersionId,
) {
    let Some(versions) = state
        .chunks
        .get(chunk)
        .map(|c| c.versions.clone())
    else {
        debug!("chunk not found");
        return;
    };
    if !versions.contains(chunk_version) || !state.snippets.contains_key(snippet) {
        debug!("snippet or chunk version not found");
        return;
    }
    let same_chunk: HashSet<ChunkVersionId> = versions.into_iter().collect();

    if let Some(target) = state.snippets.get_mut(snippet) {
        target
            .chunk_versions_added
            .retain(|cv| !same_chunk.contains(cv));
        target
            .chunk_versions_added
            .push(chunk_version.clone());
    }
    state
        .visibility_rules
        .retain_for_snippet(snippet, |cv| cv == chunk_version || !same_chunk.contains(cv));
}

/// Fold `chunk_version` back into the version the reader saw before it.
#[instrument(level = "debug", skip(state))]
pub(crate) fn merge(
    state: &mut State,
    snippet: &SnippetId,
    chunk_version: &ChunkVersionId,
    strategy: MergeStrategy,
) -> EngineResult<()> {
    if !state.snippets.contains_key(snippet) {
        debug!("snippet not found");
        return Ok(());
    }
    let Some((chunk_id, version, source_text)) = state
        .chunk_info(chunk_version)
        .map(|info| (info.chunk.clone(), info.version, info.text.to_string()))
    else {
        debug!("chunk version not found");
        return Ok(());
    };
    if version == 0 {
        return Err(EngineError::ReferenceVersionMerge(chunk_version.clone()));
    }
    let into = previous_chunk_version(state, snippet, chunk_version)
        .filter(|into| into != chunk_version)
        .ok_or_else(|| EngineError::NoMergeTarget(chunk_version.clone()))?;

    let order = state.snippet_order();
    let earlier = order
        .iter()
        .take_while(|s| *s != snippet);
    let shown_earlier = earlier
        .filter_map(|s| state.snippets.get(s))
        .any(|s| s.chunk_versions_added.contains(&into));

    if strategy == MergeStrategy::SaveChanges {
        save_text(state, &into, source_text);
    }

    for (id, other) in state.snippets.iter_mut() {
        let list = &mut other.chunk_versions_added;
        let Some(pos) = list.iter().position(|cv| cv == chunk_version) else {
            continue;
        };
        list.remove(pos);
        let keep_content = id != snippet || !shown_earlier;
        if keep_content && !list.contains(&into) {
            list.insert(pos, into.clone());
        }
    }

    if let Some(chunk) = state.chunks.get_mut(&chunk_id) {
        chunk
            .versions
            .retain(|v| v != chunk_version);
    }
    retarget_selections(state, chunk_version, &into);
    state
        .visibility_rules
        .remap(chunk_version, |line| Some((into.clone(), line)));
    state
        .visibility_rules
        .remap_suppressions(chunk_version, std::slice::from_ref(&into));
    state.chunk_versions.shift_remove(chunk_version);

    debug!(%into, ?strategy, "merged chunk version");
    Ok(())
}

/// Overwrite a version's text, keeping the reference partition intact when
/// a version 0 grows or shrinks.
fn save_text(state: &mut State, chunk_version: &ChunkVersionId, new_text: String) {
    let Some((path, start_line, version, old_count)) = state
        .chunk_info(chunk_version)
        .map(|info| (info.path.to_string(), info.start_line, info.version, text::line_count(info.text)))
    else {
        return;
    };
    let new_count = text::line_count(&new_text);
    if let Some(cv) = state.chunk_versions.get_mut(chunk_version) {
        cv.text = new_text;
    }
    if version == 0 {
        store::shift_chunks(state, &path, start_line, i64::from(new_count) - i64::from(old_count));
    }
    state
        .visibility_rules
        .remap(chunk_version, |line| (line < new_count).then(|| (chunk_version.clone(), line)));
}

fn retarget_selections(state: &mut State, from: &ChunkVersionId, to: &ChunkVersionId) {
    for selection in state.selections.iter_mut() {
        if selection.relative_to.chunk_version() == Some(from) {
            selection.relative_to = Source::ChunkVersion(to.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{InitialChunk, Visibility};
    use crate::core::snippet::insert_snippet;
    use crate::core::text::{Position, Selection};

    fn with_snippet(text: &str) -> (State, SnippetId, ChunkVersionId) {
        let mut state = State::new();
        store::upload_file_contents(&mut state, "f", text).unwrap();
        let first_line = text::to_lines(text)[0].to_string();
        let snippet = insert_snippet(&mut state, Some(0), &[InitialChunk::new("f", 1, first_line)]).unwrap();
        let cv = state.snippets[&snippet].chunk_versions_added[0].clone();
        (state, snippet, cv)
    }

    #[test]
    fn fork_appends_version_and_moves_selection() {
        let (mut state, _, cv) = with_snippet("a\nb");
        state.selections.push(Selection {
            path: "f".into(),
            anchor: Position::new(1, 0),
            active: Position::new(1, 1),
            relative_to: Source::ChunkVersion(cv.clone()),
        });

        let fork_id = fork(&mut state, &cv).unwrap();

        let chunk = state.chunk_of(&cv).unwrap();
        assert_eq!(state.chunks[chunk].versions, vec![cv.clone(), fork_id.clone()]);
        assert_eq!(state.chunk_versions[&fork_id].text, "a");
        assert_eq!(state.selections[0].relative_to, Source::ChunkVersion(fork_id));
    }

    #[test]
    fn fork_of_unknown_version_is_noop() {
        let (mut state, _, _) = with_snippet("a");
        let before = state.clone();
        assert!(fork(&mut state, &"missing".into()).is_none());
        assert_eq!(state, before);
    }

    #[test]
    fn pick_replaces_version_and_clears_stale_rules() {
        let (mut state, snippet, cv) = with_snippet("a\nb");
        let fork_id = fork(&mut state, &cv).unwrap();
        state
            .visibility_rules
            .set(snippet.clone(), cv.clone(), 0, Visibility::Hidden);
        let chunk = state.chunk_of(&cv).unwrap().clone();

        pick_chunk_version(&mut state, &snippet, &chunk, &fork_id);

        assert_eq!(state.snippets[&snippet].chunk_versions_added, vec![fork_id]);
        assert!(state.visibility_rules.is_empty());
    }

    #[test]
    fn merge_saves_into_version_zero() {
        let (mut state, snippet, cv) = with_snippet("a\nb");
        let chunk = state.chunk_of(&cv).unwrap().clone();
        let fork_id = fork(&mut state, &cv).unwrap();
        pick_chunk_version(&mut state, &snippet, &chunk, &fork_id);
        state
            .chunk_versions
            .get_mut(&fork_id)
            .unwrap()
            .text = "a2".into();

        merge(&mut state, &snippet, &fork_id, MergeStrategy::SaveChanges).unwrap();

        assert_eq!(state.chunk_versions[&cv].text, "a2");
        assert_eq!(state.snippets[&snippet].chunk_versions_added, vec![cv.clone()]);
        assert_eq!(state.chunks[&chunk].versions, vec![cv]);
        assert!(!state.chunk_versions.contains_key(&fork_id));
    }

    #[test]
    fn merge_shifts_later_chunks_when_reference_grows() {
        let (mut state, snippet, cv) = with_snippet("a\nb");
        let chunk = state.chunk_of(&cv).unwrap().clone();
        let fork_id = fork(&mut state, &cv).unwrap();
        pick_chunk_version(&mut state, &snippet, &chunk, &fork_id);
        state
            .chunk_versions
            .get_mut(&fork_id)
            .unwrap()
            .text = "a\na2".into();

        merge(&mut state, &snippet, &fork_id, MergeStrategy::SaveChanges).unwrap();

        let lines: Vec<u32> = state
            .chunks
            .values()
            .map(|c| c.location.line)
            .collect();
        assert!(lines.contains(&3));
        assert!(!lines.contains(&2));
    }

    #[test]
    fn merge_reverts_without_touching_target_text() {
        let (mut state, snippet, cv) = with_snippet("a");
        let chunk = state.chunk_of(&cv).unwrap().clone();
        let fork_id = fork(&mut state, &cv).unwrap();
        pick_chunk_version(&mut state, &snippet, &chunk, &fork_id);
        state
            .chunk_versions
            .get_mut(&fork_id)
            .unwrap()
            .text = "changed".into();

        merge(&mut state, &snippet, &fork_id, MergeStrategy::RevertChanges).unwrap();

        assert_eq!(state.chunk_versions[&cv].text, "a");
        assert_eq!(state.snippets[&snippet].chunk_versions_added, vec![cv]);
    }

    #[test]
    fn merge_refuses_version_zero() {
        let (mut state, snippet, cv) = with_snippet("a");
        let err = merge(&mut state, &snippet, &cv, MergeStrategy::SaveChanges).unwrap_err();
        assert_eq!(err, EngineError::ReferenceVersionMerge(cv));
    }

    #[test]
    fn previous_version_prefers_earlier_snippets() {
        let (mut state, first, cv) = with_snippet("a\nb");
        let fork_id = fork(&mut state, &cv).unwrap();
        let second = insert_snippet(&mut state, None, &[InitialChunk::new("f", 2, "b")]).unwrap();
        assert_eq!(previous_chunk_version(&state, &second, &fork_id), Some(cv.clone()));
        assert_eq!(previous_chunk_version(&state, &first, &fork_id), Some(cv.clone()));
        assert_eq!(previous_chunk_version(&state, &first, &cv), None);
    }
}

//! Which rendered steps go stale between two states.

use tracing::debug;

use crate::core::ids::SnippetId;
use crate::core::model::State;

/// Snippets whose snapshot differs between `before` and `after`, in `after`'s
/// cell order.
///
/// Snapshots are cumulative, so once one snippet changes every snippet after
/// it is reported too. A missing `before` counts as the empty state.
pub fn changed_snapshots(before: Option<&State>, after: Option<&State>) -> Vec<SnippetId> {
    let Some(after) = after else {
        return Vec::new();
    };
    let empty = State::new();
    let before = before.unwrap_or(&empty);

    let order = after.snippet_order();
    let Some(first) = order
        .iter()
        .position(|id| snippet_changed(before, after, id))
    else {
        return Vec::new();
    };
    debug!(first = %order[first], count = order.len() - first, "snapshots changed");
    order[first..].to_vec()
}

fn snippet_changed(before: &State, after: &State, id: &SnippetId) -> bool {
    let Some(now) = after.snippets.get(id) else {
        return false;
    };
    let Some(then) = before.snippets.get(id) else {
        return true;
    };
    if now.chunk_versions_added != then.chunk_versions_added {
        return true;
    }
    now.chunk_versions_added.iter().any(|cv| {
        let old = before
            .chunk_versions
            .get(cv)
            .map(|v| &v.text);
        let new = after
            .chunk_versions
            .get(cv)
            .map(|v| &v.text);
        old != new
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::InitialChunk;
    use crate::core::snippet::insert_snippet;
    use crate::core::store;

    fn two_snippets() -> (State, SnippetId, SnippetId) {
        let mut state = State::new();
        store::upload_file_contents(&mut state, "f", "a\nb\nc").unwrap();
        let first = insert_snippet(&mut state, None, &[InitialChunk::new("f", 1, "a")]).unwrap();
        let second = insert_snippet(&mut state, None, &[InitialChunk::new("f", 3, "c")]).unwrap();
        (state, first, second)
    }

    #[test]
    fn nothing_changed() {
        let (state, ..) = two_snippets();
        assert!(changed_snapshots(Some(&state), Some(&state)).is_empty());
        assert!(changed_snapshots(Some(&state), None).is_empty());
    }

    #[test]
    fn everything_is_new_without_before() {
        let (state, first, second) = two_snippets();
        assert_eq!(changed_snapshots(None, Some(&state)), vec![first, second]);
    }

    #[test]
    fn text_change_marks_owner_and_later_snippets() {
        let (before, first, second) = two_snippets();
        let mut after = before.clone();
        let cv = after.snippets[&first].chunk_versions_added[0].clone();
        after
            .chunk_versions
            .get_mut(&cv)
            .unwrap()
            .text = "A".into();
        assert_eq!(changed_snapshots(Some(&before), Some(&after)), vec![first, second]);
    }

    #[test]
    fn change_in_last_snippet_leaves_earlier_alone() {
        let (before, _, second) = two_snippets();
        let mut after = before.clone();
        after
            .snippets
            .get_mut(&second)
            .unwrap()
            .chunk_versions_added
            .clear();
        assert_eq!(changed_snapshots(Some(&before), Some(&after)), vec![second]);
    }
}

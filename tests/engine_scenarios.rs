//! End-to-end engine behavior through `apply`.

mod util;

use snipweave::core::{
    Command, Content, MergeStrategy, Position, Range, Selection, Source, SourcedRange, State,
    View, Visibility, apply, changed_snapshots, program,
};
use util::{reference_chunks, replay, reveal, upload};

fn first_added(state: &State, index: usize) -> snipweave::core::ChunkVersionId
{
    let snippet = state.snippet_order()[index].clone();
    state.snippets[&snippet].chunk_versions_added[0].clone()
}

#[test]
fn revealing_a_middle_line_splits_the_reference_chunk()
{
    let state = replay(&[
        upload("f", "Line 1\nLine 2\nLine 3"),
        Command::InsertSnippet {
            index: Some(0),
            fragments: vec![snipweave::core::InitialChunk::new("f", 2, "Line 2")],
        },
    ]);

    assert_eq!(
        reference_chunks(&state, "f"),
        vec![(1, "Line 1".to_string()), (2, "Line 2".to_string()), (3, "Line 3".to_string())]
    );
    let added = first_added(&state, 0);
    assert_eq!(state.chunk_versions[&added].text, "Line 2");
    assert!(state.visibility_rules.is_empty());

    let snippet = state.snippet_order()[0].clone();
    let rebuilt = program::partial_program(&state, &snippet, "f", View::Snapshot).unwrap();
    assert_eq!(rebuilt.text, "Line 2");
}

#[test]
fn duplicate_snippet_adds_nothing_but_still_renders()
{
    let state = replay(&[upload("f", "a\nb\nc"), reveal("f", 1, "a\nb"), reveal("f", 1, "a\nb")]);
    let order = state.snippet_order();

    assert!(state.snippets[&order[1]].chunk_versions_added.is_empty());
    let rebuilt = program::partial_program(&state, &order[1], "f", View::Snapshot).unwrap();
    assert_eq!(rebuilt.text, "a\nb");
}

#[test]
fn covered_fragments_create_no_chunks()
{
    let before = replay(&[upload("f", "a\nb\nc"), reveal("f", 1, "a"), reveal("f", 2, "b\nc")]);
    let after = apply(&before, &reveal("f", 1, "a\nb\nc")).unwrap();

    assert_eq!(after.chunks.len(), before.chunks.len());
    assert_eq!(after.chunk_versions.len(), before.chunk_versions.len());
    let last = after.snippet_order()[2].clone();
    assert_eq!(after.visibility_rules.for_snippet(&last).count(), 3);
}

#[test]
fn fork_moves_selections_to_the_new_version()
{
    let mut state = replay(&[upload("f", "a\nb"), reveal("f", 1, "a")]);
    let cv0 = first_added(&state, 0);
    state = apply(
        &state,
        &Command::SetSelections {
            selections: vec![Selection {
                path: "f".into(),
                anchor: Position::new(1, 0),
                active: Position::new(1, 1),
                relative_to: Source::ChunkVersion(cv0.clone()),
            }],
        },
    )
    .unwrap();

    state = apply(&state, &Command::Fork { chunk_version: cv0.clone() }).unwrap();

    let chunk = state.chunk_of(&cv0).unwrap();
    let versions = &state.chunks[chunk].versions;
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0], cv0);
    assert_eq!(state.selections[0].relative_to, Source::ChunkVersion(versions[1].clone()));
}

#[test]
fn merge_without_earlier_snippet_saves_into_version_zero()
{
    let mut state = replay(&[upload("f", "a\nb"), reveal("f", 1, "a")]);
    let snippet = state.snippet_order()[0].clone();
    let cv0 = first_added(&state, 0);
    let chunk = state.chunk_of(&cv0).unwrap().clone();

    state = apply(&state, &Command::Fork { chunk_version: cv0.clone() }).unwrap();
    let cv1 = state.chunks[&chunk].versions[1].clone();
    state = apply(
        &state,
        &Command::PickChunkVersion {
            snippet: snippet.clone(),
            chunk: chunk.clone(),
            chunk_version: cv1.clone(),
        },
    )
    .unwrap();
    state = apply(
        &state,
        &Command::Edit {
            range: SourcedRange {
                path: "f".into(),
                range: Range::new(Position::new(1, 0), Position::new(1, 1)),
                relative_to: Source::ChunkVersion(cv1.clone()),
            },
            new_text: "A".into(),
        },
    )
    .unwrap();

    state = apply(
        &state,
        &Command::Merge {
            snippet: snippet.clone(),
            chunk_version: cv1.clone(),
            strategy: MergeStrategy::SaveChanges,
        },
    )
    .unwrap();

    assert_eq!(state.chunk_versions[&cv0].text, "A");
    assert_eq!(state.snippets[&snippet].chunk_versions_added, vec![cv0]);
    assert!(!state.chunk_versions.contains_key(&cv1));
}

#[test]
fn merging_a_reference_version_is_rejected()
{
    let state = replay(&[upload("f", "a"), reveal("f", 1, "a")]);
    let snippet = state.snippet_order()[0].clone();
    let cv0 = first_added(&state, 0);

    let err = apply(
        &state,
        &Command::Merge { snippet, chunk_version: cv0, strategy: MergeStrategy::RevertChanges },
    )
    .unwrap_err();
    assert!(matches!(err, snipweave::EngineError::ReferenceVersionMerge(_)));
}

#[test]
fn reference_edit_above_a_chunk_moves_it_down()
{
    let state = replay(&[upload("f", "1\n2\n3\n4\n5\n6"), reveal("f", 5, "5")]);
    let revealed = state.chunk_of(&first_added(&state, 0)).unwrap().clone();
    assert_eq!(state.chunks[&revealed].location.line, 5);

    let state = apply(
        &state,
        &Command::Edit {
            range: SourcedRange {
                path: "f".into(),
                range: Range::new(Position::new(2, 0), Position::new(2, 0)),
                relative_to: Source::ReferenceImplementation,
            },
            new_text: "\n".into(),
        },
    )
    .unwrap();

    assert_eq!(state.chunks[&revealed].location.line, 6);
    assert_eq!(
        program::reference_implementation_text(&state, "f").as_deref(),
        Some("1\n\n2\n3\n4\n5\n6")
    );
}

#[test]
fn edited_chunks_are_not_split_again()
{
    let mut state = replay(&[upload("f", "a\nb\nc"), reveal("f", 1, "a\nb")]);
    let cv0 = first_added(&state, 0);
    state = apply(&state, &Command::Fork { chunk_version: cv0.clone() }).unwrap();
    let chunks_before = state.chunks.len();

    state = apply(
        &state,
        &Command::InsertSnippet {
            index: Some(0),
            fragments: vec![snipweave::core::InitialChunk::new("f", 2, "b")],
        },
    )
    .unwrap();

    let inserted = state.snippet_order()[0].clone();
    assert!(state.snippets[&inserted].chunk_versions_added.is_empty());
    assert_eq!(state.chunks.len(), chunks_before);
}

#[test]
fn hidden_lines_drop_out_of_the_snapshot()
{
    let state = replay(&[upload("f", "a\nb"), reveal("f", 1, "a\nb")]);
    let snippet = state.snippet_order()[0].clone();
    let cv = first_added(&state, 0);

    let state = apply(
        &state,
        &Command::SetLineVisibility {
            snippet: snippet.clone(),
            chunk_version: cv,
            line: 0,
            visibility: Some(Visibility::Hidden),
        },
    )
    .unwrap();

    let snapshot = program::partial_program(&state, &snippet, "f", View::Snapshot).unwrap();
    assert_eq!(snapshot.text, "b");
    let view = program::partial_program(&state, &snippet, "f", View::Snippet).unwrap();
    assert_eq!(view.visibilities, vec![Visibility::Hidden, Visibility::Visible]);
}

#[test]
fn editing_an_early_snippet_invalidates_everything_after_it()
{
    let before = replay(&[
        upload("f", "a\nb\nc"),
        reveal("f", 1, "a"),
        reveal("f", 2, "b"),
        reveal("f", 3, "c"),
    ]);
    let cv = first_added(&before, 1);
    let after = apply(
        &before,
        &Command::Edit {
            range: SourcedRange {
                path: "f".into(),
                range: Range::new(Position::new(1, 0), Position::new(1, 1)),
                relative_to: Source::ChunkVersion(cv),
            },
            new_text: "B".into(),
        },
    )
    .unwrap();

    let order = after.snippet_order();
    assert_eq!(changed_snapshots(Some(&before), Some(&after)), order[1..].to_vec());
}

#[test]
fn deleting_a_snippet_keeps_its_chunks()
{
    let state = replay(&[upload("f", "a\nb"), reveal("f", 1, "a"), reveal("f", 2, "b")]);
    let first = state.snippet_order()[0].clone();
    let cell = state.cells.cell_of_snippet(&first).unwrap().clone();
    let chunks = state.chunks.len();

    let after = apply(&state, &Command::DeleteContent { cell, content: Content::Snippet(first) }).unwrap();

    assert_eq!(after.snippet_order().len(), 1);
    assert_eq!(after.chunks.len(), chunks);
    // Only additions and content changes count; removals do not.
    assert!(changed_snapshots(Some(&state), Some(&after)).is_empty());
}

#[test]
fn reversed_edit_range_changes_nothing()
{
    let state = replay(&[upload("f", "a\nb\nc\nd"), reveal("f", 1, "a")]);
    let cv = first_added(&state, 0);

    for relative_to in [Source::ReferenceImplementation, Source::ChunkVersion(cv)]
    {
        let after = apply(
            &state,
            &Command::Edit {
                range: SourcedRange {
                    path: "f".into(),
                    range: Range::new(Position::new(3, 0), Position::new(1, 0)),
                    relative_to,
                },
                new_text: "x".into(),
            },
        )
        .unwrap();
        assert_eq!(after, state);
    }
}

#[test]
fn splitting_a_later_snippet_keeps_its_lines_visible()
{
    let state = replay(&[
        upload("f", "a\nb\nc"),
        reveal("f", 1, "a\nb\nc"),
        Command::InsertSnippet {
            index: Some(0),
            fragments: vec![snipweave::core::InitialChunk::new("f", 2, "b")],
        },
    ]);
    let order = state.snippet_order();
    let moved = first_added(&state, 0);

    assert_eq!(
        state.visibility_rules.get(&order[1], &moved, 0),
        Some(Visibility::Visible)
    );
    let view = program::partial_program(&state, &order[1], "f", View::Snippet).unwrap();
    assert_eq!(view.text, "a\nb\nc");
    assert_eq!(view.visibilities, vec![Visibility::Visible; 3]);
}

#[test]
fn merge_into_an_earlier_snippets_version_drops_the_fork()
{
    let mut state = replay(&[upload("f", "a\nb"), reveal("f", 1, "a"), reveal("f", 1, "a")]);
    let second = state.snippet_order()[1].clone();
    let cv0 = first_added(&state, 0);
    let chunk = state.chunk_of(&cv0).unwrap().clone();
    assert!(state.snippets[&second].chunk_versions_added.is_empty());

    state = apply(&state, &Command::Fork { chunk_version: cv0.clone() }).unwrap();
    let cv1 = state.chunks[&chunk].versions[1].clone();
    state = apply(
        &state,
        &Command::PickChunkVersion {
            snippet: second.clone(),
            chunk: chunk.clone(),
            chunk_version: cv1.clone(),
        },
    )
    .unwrap();
    state = apply(
        &state,
        &Command::Edit {
            range: SourcedRange {
                path: "f".into(),
                range: Range::new(Position::new(1, 0), Position::new(1, 1)),
                relative_to: Source::ChunkVersion(cv1.clone()),
            },
            new_text: "A".into(),
        },
    )
    .unwrap();

    state = apply(
        &state,
        &Command::Merge {
            snippet: second.clone(),
            chunk_version: cv1.clone(),
            strategy: MergeStrategy::SaveChanges,
        },
    )
    .unwrap();

    assert_eq!(state.chunk_versions[&cv0].text, "A");
    assert!(state.snippets[&second].chunk_versions_added.is_empty());
    assert!(!state.chunk_versions.contains_key(&cv1));
    assert_eq!(state.chunks[&chunk].versions, vec![cv0]);
    let snapshot = program::partial_program(&state, &second, "f", View::Snapshot).unwrap();
    assert_eq!(snapshot.text, "A");
}

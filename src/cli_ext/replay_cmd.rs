//! Handlers for `snw replay` and `snw changed`.
//!
//! Both read a JSON array of engine commands, fold them over an empty state
//! and report on the result. Only this layer touches the file system.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::{Table, Tabled};
use tracing::{debug, info, instrument};

use crate::{
    cli::{AppContext, ChangedArgs, OutputFormat, ReplayArgs},
    core::{
        Command, PartialProgram, State, View, Visibility, apply, changed_snapshots, program,
        snippets_in_order,
    },
    infra::config::{Config, RenderConfig, load_config},
};

/// Read a command script.
pub fn load_script(path: &Path) -> Result<Vec<Command>>
{
    let raw =
        fs::read_to_string(path).with_context(|| format!("Failed to read script {}", path.display()))?;
    let commands: Vec<Command> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse commands in {}", path.display()))?;
    debug!(count = commands.len(), "loaded script");
    Ok(commands)
}

/// Fold commands over an empty state, naming the command that failed.
pub fn replay(commands: &[Command]) -> Result<State>
{
    let mut state = State::new();
    for (index, command) in commands
        .iter()
        .enumerate()
    {
        state = apply(&state, command)
            .with_context(|| format!("command {} ({}) failed", index + 1, command.kind()))?;
    }
    Ok(state)
}

#[instrument(skip_all, fields(script = %args.script.display()))]
pub fn run(
    args: ReplayArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config = load_config()?;
    let commands = load_script(&args.script)?;
    let state = replay(&commands)?;
    info!(commands = commands.len(), snippets = state.snippets.len(), "replayed script");

    if args.dump_state
    {
        println!(
            "{}",
            serde_json::to_string_pretty(&state).context("Failed to serialize state")?
        );
        return Ok(());
    }

    let view = args
        .view
        .map(View::from)
        .unwrap_or(config.render.view);
    let steps = render_steps(&state, view, args.path.as_deref());

    match args.format
    {
        OutputFormat::Json =>
        {
            println!(
                "{}",
                serde_json::to_string_pretty(&steps).context("Failed to serialize steps")?
            );
        }
        OutputFormat::Table =>
        {
            println!("{}", chunk_table(&state));
        }
        OutputFormat::Text =>
        {
            if steps.is_empty() && !ctx.quiet
            {
                eprintln!("No snippets to render");
            }
            print!("{}", render_text(&steps, &config_for(&config, ctx)));
        }
    }
    Ok(())
}

#[instrument(skip_all, fields(script = %args.script.display(), split_at = args.split_at))]
pub fn run_changed(
    args: ChangedArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let commands = load_script(&args.script)?;
    if args.split_at > commands.len()
    {
        anyhow::bail!(
            "--split-at {} is past the end of {} commands",
            args.split_at,
            commands.len()
        );
    }

    let before = replay(&commands[..args.split_at])?;
    let after = replay(&commands)?;
    let changed = changed_snapshots(Some(&before), Some(&after));

    if changed.is_empty() && !ctx.quiet
    {
        eprintln!("No snapshots changed");
    }
    for snippet in changed
    {
        println!("{snippet}");
    }
    Ok(())
}

/// One rendered step of one file.
#[derive(Debug, Serialize)]
pub struct Step
{
    pub step: usize,
    #[serde(flatten)]
    pub program: PartialProgram,
    pub snippet: String,
}

/// Partial programs for every step and path, in tutorial order.
pub fn render_steps(
    state: &State,
    view: View,
    only: Option<&str>,
) -> Vec<Step>
{
    let paths: Vec<String> = program::active_paths(state)
        .into_iter()
        .filter(|p| only.is_none_or(|only| p == only))
        .collect();

    let mut steps = Vec::new();
    for (index, (snippet, _)) in snippets_in_order(state)
        .into_iter()
        .enumerate()
    {
        for path in &paths
        {
            let Some(program) = program::partial_program(state, &snippet, path, view)
            else
            {
                continue;
            };
            if program
                .lines
                .is_empty()
            {
                continue;
            }
            steps.push(Step { step: index + 1, program, snippet: snippet.to_string() });
        }
    }
    steps
}

/// Render config adjusted for global flags.
struct TextStyle
{
    render: RenderConfig,
    color: bool,
}

fn config_for(
    config: &Config,
    ctx: &AppContext,
) -> TextStyle
{
    TextStyle { render: config.render.clone(), color: !ctx.no_color }
}

/// Plain-text rendering. Hidden runs fold into one marker unless
/// `show_hidden` is set.
fn render_text(
    steps: &[Step],
    style: &TextStyle,
) -> String
{
    let mut out = String::new();
    for step in steps
    {
        let header = format!(
            "== step {} ({}) {} ==",
            step.step, step.snippet, step.program.path
        );
        if style.color
        {
            out.push_str(&header.bold().to_string());
        }
        else
        {
            out.push_str(&header);
        }
        out.push('\n');

        let mut folded = false;
        for (index, line) in step
            .program
            .lines
            .iter()
            .enumerate()
        {
            let hidden = line.visibility == Visibility::Hidden;
            if hidden && !style.render.show_hidden
            {
                if !folded
                {
                    out.push_str("   ...\n");
                    folded = true;
                }
                continue;
            }
            folded = false;

            let marker = if hidden { ' ' } else { '+' };
            let number = if style
                .render
                .line_numbers
            {
                format!("{:>4} ", index + 1)
            }
            else
            {
                String::new()
            };
            let body = format!("{number}{marker} {}", line.text);
            if style.color && hidden
            {
                out.push_str(&body.dimmed().to_string());
            }
            else if style.color
            {
                out.push_str(&body.green().to_string());
            }
            else
            {
                out.push_str(&body);
            }
            out.push('\n');
        }
    }
    out
}

#[derive(Tabled)]
struct ChunkRow
{
    chunk: String,
    path: String,
    line: u32,
    versions: String,
    shown_in: String,
}

fn chunk_table(state: &State) -> String
{
    let rows: Vec<ChunkRow> = state
        .chunks
        .iter()
        .map(|(id, chunk)| {
            let shown_in: Vec<String> = snippets_in_order(state)
                .into_iter()
                .filter(|(_, s)| {
                    s.chunk_versions_added
                        .iter()
                        .any(|cv| chunk.versions.contains(cv))
                })
                .map(|(s, _)| s.to_string())
                .collect();
            ChunkRow {
                chunk: id.to_string(),
                path: chunk
                    .location
                    .path
                    .clone(),
                line: chunk
                    .location
                    .line,
                versions: chunk
                    .versions
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
                shown_in: shown_in.join(", "),
            }
        })
        .collect();
    Table::new(rows).to_string()
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::core::InitialChunk;

    fn script() -> Vec<Command>
    {
        vec![
            Command::UploadFileContents { path: "f".into(), contents: "a\nb\nc".into() },
            Command::InsertSnippet { index: None, fragments: vec![InitialChunk::new("f", 1, "a")] },
            Command::InsertSnippet { index: None, fragments: vec![InitialChunk::new("f", 3, "c")] },
        ]
    }

    fn plain(show_hidden: bool) -> TextStyle
    {
        TextStyle {
            render: RenderConfig { view: View::Snapshot, show_hidden, line_numbers: false },
            color: false,
        }
    }

    #[test]
    fn replay_names_the_failing_command()
    {
        let mut commands = script();
        commands.push(Command::UploadFileContents { path: "f".into(), contents: "x".into() });
        let err = replay(&commands).unwrap_err();
        assert!(format!("{err:#}").contains("command 4 (upload_file_contents) failed"));
    }

    #[test]
    fn folds_hidden_lines()
    {
        let state = replay(&script()).unwrap();
        let steps = render_steps(&state, View::Snapshot, None);
        assert_eq!(steps.len(), 2);
        let header = format!("== step 2 ({}) f ==\n", steps[1].snippet);
        assert_eq!(render_text(&steps[1..], &plain(false)), format!("{header}   ...\n+ c\n"));
        assert_eq!(render_text(&steps[1..], &plain(true)), format!("{header}  a\n+ c\n"));
    }

    #[test]
    fn table_lists_every_chunk()
    {
        let state = replay(&script()).unwrap();
        let table = chunk_table(&state);
        assert!(table.contains("shown_in"));
        assert_eq!(
            table
                .matches(" f ")
                .count(),
            state
                .chunks
                .len()
        );
    }
}

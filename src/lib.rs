//! **snipweave** - Chunk, version and snippet engine for code-tutorial authoring
//!
//! A reference file is partitioned into chunks as tutorial steps reveal it.
//! Chunks can be forked, edited, picked and merged per step, and every step
//! can be rebuilt as a partial program with per-line visibility.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Engine - pure `(State, Command) -> State` transitions and read-side queries
pub mod core {
    /// Typed ids and the deterministic id allocator
    pub mod ids;
    pub use ids::{CellId, ChunkId, ChunkVersionId, IdCounter, SnippetId};

    /// Positions, ranges, selections and coordinate frames
    pub mod text;
    pub use text::{Position, Range, Selection, Source, SourcedRange};

    /// Failure taxonomy for commands
    pub mod error;
    pub use error::{EngineError, EngineResult};

    /// Step ordering (snippet, text block and output cells)
    pub mod cells;
    pub use cells::{Cell, Cells, Content};

    /// Chunks, chunk-versions, snippets, visibility rules and the state
    pub mod model;
    pub use model::{
        Chunk, ChunkInfo, ChunkVersion, InitialChunk, Location, Snippet, State, Visibility,
        VisibilityRules,
    };

    /// Line maps and chunk creation shared by uploads and snippet insertion
    pub mod store;

    /// Snippet insertion with dedup and chunk splitting
    pub mod snippet;

    /// Fork, pick and merge
    pub mod versions;
    pub use versions::{MergeStrategy, previous_chunk_version};

    /// Edits in reference or chunk-version coordinates
    pub mod edit;
    pub use edit::Edit;

    /// Partial-program reconstruction
    pub mod program;
    pub use program::{PartialProgram, ProgramLine, View};

    /// Stale-step detection between two states
    pub mod changes;
    pub use changes::changed_snapshots;

    /// Command enum and the transition function
    pub mod command;
    pub use command::{Command, apply, apply_all, snippets_in_order};
}

/// Infrastructure - configuration and line indexing
pub mod infra {
    /// Configuration management with TOML support
    pub mod config;
    pub use config::{Config, init as config_init, load_config};

    /// Newline index for O(1) line→byte mapping
    pub mod line_index;
    pub use line_index::LineIndex;
}

/// Subcommand handlers that sit on top of the engine
pub mod cli_ext {
    pub mod replay_cmd;
}

pub use cli::{AppContext, Cli, Commands};
pub use core::{Command, EngineError, MergeStrategy, State, View, apply, apply_all, changed_snapshots};
pub use infra::{Config, load_config};

use anyhow::Result;
use clap::Parser;
use snipweave::cli::{AppContext, Cli, Commands};
use snipweave::cli_ext::replay_cmd;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color,
        verbose: cli.verbose,
    };
    init_tracing(&ctx);

    match cli.command {
        Commands::Replay(args) => replay_cmd::run(args, &ctx),
        Commands::Changed(args) => replay_cmd::run_changed(args, &ctx),
        Commands::Init(args) => snipweave::infra::config::init(args, &ctx),
        Commands::Completions(args) => snipweave::completion::run(args, &ctx),
    }
}

/// RUST_LOG wins, then --verbose, then the configured filter.
fn init_tracing(ctx: &AppContext) {
    let fallback = if ctx.verbose {
        "debug".to_string()
    } else {
        snipweave::load_config()
            .map(|config| config.log.filter)
            .unwrap_or_else(|_| "warn".to_string())
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(!ctx.no_color),
        )
        .init();
}

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{AppContext, InitArgs};
use crate::core::program::View;

pub const CONFIG_FILE: &str = "snipweave.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    /// How `snw replay` renders steps
    pub render: RenderConfig,

    /// Logging defaults, overridden by RUST_LOG
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig
{
    pub view: View,
    /// Print hidden lines (dimmed) instead of leaving them out
    pub show_hidden: bool,
    pub line_numbers: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig
{
    pub filter: String,
}

impl Default for RenderConfig
{
    fn default() -> Self
    {
        Self { view: View::Snapshot, show_hidden: false, line_numbers: true }
    }
}

impl Default for LogConfig
{
    fn default() -> Self
    {
        Self { filter: "warn".to_string() }
    }
}

pub fn load_config() -> Result<Config>
{
    let mut builder = config::Config::builder();

    // First match wins
    let config_paths = [CONFIG_FILE, ".snipweave.toml", "snipweave.yaml", "snipweave.json"];

    for path in &config_paths
    {
        if Path::new(path).exists()
        {
            builder = builder.add_source(config::File::with_name(path));
            break;
        }
    }

    // SNIPWEAVE_RENDER__VIEW=snippet, SNIPWEAVE_LOG__FILTER=debug
    builder = builder.add_source(
        config::Environment::with_prefix("SNIPWEAVE")
            .prefix_separator("_")
            .separator("__"),
    );

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join(CONFIG_FILE);

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let toml_string =
        toml::to_string_pretty(&Config::default()).context("Failed to serialize default config")?;

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}

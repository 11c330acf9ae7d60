//! CLI configuration and runtime settings.

use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

/// Output directory used when none is given
pub const DEFAULT_OUTPUT: &str = "dist";

/// Build and render inheritable site themes
#[derive(Parser, Debug)]
#[command(name = "themestack")]
#[command(version)]
#[command(about = "Build and render inheritable site themes")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Number of parallel workers
    #[arg(short, long, global = true, default_value_t = num_cpus::get())]
    pub jobs: usize,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Clean the output directory and build assets, styles and scripts
    Build {
        #[command(flatten)]
        theme: ThemeArgs,

        /// Keep running and rebuild on changes
        #[arg(short, long)]
        watch: bool,

        /// Include development files (theme.xml, package manifests, node_modules, etc.)
        #[arg(short = 'd', long)]
        include_dev: bool,
    },

    /// Render a layout into a page under the output directory
    Page {
        #[command(flatten)]
        theme: ThemeArgs,

        /// Page path relative to the output directory
        dest: PathBuf,

        /// Layout name inside templates/
        #[arg(short, long)]
        layout: Option<String>,

        /// JSON file with the template data
        #[arg(long)]
        data: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
pub struct ThemeArgs {
    /// Theme package name or directory
    pub theme: String,

    /// Parent themes, nearest first (default: read from theme.xml)
    #[arg(short, long = "parent")]
    pub parents: Vec<String>,

    /// Output directory
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,
}

/// What the binary should do
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Build { watch: bool, include_dev: bool },
    Page {
        dest: PathBuf,
        layout: Option<String>,
        data: Value,
    },
}

/// Runtime configuration parsed from CLI
#[derive(Debug, Clone)]
pub struct Config {
    /// Theme identifier
    pub theme: String,
    /// Explicit parents, nearest first; empty means discover from manifests
    pub parents: Vec<String>,
    pub output: PathBuf,
    pub action: Action,
    /// Number of parallel workers
    pub jobs: usize,
    /// Enable verbose output
    pub verbose: bool,
}

impl Config {
    /// Create Config from CLI arguments
    pub fn from_cli(cli: Cli) -> anyhow::Result<Self> {
        let (theme, action) = match cli.command {
            Command::Build {
                theme,
                watch,
                include_dev,
            } => (theme, Action::Build { watch, include_dev }),
            Command::Page {
                theme,
                dest,
                layout,
                data,
            } => {
                if dest.is_absolute() {
                    anyhow::bail!(
                        "Page path must be relative to the output directory: {}",
                        dest.display()
                    );
                }
                let data = match data {
                    Some(path) => read_data(&path)?,
                    None => Value::Null,
                };
                (theme, Action::Page { dest, layout, data })
            }
        };

        if theme.theme.trim().is_empty() {
            anyhow::bail!("Theme must not be empty");
        }

        Ok(Config {
            theme: theme.theme,
            parents: theme.parents,
            output: theme.output,
            action,
            jobs: cli.jobs.max(1),
            verbose: cli.verbose,
        })
    }

    /// Development files are copied by a build
    pub fn include_dev(&self) -> bool {
        matches!(
            self.action,
            Action::Build {
                include_dev: true,
                ..
            }
        )
    }
}

fn read_data(path: &Path) -> anyhow::Result<Value> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read page data {}", path.display()))?;
    let data: Value = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;
    if !(data.is_object() || data.is_null()) {
        anyhow::bail!("Page data must be a JSON object: {}", path.display());
    }
    Ok(data)
}

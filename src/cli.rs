use std::path::{Path, PathBuf};

mod diff;
mod list;
mod show;
mod status;
mod terminal;
mod validate;

use clap::ArgAction;
use diff::Diff;
use list::List;
use show::Show;
use status::Status;
use testament::{Config, Name};
use tracing::instrument;
use validate::Validate;

/// Parse a record name from a string.
///
/// This is a CLI boundary function that rejects empty or blank
/// names before any filesystem work happens.
fn parse_name(s: &str) -> Result<Name, String> {
    s.parse().map_err(|e| format!("{e}"))
}

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global=true)]
    verbose: u8,

    /// The path to the root of the library directory
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        self.command
            .unwrap_or_else(|| Command::Status(Status::default()))
            .run(self.root)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            //.pretty()
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Show library status (default)
    Status(Status),

    /// Initialize a new test library
    Init,

    /// Compare two library snapshots
    ///
    /// Every record is classified as removed, added, modified or
    /// unchanged. A record counts as modified when its own content or
    /// its resolved relationships changed.
    Diff(Diff),

    /// Validate library health
    Validate(Validate),

    /// Show detailed information about a record
    Show(Show),

    /// List records with filters
    List(List),
}

impl Command {
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        match self {
            Self::Status(command) => command.run(root)?,
            Self::Init => init(&root)?,
            Self::Diff(command) => command.run()?,
            Self::Validate(command) => command.run(root)?,
            Self::Show(command) => command.run(root)?,
            Self::List(command) => command.run(root)?,
        }
        Ok(())
    }
}

#[instrument]
fn init(root: &Path) -> anyhow::Result<()> {
    // Create .tlib directory
    let tlib_dir = root.join(".tlib");
    if tlib_dir.exists() {
        anyhow::bail!("Library already initialized (found existing .tlib directory)");
    }

    std::fs::create_dir_all(&tlib_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create .tlib directory: {e}"))?;

    // Create config.toml with defaults
    let config_path = tlib_dir.join("config.toml");
    let config = Config::default();
    config
        .save(&config_path)
        .map_err(|e| anyhow::anyhow!("Failed to create config.toml: {e}"))?;

    println!("Initialized test library in {}", root.display());
    println!("  Created: .tlib/config.toml");
    println!();
    println!("Next steps:");
    println!("  Add .tc.yaml, .req.yaml and .plan.yaml files, then run 'tlib status'");

    Ok(())
}

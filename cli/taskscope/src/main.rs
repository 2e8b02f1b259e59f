//! taskscope CLI: analysis of distributed task-runtime traces from the
//! command line.

mod commands;
mod config;
mod logging;

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use config::TaskscopeConfig;
use taskscope_core::{CommandId, CommandType, NoopObserver, Timestamp};

#[derive(Parser)]
#[command(name = "taskscope", version, about = "Analyze distributed task-runtime traces")]
struct Cli {
    /// Configuration file (default: nearest taskscope.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Temporal index bucket width
    #[arg(long, global = true)]
    bucket_width: Option<Timestamp>,
    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,
    /// Log debug diagnostics to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show run provenance, entity counts and load timings
    Summary {
        /// Capture file
        trace: PathBuf,
    },
    /// Show the critical path
    CriticalPath {
        /// Capture file
        trace: PathBuf,
        /// List from the source command forward
        #[arg(long)]
        reverse: bool,
    },
    /// Find idle intervals on every compute node
    Gaps {
        /// Capture file
        trace: PathBuf,
        /// Shortest gap reported
        #[arg(long)]
        min_gap: Option<Timestamp>,
        /// Only task commands count as activity
        #[arg(long)]
        task_only: bool,
    },
    /// Expand the dependencies of a command
    Deps {
        /// Capture file
        trace: PathBuf,
        /// Root command id
        command: CommandId,
        /// Number of edges to follow in each direction
        #[arg(long, default_value_t = 1)]
        depth: u32,
        /// Command kinds to follow (e.g. task|push, all)
        #[arg(long, default_value = "all")]
        types: CommandType,
    },
    /// Show chunks and commands visible around a time
    Visible {
        /// Capture file
        trace: PathBuf,
        /// Time relative to the start of the trace
        time: Timestamp,
        /// Half-width of the window
        #[arg(long, default_value_t = 0)]
        radius: Timestamp,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let config = load_config(cli.config.as_deref(), &cwd)?;

    let level = logging::default_level(cli.verbose, config.log.level.as_deref())?;
    logging::init(level)?;

    let session_config = config.session_config(cli.bucket_width);
    let load = |trace: &Path| commands::load_session(trace, &session_config, &mut NoopObserver);

    match cli.command {
        Commands::Summary { trace } => commands::summary::run(&load(&trace)?, cli.json),

        Commands::CriticalPath { trace, reverse } => {
            commands::critical_path::run(&load(&trace)?, reverse, cli.json)
        }

        Commands::Gaps {
            trace,
            min_gap,
            task_only,
        } => commands::gaps::run(
            &load(&trace)?,
            config.min_gap_length(min_gap),
            config.task_only(task_only),
            cli.json,
        ),

        Commands::Deps {
            trace,
            command,
            depth,
            types,
        } => commands::deps::run(&mut load(&trace)?, command, depth, types, cli.json),

        Commands::Visible {
            trace,
            time,
            radius,
        } => commands::visible::run(&load(&trace)?, time, radius, cli.json),
    }
}

/// Load `explicit` if given, else the nearest `taskscope.toml`, else defaults.
fn load_config(explicit: Option<&Path>, cwd: &Path) -> Result<TaskscopeConfig> {
    if let Some(path) = explicit {
        return TaskscopeConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()));
    }
    Ok(TaskscopeConfig::find_and_load(cwd)?
        .map(|(config, _)| config)
        .unwrap_or_default())
}

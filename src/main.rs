//! Prospector - autonomous prospecting orchestrator
//!
//! CLI entry point with global panic handler.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};

use prospector::config::{data_dir, prospector_home, Config};
use prospector::error::exit_codes;
use prospector::storage::FileProspectStore;

// =============================================================================
// CLI Definition
// =============================================================================

/// Prospector - autonomous prospecting orchestrator
#[derive(Parser)]
#[command(name = "prospector")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Data directory (default: ~/.prospector/data or $PROSPECTOR_HOME/data)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run growth cycles until stopped, halted, or the cycle limit
    Run {
        /// Replay fixture (default: .prospector/replay.json)
        #[arg(long)]
        fixture: Option<PathBuf>,
        /// Stop after this many cycles
        #[arg(long = "cycles", alias = "max-cycles")]
        max_cycles: Option<u64>,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
        /// Log at debug level
        #[arg(long, short)]
        verbose: bool,
    },

    /// Show engine state, strategy and lead counts
    Status {
        /// Recent trace events to show
        #[arg(long, default_value = "10")]
        trace: usize,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Manage the strategy queue
    Strategy {
        #[command(subcommand)]
        action: StrategyCmd,
        /// Output as JSON
        #[arg(long, short, global = true)]
        json: bool,
        /// Suppress output
        #[arg(long, short, global = true)]
        quiet: bool,
    },

    /// List leads and record outreach
    Leads {
        #[command(subcommand)]
        action: LeadsCmd,
        /// Output as JSON
        #[arg(long, short, global = true)]
        json: bool,
        /// Suppress output
        #[arg(long, short, global = true)]
        quiet: bool,
    },

    /// Re-enable cycles and clear the failure counter
    Enable {
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Disable cycles
    Disable {
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Initialize project config and data directories
    Init {
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
        /// Overwrite existing files
        #[arg(long)]
        force: bool,
        /// Also write a demo replay fixture
        #[arg(long)]
        demo: bool,
    },
}

#[derive(Subcommand)]
enum StrategyCmd {
    /// Enqueue a manual strategy
    Add {
        /// Target sector
        sector: String,
        /// Sourcing query
        query: String,
        /// Why this strategy
        #[arg(long, default_value = "")]
        rationale: String,
    },
    /// List strategies
    List {
        /// Filter by status (pending, active, completed, failed)
        #[arg(long)]
        status: Option<String>,
    },
}

#[derive(Subcommand)]
enum LeadsCmd {
    /// List leads, oldest first
    List {
        /// Filter by status (new, analyzing, qualified, ...)
        #[arg(long)]
        status: Option<String>,
        /// Maximum leads to show
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Record outreach progress for a lead
    Mark {
        /// Lead ID
        lead_id: String,
        /// New outreach state
        #[arg(value_enum)]
        mark: MarkArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum MarkArg {
    Contacted,
    Opened,
}

impl From<MarkArg> for prospector::cli::leads::OutreachMark {
    fn from(mark: MarkArg) -> Self {
        match mark {
            MarkArg::Contacted => Self::Contacted,
            MarkArg::Opened => Self::Opened,
        }
    }
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() -> ExitCode {
    setup_panic_handler();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("prospector error: {}", e);
            ExitCode::from(exit_codes::ERROR as u8)
        }
    }
}

/// Set up the global panic handler.
///
/// On panic, logs to ~/.prospector/crash.log and exits with code 3.
fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("prospector panic: {}", info);

        if let Some(home) = prospector_home() {
            if let Ok(mut file) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(home.join("crash.log"))
            {
                let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
                let _ = writeln!(file, "[{}] {}", timestamp, info);
            }
        }

        std::process::exit(exit_codes::CRASH);
    }));
}

/// Logs go to stderr so `--json` output stays parseable.
/// `PROSPECTOR_LOG`, then `RUST_LOG`, override the level (e.g. `prospector=debug`).
fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_env("PROSPECTOR_LOG")
        .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Run the CLI and return the exit code.
fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;

    let log_level = match &cli.command {
        Commands::Run { quiet: true, .. } => "error",
        Commands::Run { verbose: true, .. } => "prospector=debug",
        Commands::Run { .. } => "prospector=info",
        _ => "warn",
    };
    init_tracing(log_level);

    let data = cli.data_dir;
    match cli.command {
        Commands::Run {
            fixture,
            max_cycles,
            json,
            quiet,
            verbose: _,
        } => run_run(fixture, max_cycles, json, quiet, data, &cwd),
        Commands::Status { trace, json, quiet } => run_status(trace, json, quiet, data),
        Commands::Strategy {
            action,
            json,
            quiet,
        } => run_strategy(action, json, quiet, data, &cwd),
        Commands::Leads {
            action,
            json,
            quiet,
        } => run_leads(action, json, quiet, data),
        Commands::Enable { json, quiet } => run_control(true, json, quiet, data, &cwd),
        Commands::Disable { json, quiet } => run_control(false, json, quiet, data, &cwd),
        Commands::Init {
            json,
            quiet,
            force,
            demo,
        } => run_init(json, quiet, force, demo, data, &cwd),
    }
}

// =============================================================================
// Command Implementations
// =============================================================================

fn open_store(data: Option<PathBuf>) -> prospector::Result<FileProspectStore> {
    match data {
        Some(dir) => FileProspectStore::with_dir(dir),
        None => FileProspectStore::new(),
    }
}

fn print_formatted(formatted: &str) {
    if !formatted.is_empty() {
        print!("{}", formatted);
    }
}

fn run_run(
    fixture: Option<PathBuf>,
    max_cycles: Option<u64>,
    json: bool,
    quiet: bool,
    data: Option<PathBuf>,
    cwd: &Path,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use prospector::cli::run::{RunCommand, RunOptions};

    let config = Config::load_from_cwd(cwd);
    let store = Arc::new(open_store(data)?);
    let cmd = RunCommand::new(config, store, cwd);
    let options = RunOptions {
        json,
        quiet,
        fixture,
        max_cycles,
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let output = runtime.block_on(cmd.run(&options));
    print_formatted(&cmd.format_output(&output, &options));

    if output.tripped() {
        return Ok(ExitCode::from(exit_codes::TRIPPED as u8));
    }
    Ok(success_to_exit_code(output.success))
}

fn run_status(
    trace: usize,
    json: bool,
    quiet: bool,
    data: Option<PathBuf>,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use prospector::cli::status::{StatusCommand, StatusOptions};

    let cmd = StatusCommand::new(open_store(data)?);
    let options = StatusOptions { json, quiet, trace };

    let output = cmd.run(&options);
    print_formatted(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_strategy(
    action: StrategyCmd,
    json: bool,
    quiet: bool,
    data: Option<PathBuf>,
    cwd: &Path,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use prospector::cli::strategy::{StrategyAction, StrategyCommand, StrategyOptions};
    use prospector::core::StrategyPlan;

    let config = Config::load_from_cwd(cwd);
    let cmd = StrategyCommand::new(open_store(data)?, config.scheduler);
    let options = StrategyOptions { json, quiet };

    let action = match action {
        StrategyCmd::Add {
            sector,
            query,
            rationale,
        } => StrategyAction::Add(StrategyPlan::new(sector, query, rationale)),
        StrategyCmd::List { status } => StrategyAction::List { status },
    };

    let output = cmd.run(&action, &options);
    print_formatted(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_leads(
    action: LeadsCmd,
    json: bool,
    quiet: bool,
    data: Option<PathBuf>,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use prospector::cli::leads::{LeadsAction, LeadsCommand, LeadsOptions};

    let cmd = LeadsCommand::new(open_store(data)?);
    let (action, limit) = match action {
        LeadsCmd::List { status, limit } => (LeadsAction::List { status }, limit),
        LeadsCmd::Mark { lead_id, mark } => (
            LeadsAction::Mark {
                lead_id,
                mark: mark.into(),
            },
            None,
        ),
    };
    let options = LeadsOptions { json, quiet, limit };

    let output = cmd.run(&action, &options);
    print_formatted(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_control(
    enable: bool,
    json: bool,
    quiet: bool,
    data: Option<PathBuf>,
    cwd: &Path,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use prospector::cli::control::{ControlCommand, ControlOptions};

    let config = Config::load_from_cwd(cwd);
    let cmd = ControlCommand::new(open_store(data)?, config.scheduler);
    let options = ControlOptions { json, quiet };

    let output = cmd.run(enable, &options);
    print_formatted(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_init(
    json: bool,
    quiet: bool,
    force: bool,
    demo: bool,
    data: Option<PathBuf>,
    cwd: &Path,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use prospector::cli::init::{InitCommand, InitOptions};

    let cmd = InitCommand::new(cwd, data.or_else(data_dir));
    let options = InitOptions {
        json,
        quiet,
        force,
        demo,
    };

    let output = cmd.run(&options);
    print_formatted(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn success_to_exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::from(exit_codes::OK as u8)
    } else {
        ExitCode::from(exit_codes::ERROR as u8)
    }
}

// =============================================================================
// Tests
// =============================================================================

// crates/loom-cli/src/main.rs
// ============================================================================
// Module: Loom CLI Entry Point
// Description: Command dispatcher for the Loom orchestration server.
// Purpose: Provide a safe launcher with config validation and bind policy.
// Dependencies: clap, loom-config, loom-server, tokio
// ============================================================================

//! ## Overview
//! The Loom CLI launches the orchestration server and validates its
//! configuration. Binds are loopback-only by default; network exposure
//! requires explicit opt-in. Security posture: inputs are untrusted and
//! must be validated.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use loom_cli::serve_policy::enforce_local_only;
use loom_cli::serve_policy::resolve_allow_non_loopback;
use loom_config::LoomConfig;
use loom_server::LoomServer;

// ============================================================================
// SECTION: CLI Definition
// ============================================================================

/// Loom orchestration server launcher.
#[derive(Parser, Debug)]
#[command(name = "loom", version, disable_help_subcommand = true)]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Loom orchestration server.
    Serve(ServeCommand),
    /// Validate a configuration file and exit.
    CheckConfig(CheckConfigCommand),
}

/// Configuration for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Path to the configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the configured bind address.
    #[arg(long)]
    bind: Option<String>,
    /// Allow binding to non-loopback addresses.
    #[arg(long)]
    allow_non_loopback: bool,
}

/// Configuration for the `check-config` command.
#[derive(Args, Debug)]
struct CheckConfigCommand {
    /// Path to the configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI failure carrying a user-facing message.
#[derive(Debug)]
struct CliError {
    /// Message emitted on stderr.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a message.
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            let _ = writeln!(io::stderr(), "error: {}", err.message);
            ExitCode::FAILURE
        }
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::CheckConfig(command) => command_check_config(&command),
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let mut config = LoomConfig::load_or_default(command.config.as_deref())
        .map_err(|err| CliError::new(format!("config load failed: {err}")))?;
    if let Some(bind) = command.bind {
        config.server.bind = bind;
        config.validate().map_err(|err| CliError::new(format!("config invalid: {err}")))?;
    }

    let allow = resolve_allow_non_loopback(command.allow_non_loopback)
        .map_err(|err| CliError::new(err.to_string()))?;
    let outcome = enforce_local_only(&config.server.bind, allow)
        .map_err(|err| CliError::new(err.to_string()))?;
    if outcome.network_exposed {
        let _ = writeln!(
            io::stderr(),
            "warning: serving on non-loopback address {}",
            outcome.bind_addr
        );
    }

    let server = LoomServer::from_config(config)
        .map_err(|err| CliError::new(format!("server init failed: {err}")))?;
    server.serve().await.map_err(|err| CliError::new(format!("server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Check Config Command
// ============================================================================

/// Executes the `check-config` command.
fn command_check_config(command: &CheckConfigCommand) -> CliResult<ExitCode> {
    LoomConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("config invalid: {err}")))?;
    let _ = writeln!(io::stdout(), "config ok");
    Ok(ExitCode::SUCCESS)
}

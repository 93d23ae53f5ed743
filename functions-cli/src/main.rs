//! The CLI Controller (C7, §4.7): the `functions` binary that starts/stops the daemon
//! and drives it over REST or RPC. Grounded on the teacher's `cargo func` entry point
//! (`clap` subcommand dispatch, `print_error_and_exit`) generalised from `clap`'s 2.x
//! `App`/`SubCommand` builder to its 4.x derive macros, matching `golemcloud-golem`'s CLI
//! crates.

mod client;
mod commands;
mod failure;
mod util;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use functions_core::config::{self, Config};

use commands::config_cmd::ConfigAction;
use commands::event_types::EventTypesAction;
use commands::functions::{DeployArgs, NameArgs};
use commands::logs::LogsAction;
use failure::Failure;
use util::print_error;

#[derive(Parser)]
#[command(name = "functions", version, about = "Local Functions emulator controller")]
struct Cli {
    /// Overrides the emulator's persisted state directory (default: the OS config dir).
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Starts the emulator daemon.
    Start {
        /// Runs the daemon in the foreground instead of detaching it.
        #[arg(long)]
        foreground: bool,
    },
    /// Gracefully stops the daemon (SIGTERM, then SIGKILL after the control timeout).
    Stop,
    /// Stops then starts the daemon.
    Restart {
        #[arg(long)]
        foreground: bool,
    },
    /// Immediately terminates the daemon (SIGKILL).
    Kill,
    /// Reports whether the daemon is running.
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Wipes the persisted function/operation catalogue. Refuses while the daemon runs.
    Clear,
    /// Asks the daemon to prune idle workers immediately.
    Prune,
    /// Reads or writes the persisted configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Deploys a function.
    Deploy(DeployArgs),
    /// Deletes a function.
    Delete(NameArgs),
    /// Prints a function's definition.
    Describe {
        #[command(flatten)]
        name: NameArgs,
        #[arg(long)]
        json: bool,
    },
    /// Lists deployed functions.
    List {
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        page_size: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Invokes a function directly, bypassing its trigger.
    Call {
        #[command(flatten)]
        name: NameArgs,
        /// A JSON value passed as the invocation's `data` payload.
        #[arg(long)]
        data: Option<String>,
        /// Overrides the event-trigger `resource` field.
        #[arg(long)]
        resource: Option<String>,
        /// Overrides the event-trigger `eventType` field.
        #[arg(long)]
        event_type: Option<String>,
    },
    /// Reads or clears the emulator's log file.
    Logs {
        #[command(subcommand)]
        action: LogsAction,
    },
    /// Starts (or reports) a debugger port for a function's worker.
    Debug {
        #[command(flatten)]
        name: NameArgs,
        #[arg(long, default_value_t = 5858)]
        port: u16,
    },
    /// Alias for `debug` (§4.7 names both verbs for the same operation).
    Inspect {
        #[command(flatten)]
        name: NameArgs,
        #[arg(long, default_value_t = 5858)]
        port: u16,
    },
    /// Tears down and restarts a function's worker, optionally keeping its warm state.
    Reset {
        #[command(flatten)]
        name: NameArgs,
        /// Keeps the worker's in-memory warm state instead of a cold restart.
        #[arg(long)]
        keep: bool,
    },
    /// Lists the trigger/event-type taxonomy this emulator understands.
    EventTypes {
        #[command(subcommand)]
        action: EventTypesAction,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let dir = cli.state_dir.clone().unwrap_or_else(config::state_dir);
    let config = match Config::load(&dir) {
        Ok(config) => config,
        Err(e) => {
            print_error(&e.message);
            return ExitCode::from(1);
        }
    };

    match dispatch(&dir, config, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            print_error(failure.message());
            ExitCode::from(failure.exit_code() as u8)
        }
    }
}

async fn dispatch(dir: &std::path::Path, config: Config, command: Command) -> Result<(), Failure> {
    match command {
        Command::Start { foreground } => commands::lifecycle::start(dir, &config, foreground).await,
        Command::Stop => commands::lifecycle::stop(dir, &config).await,
        Command::Restart { foreground } => {
            commands::lifecycle::stop(dir, &config).await?;
            commands::lifecycle::start(dir, &config, foreground).await
        }
        Command::Kill => commands::lifecycle::kill(dir, &config).await,
        Command::Status { json } => commands::lifecycle::status(dir, &config, json).await,
        Command::Clear => commands::lifecycle::clear(dir, &config).await,
        Command::Prune => commands::lifecycle::prune(&config).await,
        Command::Config { action } => commands::config_cmd::run(dir, config, action),
        Command::Deploy(args) => commands::functions::deploy(&config, args).await,
        Command::Delete(name) => commands::functions::delete(&config, name).await,
        Command::Describe { name, json } => commands::functions::describe(&config, name, json).await,
        Command::List { project, location, page_size, json } => {
            commands::functions::list(&config, project, location, page_size, json).await
        }
        Command::Call { name, data, resource, event_type } => {
            commands::functions::call(&config, name, data, resource, event_type).await
        }
        Command::Logs { action } => commands::logs::run(dir, &config, action),
        Command::Debug { name, port } | Command::Inspect { name, port } => {
            commands::functions::debug(&config, name, port).await
        }
        Command::Reset { name, keep } => commands::functions::reset(&config, name, keep).await,
        Command::EventTypes { action } => {
            commands::event_types::run(action);
            Ok(())
        }
    }
}

//! Entry point for a single worker process (§4.3 "Worker"). Spawned by the Supervisor
//! with one function's coordinates on the command line; binds an ephemeral loopback
//! port itself (§5: "bind-to-ephemeral-port (`:0`) to avoid races") and reports the
//! chosen port back over stdout before serving.

mod host;
mod loader;
mod mocks;
mod node_host;

use clap::Parser;
use functions_core::Trigger;
use host::WorkerState;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Command-line contract between the Supervisor and a worker it spawns.
#[derive(Parser, Debug)]
#[command(name = "functions-worker")]
struct Args {
    #[arg(long)]
    short_name: String,

    #[arg(long)]
    entry_point: String,

    #[arg(long, default_value = "http")]
    trigger_kind: String,

    #[arg(long)]
    trigger_resource: Option<String>,

    #[arg(long)]
    trigger_event_type: Option<String>,

    #[arg(long)]
    trigger_service: Option<String>,

    #[arg(long, default_value_t = 60_000)]
    timeout_ms: u64,

    #[arg(long, default_value_t = true)]
    use_mocks: bool,

    #[arg(long)]
    source_dir: Option<String>,

    #[arg(long)]
    debug_port: Option<u16>,

    /// Structured invocation/crash records are appended here in addition to stderr
    /// (§4.9); absent when the Supervisor wasn't given a `logFile` to forward.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn build_trigger(args: &Args) -> Trigger {
    match args.trigger_kind.as_str() {
        "pubsub" => Trigger::PubSub {
            topic: args.trigger_resource.clone().unwrap_or_default(),
        },
        "storage" => Trigger::Storage {
            bucket: args.trigger_resource.clone().unwrap_or_default(),
        },
        "event" => Trigger::Event {
            event_type: args.trigger_event_type.clone().unwrap_or_default(),
            resource: args.trigger_resource.clone().unwrap_or_default(),
            service: args.trigger_service.clone(),
        },
        _ => Trigger::Http,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // stdout is reserved for the single "PORT {n}" line the Supervisor reads on
    // startup (§5: ephemeral-port bind-then-report); logs go to stderr, and to the
    // shared log file when the Supervisor forwarded one (§4.9).
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match &args.log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).ok();
            }
            let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr.and(Mutex::new(file)))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }

    let trigger = build_trigger(&args);

    let loader: Arc<dyn loader::FunctionLoader> = if args.use_mocks {
        Arc::new(mocks::MockLoader)
    } else {
        let source_dir = args
            .source_dir
            .as_deref()
            .map(std::path::PathBuf::from)
            .unwrap_or_else(|| std::path::PathBuf::from("."));
        Arc::new(node_host::NodeLoader::spawn(&source_dir, &args.short_name).await?)
    };

    let state = Arc::new(WorkerState {
        short_name: args.short_name.clone(),
        entry_point: args.entry_point.clone(),
        trigger,
        timeout: Duration::from_millis(args.timeout_ms),
        loader,
        crashed: Arc::new(AtomicBool::new(false)),
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();

    // The Supervisor reads this line to learn which port the OS actually assigned.
    println!("PORT {}", port);
    std::io::stdout().flush().ok();
    tracing::info!(function = %args.short_name, port, "worker listening");

    axum::serve(listener, host::router(state)).await?;
    Ok(())
}

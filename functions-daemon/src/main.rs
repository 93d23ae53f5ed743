//! The daemon entry point (§2 "control flow", §4.9's "Daemon entry point" ambient-stack
//! addition): wires the Registry and Supervisor together and brings up the REST
//! management API, the REST invocation router, and the RPC front-end concurrently.
//!
//! No single teacher file plays this role (the teacher's "host" is an external,
//! closed-source Azure Functions Host process it merely drives); this is built from
//! §2's control-flow description plus the `tokio::select!` multi-server idiom seen
//! throughout `golemcloud-golem`'s `*-service` binaries (`cloud-component-service/src/server.rs`:
//! one `tokio::spawn` per listener, raced with `select!`).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use once_cell::sync::OnceCell;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

use functions_core::active_server::ActiveServer;
use functions_core::config::{state_dir, Config};
use functions_core::{Error, Function, WorkerProvisioner};
use functions_registry::Registry;
use functions_rest::{invocation_router, router, RestState};
use functions_rpc::RpcService;
use functions_supervisor::{Supervisor, SupervisorConfig};

/// Flags a control-plane operator (the CLI's `start`/`restart`, or a developer running
/// the daemon directly) can pin explicitly; anything left `None` falls back to the
/// persisted [`Config`] (§6), which itself carries its own defaults.
#[derive(Parser, Debug)]
#[command(name = "functions-emulator-daemon", about = "Local functions-as-a-service emulator daemon")]
struct Args {
    /// Overrides the resolved state/config directory (mainly for tests).
    #[arg(long)]
    state_dir: Option<PathBuf>,

    #[arg(long)]
    bind_host: Option<String>,

    #[arg(long)]
    rest_port: Option<u16>,

    #[arg(long)]
    grpc_port: Option<u16>,

    #[arg(long)]
    supervisor_port: Option<u16>,

    #[arg(long)]
    use_mocks: Option<bool>,

    /// Path to the `functions-worker` binary the Supervisor spawns; defaults to
    /// resolving `functions-worker` on `PATH`.
    #[arg(long)]
    worker_binary: Option<PathBuf>,
}

/// Breaks the Registry ↔ Supervisor construction cycle (§3 "ownership": the Registry
/// depends on an abstract [`WorkerProvisioner`], the Supervisor *is* one, but the
/// Supervisor itself depends on a [`functions_core::FunctionLookup`] the Registry
/// implements). The Registry is built first against this empty cell, the Supervisor is
/// built second and wired into the cell immediately after — before either's public API
/// is reachable from a front-end, so `provision`/`teardown` never race the wiring.
struct DeferredProvisioner(OnceCell<Arc<Supervisor>>);

#[async_trait::async_trait]
impl WorkerProvisioner for DeferredProvisioner {
    async fn provision(&self, function: &Function) -> Result<(), Error> {
        self.wired().provision(function).await
    }

    async fn teardown(&self, name: &str) -> Result<(), Error> {
        self.wired().teardown(name).await
    }
}

impl DeferredProvisioner {
    fn wired(&self) -> &Arc<Supervisor> {
        self.0
            .get()
            .expect("supervisor is wired into the registry's provisioner before serving any request")
    }
}

fn init_logging(config: &Config, dir: &std::path::Path) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if config.verbose() { "debug" } else { "info" }));

    let log_path = config.log_file(dir);
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr.and(Mutex::new(log_file)))
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let dir = args.state_dir.clone().unwrap_or_else(state_dir);
    let config = Config::load(&dir)?;

    init_logging(&config, &dir)?;

    let bind_host = args.bind_host.clone().unwrap_or_else(|| config.bind_host());
    let rest_port = args.rest_port.unwrap_or_else(|| config.rest_port());
    let grpc_port = args.grpc_port.unwrap_or_else(|| config.grpc_port());
    let supervisor_port = args.supervisor_port.unwrap_or_else(|| config.supervisor_port());
    let use_mocks = args.use_mocks.unwrap_or_else(|| config.use_mocks());

    let deferred_provisioner = Arc::new(DeferredProvisioner(OnceCell::new()));
    let registry = Arc::new(Registry::open(&dir, deferred_provisioner.clone())?);

    let mut supervisor_config = SupervisorConfig {
        bind_host: bind_host.clone(),
        use_mocks,
        max_idle: Duration::from_millis(config.max_idle_ms()),
        idle_prune_interval: Duration::from_millis(config.idle_prune_interval_ms()),
        log_file: Some(config.log_file(&dir)),
        ..SupervisorConfig::default()
    };
    if let Some(worker_binary) = args.worker_binary.clone() {
        supervisor_config.worker_binary = worker_binary;
    }

    let supervisor = Arc::new(Supervisor::new(registry.clone(), supervisor_config));
    deferred_provisioner
        .0
        .set(supervisor.clone())
        .unwrap_or_else(|_| panic!("supervisor wired into the deferred provisioner exactly once"));

    let pruner = supervisor.spawn_idle_pruner();

    let rest_state = RestState {
        registry: registry.clone(),
        supervisor: supervisor.clone(),
    };

    let rest_addr: SocketAddr = format!("{}:{}", bind_host, rest_port).parse()?;
    let supervisor_addr: SocketAddr = format!("{}:{}", bind_host, supervisor_port).parse()?;
    let grpc_addr: SocketAddr = format!("{}:{}", bind_host, grpc_port).parse()?;

    // §7: "failure to bind any front-end port — daemon exits non-zero." Binding all
    // three up front, before writing the liveness record, makes that failure fatal
    // rather than half-started.
    let rest_listener = tokio::net::TcpListener::bind(rest_addr).await?;
    let invocation_listener = tokio::net::TcpListener::bind(supervisor_addr).await?;

    ActiveServer {
        pid: std::process::id(),
        rest_port,
        grpc_port,
        supervisor_port,
        started_at: Utc::now(),
    }
    .write(&dir)?;

    tracing::info!(rest_port, grpc_port, supervisor_port, "functions emulator daemon STARTED");

    let rest_server = tokio::spawn(axum::serve(rest_listener, router(rest_state.clone())).into_future());
    let invocation_server =
        tokio::spawn(axum::serve(invocation_listener, invocation_router(rest_state.clone())).into_future());

    let rpc_service = RpcService::new(registry.clone(), supervisor.clone()).into_server();
    let grpc_server = tokio::spawn(async move {
        tonic::transport::Server::builder()
            .add_service(rpc_service)
            .serve(grpc_addr)
            .await
    });

    tokio::select! {
        res = rest_server => log_join("REST front-end", res),
        res = invocation_server => log_join("invocation router", res),
        res = grpc_server => log_join("RPC front-end", res),
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    pruner.abort();
    let _ = ActiveServer::clear(&dir);
    tracing::info!("functions emulator daemon STOPPED");
    Ok(())
}

fn log_join<E: std::fmt::Debug>(server: &str, res: Result<Result<(), E>, tokio::task::JoinError>) {
    match res {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(server, error = ?e, "front-end server exited with an error"),
        Err(e) => tracing::error!(server, error = %e, "front-end server task panicked"),
    }
}

/// Waits for either ctrl-c or, on unix, SIGTERM — daemon shutdown cancels all in-flight
/// invocations and the front-end servers (§5 "cancellation").
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deferred_provisioner_panics_if_queried_before_wiring() {
        let deferred = DeferredProvisioner(OnceCell::new());
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| deferred.wired()));
        assert!(result.is_err());
    }
}

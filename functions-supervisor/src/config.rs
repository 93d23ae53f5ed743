//! Supervisor-level configuration (§4.4's "Configuration (enumerated)" list). Distinct
//! from the CLI/daemon's persisted [`functions_core::config::Config`] — this is the
//! narrower, already-resolved set of knobs the pool itself needs.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Host the supervisor's own invocation router listens on.
    pub bind_host: String,
    /// Path to the `functions-worker` binary this supervisor spawns.
    pub worker_binary: PathBuf,
    /// Cadence at which `prune()` is invoked in the background.
    pub idle_prune_interval: Duration,
    /// A worker idle longer than this is evicted by `prune()`.
    pub max_idle: Duration,
    /// Injects the in-process mock loader into spawned workers instead of `node`.
    pub use_mocks: bool,
    /// Upper bound on how long a cold start may take before failing fast.
    pub spawn_timeout: Duration,
    /// Grace period between SIGTERM and SIGKILL when closing a worker.
    pub shutdown_grace: Duration,
    /// Forwarded to each spawned worker as `--log-file` (§4.9: "the Worker additionally
    /// appends structured invocation/crash records to the configured `logFile`").
    pub log_file: Option<PathBuf>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        SupervisorConfig {
            bind_host: "localhost".to_owned(),
            worker_binary: PathBuf::from("functions-worker"),
            idle_prune_interval: Duration::from_millis(60_000),
            max_idle: Duration::from_millis(600_000),
            use_mocks: true,
            spawn_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(5),
            log_file: None,
        }
    }
}

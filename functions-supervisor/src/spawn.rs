//! Spawns a `functions-worker` child process for one [`Function`] and waits for it to
//! become healthy (§4.4 cold-start path). Grounded in the teacher's
//! `azure-functions-sdk/src/commands/run.rs` (`Command::new(...).spawn()`, wait on the
//! child, surface a `String` error on failure) generalized from a one-shot "run to
//! completion" child to a long-lived one this crate keeps a handle to.

use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use functions_core::{Error, Function, Trigger};

use crate::config::SupervisorConfig;
use crate::proxy::{wait_for_healthz, HyperClient};
use crate::WorkerHandle;

pub async fn spawn_worker(
    client: &HyperClient,
    function: &Function,
    config: &SupervisorConfig,
    debug_port: Option<u16>,
) -> Result<WorkerHandle, Error> {
    let mut command = Command::new(&config.worker_binary);
    command
        .arg("--short-name")
        .arg(function.short_name())
        .arg("--entry-point")
        .arg(&function.entry_point)
        .arg("--timeout-ms")
        .arg(function.timeout.as_millis().to_string())
        .arg("--use-mocks")
        .arg(config.use_mocks.to_string());

    match &function.trigger {
        Trigger::Http => {
            command.arg("--trigger-kind").arg("http");
        }
        Trigger::PubSub { topic } => {
            command
                .arg("--trigger-kind")
                .arg("pubsub")
                .arg("--trigger-resource")
                .arg(topic);
        }
        Trigger::Storage { bucket } => {
            command
                .arg("--trigger-kind")
                .arg("storage")
                .arg("--trigger-resource")
                .arg(bucket);
        }
        Trigger::Event {
            event_type,
            resource,
            service,
        } => {
            command
                .arg("--trigger-kind")
                .arg("event")
                .arg("--trigger-resource")
                .arg(resource)
                .arg("--trigger-event-type")
                .arg(event_type);
            if let Some(service) = service {
                command.arg("--trigger-service").arg(service);
            }
        }
    }

    if let functions_core::model::SourceLocation::LocalPath { path } = &function.source {
        command.arg("--source-dir").arg(path);
    }
    if let Some(debug_port) = debug_port {
        command.arg("--debug-port").arg(debug_port.to_string());
    }
    if let Some(log_file) = &config.log_file {
        command.arg("--log-file").arg(log_file);
    }

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| Error::internal(format!("failed to spawn worker: {}", e)))?;

    let pid = child
        .id()
        .ok_or_else(|| Error::internal("spawned worker has no pid"))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::internal("spawned worker has no stdout"))?;
    let mut reader = BufReader::new(stdout);
    let mut line = String::new();

    let read_result = tokio::time::timeout(config.spawn_timeout, reader.read_line(&mut line)).await;
    let port: u16 = match read_result {
        Ok(Ok(n)) if n > 0 => line
            .trim()
            .strip_prefix("PORT ")
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| Error::internal("worker did not report a port"))?,
        _ => {
            let _ = child.start_kill();
            return Err(Error::internal(
                "worker failed to start within the spawn timeout",
            ));
        }
    };

    if let Err(e) = wait_for_healthz(client, port, config.spawn_timeout).await {
        let _ = child.start_kill();
        return Err(e);
    }

    Ok(WorkerHandle::new(
        function.name.clone(),
        pid,
        port,
        function.trigger.kind_name().to_owned(),
        function.timeout,
        debug_port,
        child,
    ))
}

//! `start | stop | restart | kill | status | clear | prune` (§4.7): manage the daemon
//! process itself. Grounded on the teacher's `run.rs` spawn-and-report idiom
//! (`Command::new(...).spawn()`, `print_running`/`print_success`/`print_failure`), with
//! the daemon left detached rather than waited on — this tool's job ends once the
//! daemon reports healthy, unlike the teacher's own `func host start` which it blocks on
//! for the program's whole lifetime.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use functions_core::active_server::ActiveServer;
use functions_core::config::Config;

use crate::client::Client;
use crate::failure::Failure;
use crate::util::{print_failure, print_running, print_success};

const DAEMON_BINARY: &str = "functions-emulator-daemon";

pub async fn start(dir: &Path, config: &Config, foreground: bool) -> Result<(), Failure> {
    if let Some(active) = ActiveServer::read(dir) {
        if active.is_alive() {
            println!("functions emulator daemon already RUNNING (pid {})", active.pid);
            return Ok(());
        }
    }

    print_running(&format!("spawning '{}'", DAEMON_BINARY));
    let mut command = std::process::Command::new(DAEMON_BINARY);
    command.arg("--state-dir").arg(dir);
    if foreground {
        command.stdin(Stdio::inherit()).stdout(Stdio::inherit()).stderr(Stdio::inherit());
    } else {
        command.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());
    }
    let child = command.spawn().map_err(|e| {
        print_failure();
        Failure::Operational(format!(
            "failed to spawn '{}': {} (is it on PATH?)",
            DAEMON_BINARY, e
        ))
    })?;
    print_success();
    // Detached: dropping `child` here does not kill it, it just stops us from waiting.
    drop(child);

    if foreground {
        return Ok(());
    }

    print_running("waiting for the daemon to become healthy");
    let client = Client::new(config);
    let timeout = Duration::from_millis(config.control_timeout_ms());
    if client.wait_until_healthy(timeout).await {
        print_success();
        Ok(())
    } else {
        print_failure();
        Err(Failure::Operational(format!(
            "daemon did not become healthy within {:?}",
            timeout
        )))
    }
}

pub async fn stop(dir: &Path, config: &Config) -> Result<(), Failure> {
    let Some(active) = ActiveServer::read(dir) else {
        println!("functions emulator daemon is not running");
        return Ok(());
    };
    if !active.is_alive() {
        let _ = ActiveServer::clear(dir);
        println!("functions emulator daemon is not running");
        return Ok(());
    }

    print_running(&format!("stopping daemon (pid {})", active.pid));
    send_signal(active.pid, sysinfo::Signal::Term);

    let grace = Duration::from_millis(config.control_timeout_ms());
    let deadline = tokio::time::Instant::now() + grace;
    while process_alive(active.pid) {
        if tokio::time::Instant::now() >= deadline {
            send_signal(active.pid, sysinfo::Signal::Kill);
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    let _ = ActiveServer::clear(dir);
    print_success();
    Ok(())
}

/// `kill` (§4.7): "sends an immediate termination signal without graceful shutdown" —
/// unlike `stop`, no SIGTERM-then-wait, straight to SIGKILL.
pub async fn kill(dir: &Path, _config: &Config) -> Result<(), Failure> {
    let Some(active) = ActiveServer::read(dir) else {
        println!("functions emulator daemon is not running");
        return Ok(());
    };
    print_running(&format!("killing daemon (pid {})", active.pid));
    send_signal(active.pid, sysinfo::Signal::Kill);
    let _ = ActiveServer::clear(dir);
    print_success();
    Ok(())
}

pub async fn status(dir: &Path, _config: &Config, json: bool) -> Result<(), Failure> {
    let running = ActiveServer::read(dir).filter(ActiveServer::is_alive);
    if json {
        let value = match &running {
            Some(active) => serde_json::json!({
                "status": "RUNNING",
                "pid": active.pid,
                "restPort": active.rest_port,
                "grpcPort": active.grpc_port,
                "supervisorPort": active.supervisor_port,
                "startedAt": active.started_at,
            }),
            None => serde_json::json!({ "status": "STOPPED" }),
        };
        println!("{}", serde_json::to_string_pretty(&value).expect("status json serialises"));
    } else {
        match &running {
            Some(active) => println!(
                "RUNNING (pid {}, rest {}, grpc {}, invocations {})",
                active.pid, active.rest_port, active.grpc_port, active.supervisor_port
            ),
            None => println!("STOPPED"),
        }
    }
    Ok(())
}

/// `clear` (§4.7, new — the distilled spec names the verb but not its exact scope):
/// wipes the persisted Functions/Operations catalogue. Refuses while the daemon is
/// running since the daemon's in-memory worker pool would otherwise keep referring to
/// functions the catalogue no longer has, the same "stop before you reset state"
/// discipline `git gc`/`cargo clean` expect of a quiescent working tree.
pub async fn clear(dir: &Path, _config: &Config) -> Result<(), Failure> {
    if ActiveServer::read(dir).filter(ActiveServer::is_alive).is_some() {
        return Err(Failure::Operational(
            "the daemon is running; run 'functions stop' before 'functions clear'".to_owned(),
        ));
    }

    print_running("clearing emulator state");
    for entry in [".functions", ".operations"] {
        let path = dir.join(entry);
        if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                print_failure();
                return Err(Failure::Operational(format!("failed to remove {}: {}", path.display(), e)));
            }
        }
    }
    print_success();
    Ok(())
}

pub async fn prune(config: &Config) -> Result<(), Failure> {
    print_running("pruning idle workers");
    let client = Client::new(config);
    match client.admin_prune().await {
        Ok(()) => {
            print_success();
            Ok(())
        }
        Err(e) => {
            print_failure();
            Err(e)
        }
    }
}

fn process_alive(pid: u32) -> bool {
    let mut system = sysinfo::System::new();
    let spid = sysinfo::Pid::from_u32(pid);
    system.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[spid]), true);
    system.process(spid).is_some()
}

fn send_signal(pid: u32, signal: sysinfo::Signal) {
    let mut system = sysinfo::System::new();
    let spid = sysinfo::Pid::from_u32(pid);
    system.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[spid]), true);
    if let Some(process) = system.process(spid) {
        process.kill_with(signal);
    }
}

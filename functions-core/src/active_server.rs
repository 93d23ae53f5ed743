//! The `.active-server` liveness record (§6): written by the daemon on `start`, read by
//! the CLI to answer `status` without dialing the daemon itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Error;

/// A snapshot of a running daemon's identity and front-door ports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveServer {
    pub pid: u32,
    pub rest_port: u16,
    pub grpc_port: u16,
    pub supervisor_port: u16,
    pub started_at: DateTime<Utc>,
}

fn path(dir: &Path) -> std::path::PathBuf {
    dir.join(".active-server")
}

impl ActiveServer {
    /// Writes the liveness record, creating `dir` if necessary.
    pub fn write(&self, dir: &Path) -> Result<(), Error> {
        std::fs::create_dir_all(dir)
            .map_err(|e| Error::internal(format!("failed to create state directory: {}", e)))?;
        let json = serde_json::to_string(self)
            .map_err(|e| Error::internal(format!("failed to serialize active-server: {}", e)))?;
        std::fs::write(path(dir), json)
            .map_err(|e| Error::internal(format!("failed to write active-server file: {}", e)))
    }

    /// Reads the liveness record, if one was ever written.
    pub fn read(dir: &Path) -> Option<ActiveServer> {
        let contents = std::fs::read_to_string(path(dir)).ok()?;
        serde_json::from_str(&contents).ok()
    }

    /// Removes the liveness record (`stop`/`kill`/`clear`).
    pub fn clear(dir: &Path) -> Result<(), Error> {
        match std::fs::remove_file(path(dir)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::internal(format!(
                "failed to remove active-server file: {}",
                e
            ))),
        }
    }

    /// Whether the recorded process id still corresponds to a live process.
    pub fn is_alive(&self) -> bool {
        let mut system = sysinfo::System::new();
        let pid = sysinfo::Pid::from_u32(self.pid);
        system.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[pid]), true);
        system.process(pid).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let record = ActiveServer {
            pid: std::process::id(),
            rest_port: 8088,
            grpc_port: 8089,
            supervisor_port: 8090,
            started_at: Utc::now(),
        };
        record.write(dir.path()).unwrap();

        let loaded = ActiveServer::read(dir.path()).unwrap();
        assert_eq!(loaded.rest_port, 8088);

        ActiveServer::clear(dir.path()).unwrap();
        assert!(ActiveServer::read(dir.path()).is_none());
    }

    #[test]
    fn it_reports_its_own_process_as_alive() {
        let record = ActiveServer {
            pid: std::process::id(),
            rest_port: 8088,
            grpc_port: 8089,
            supervisor_port: 8090,
            started_at: Utc::now(),
        };
        assert!(record.is_alive());
    }
}

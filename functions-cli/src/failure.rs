//! The CLI's own error type (§4.7: "Exit codes: 0 success, 1 operational failure,
//! 2 validation failure"). Distinct from [`functions_core::Error`] — this crate never
//! returns that type directly since the exit code it maps to depends on *why* the CLI
//! itself failed (bad arguments vs. a daemon round-trip that errored out), not just the
//! remote error kind.

use std::fmt;

#[derive(Debug)]
pub enum Failure {
    /// Maps to exit code `2`: the user gave the CLI something it could reject without
    /// ever dialing the daemon (a malformed name, a missing required flag combination).
    Validation(String),
    /// Maps to exit code `1`: everything else — the daemon wasn't reachable, the daemon
    /// rejected the request, a spawn failed, an operation completed with an error.
    Operational(String),
}

impl Failure {
    pub fn exit_code(&self) -> i32 {
        match self {
            Failure::Validation(_) => 2,
            Failure::Operational(_) => 1,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Failure::Validation(m) | Failure::Operational(m) => m,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl From<functions_core::Error> for Failure {
    fn from(e: functions_core::Error) -> Self {
        match e.kind {
            functions_core::ErrorKind::InvalidArgument => Failure::Validation(e.message),
            _ => Failure::Operational(e.message),
        }
    }
}

impl From<reqwest::Error> for Failure {
    fn from(e: reqwest::Error) -> Self {
        Failure::Operational(format!("failed to reach the emulator daemon: {}", e))
    }
}

impl From<tonic::Status> for Failure {
    fn from(s: tonic::Status) -> Self {
        Failure::Operational(format!("{}: {}", s.code(), s.message()))
    }
}

impl From<tonic::transport::Error> for Failure {
    fn from(e: tonic::transport::Error) -> Self {
        Failure::Operational(format!("failed to reach the emulator daemon: {}", e))
    }
}

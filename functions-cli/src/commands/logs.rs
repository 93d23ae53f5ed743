//! `logs {read,clear}` (§4.7, §4.9): operates directly on the configured `logFile`
//! rather than round-tripping through the daemon, the same way the teacher's own
//! `logs` command tails a local file the host process writes to.

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use clap::Subcommand;
use functions_core::config::Config;

use crate::failure::Failure;

#[derive(Subcommand)]
pub enum LogsAction {
    /// Prints the last `--lines` lines of the log file (default: everything).
    Read {
        #[arg(long)]
        lines: Option<usize>,
    },
    /// Truncates the log file.
    Clear,
}

pub fn run(dir: &Path, config: &Config, action: LogsAction) -> Result<(), Failure> {
    let log_file = config.log_file(dir);
    match action {
        LogsAction::Read { lines } => read(&log_file, lines),
        LogsAction::Clear => clear(&log_file),
    }
}

fn read(log_file: &Path, lines: Option<usize>) -> Result<(), Failure> {
    let mut file = match std::fs::File::open(log_file) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            println!("no log file yet at {}", log_file.display());
            return Ok(());
        }
        Err(e) => {
            return Err(Failure::Operational(format!(
                "failed to open {}: {}",
                log_file.display(),
                e
            )))
        }
    };

    let mut contents = String::new();
    file.seek(SeekFrom::Start(0))
        .and_then(|_| file.read_to_string(&mut contents))
        .map_err(|e| Failure::Operational(format!("failed to read {}: {}", log_file.display(), e)))?;

    match lines {
        Some(n) => {
            let all: Vec<&str> = contents.lines().collect();
            let start = all.len().saturating_sub(n);
            for line in &all[start..] {
                println!("{}", line);
            }
        }
        None => print!("{}", contents),
    }
    Ok(())
}

fn clear(log_file: &Path) -> Result<(), Failure> {
    match std::fs::remove_file(log_file) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Failure::Operational(format!(
            "failed to clear {}: {}",
            log_file.display(),
            e
        ))),
    }
}

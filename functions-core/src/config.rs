//! The persisted configuration store (§6): a small `serde_json`-backed key-value file
//! under the OS config directory, read once at CLI/daemon startup.

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Error;

/// The product name the config/state directory is keyed by.
pub const PRODUCT_NAME: &str = "functions-emulator";

/// Resolves the directory persisted state lives under, honoring `XDG_CONFIG_HOME`
/// (§6) before falling back to the platform config directory.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(dir).join(PRODUCT_NAME);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(PRODUCT_NAME)
}

fn config_path(dir: &Path) -> PathBuf {
    dir.join("config.json")
}

/// The typed configuration the daemon and CLI share, with an explicit default per
/// option (§6's table). Values round-trip through a flat JSON object on disk so the
/// CLI's `config set <key> <value>` can write arbitrary recognised or unrecognised
/// keys without the schema changing shape.
#[derive(Debug, Clone, Default)]
pub struct Config {
    values: BTreeMap<String, Value>,
}

impl Config {
    /// Loads the config from `dir`, returning an empty (all-defaults) config if the
    /// file doesn't exist yet.
    pub fn load(dir: &Path) -> Result<Self, Error> {
        let path = config_path(dir);
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let values: BTreeMap<String, Value> = serde_json::from_str(&contents)
                    .map_err(|e| Error::internal(format!("corrupt config file: {}", e)))?;
                Ok(Config { values })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(Error::internal(format!("failed to read config file: {}", e))),
        }
    }

    /// Writes the config to `dir`, creating the directory if necessary.
    pub fn save(&self, dir: &Path) -> Result<(), Error> {
        std::fs::create_dir_all(dir)
            .map_err(|e| Error::internal(format!("failed to create config directory: {}", e)))?;
        let json = serde_json::to_string_pretty(&self.values)
            .map_err(|e| Error::internal(format!("failed to serialize config: {}", e)))?;
        std::fs::write(config_path(dir), json)
            .map_err(|e| Error::internal(format!("failed to write config file: {}", e)))
    }

    /// Sets a key to an arbitrary JSON value (`config set`).
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Removes a key (`config reset` on a single key clears it back to its default).
    pub fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }

    /// Clears every key (`config reset` with no key).
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Lists every explicitly-set key/value pair (`config list`).
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    fn int(&self, key: &str) -> Option<u64> {
        self.values.get(key).and_then(Value::as_u64)
    }

    fn boolean(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(Value::as_bool)
    }

    pub fn project_id(&self) -> Option<&str> {
        self.str("projectId")
    }

    pub fn region(&self) -> String {
        self.str("region").unwrap_or("us-central1").to_owned()
    }

    pub fn bind_host(&self) -> String {
        self.str("bindHost").unwrap_or("localhost").to_owned()
    }

    pub fn host(&self) -> String {
        self.str("host").unwrap_or("localhost").to_owned()
    }

    pub fn rest_port(&self) -> u16 {
        self.int("restPort").unwrap_or(8088) as u16
    }

    pub fn grpc_port(&self) -> u16 {
        self.int("grpcPort").unwrap_or(8089) as u16
    }

    pub fn supervisor_port(&self) -> u16 {
        self.int("supervisorPort").unwrap_or(8090) as u16
    }

    pub fn log_file(&self, dir: &Path) -> PathBuf {
        self.str("logFile")
            .map(PathBuf::from)
            .unwrap_or_else(|| dir.join("functions-emulator.log"))
    }

    pub fn control_timeout_ms(&self) -> u64 {
        self.int("timeout").unwrap_or(10_000)
    }

    pub fn max_idle_ms(&self) -> u64 {
        self.int("maxIdle").unwrap_or(600_000)
    }

    pub fn idle_prune_interval_ms(&self) -> u64 {
        self.int("idlePruneInterval").unwrap_or(60_000)
    }

    pub fn use_mocks(&self) -> bool {
        self.boolean("useMocks").unwrap_or(true)
    }

    pub fn verbose(&self) -> bool {
        self.boolean("verbose").unwrap_or(false)
    }

    /// `rest` (default) or `grpc`: which front-end the CLI dials.
    pub fn service(&self) -> String {
        self.str("service").unwrap_or("rest").to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_defaults_every_option_when_nothing_is_set() {
        let config = Config::default();
        assert_eq!(config.region(), "us-central1");
        assert_eq!(config.bind_host(), "localhost");
        assert_eq!(config.rest_port(), 8088);
        assert!(config.use_mocks());
        assert_eq!(config.service(), "rest");
    }

    #[test]
    fn it_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.set("restPort", serde_json::json!(9999));
        config.set("projectId", serde_json::json!("my-proj"));
        config.save(dir.path()).unwrap();

        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.rest_port(), 9999);
        assert_eq!(loaded.project_id(), Some("my-proj"));
    }

    #[test]
    fn it_loads_an_empty_config_when_the_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.entries().count(), 0);
    }

    #[test]
    fn reset_clears_every_key() {
        let mut config = Config::default();
        config.set("restPort", serde_json::json!(1234));
        config.clear();
        assert_eq!(config.rest_port(), 8088);
    }
}

//! `config {list,set,reset}` (§4.7, §6): a thin CRUD wrapper around the persisted
//! [`Config`] file, in the same spirit as the teacher's own flat config file reads.

use std::path::Path;

use clap::Subcommand;
use functions_core::config::Config;

use crate::failure::Failure;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Prints every explicitly-set key/value pair.
    List,
    /// Sets `key` to `value`; numeric/boolean-looking values are stored typed.
    Set { key: String, value: String },
    /// Clears one key back to its default, or every key when `key` is omitted.
    Reset { key: Option<String> },
}

pub fn run(dir: &Path, mut config: Config, action: ConfigAction) -> Result<(), Failure> {
    match action {
        ConfigAction::List => {
            for (key, value) in config.entries() {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Set { key, value } => {
            config.set(key, parse_value(&value));
            config.save(dir)?;
        }
        ConfigAction::Reset { key: Some(key) } => {
            config.remove(&key);
            config.save(dir)?;
        }
        ConfigAction::Reset { key: None } => {
            config.clear();
            config.save(dir)?;
        }
    }
    Ok(())
}

/// `config set` accepts a bare string on the command line; this recovers the typed
/// value (bool/number) the getters in [`Config`] expect, falling back to a JSON string.
fn parse_value(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_parses_bare_strings_as_json_strings() {
        assert_eq!(parse_value("localhost"), serde_json::json!("localhost"));
    }

    #[test]
    fn it_parses_numbers_and_booleans_typed() {
        assert_eq!(parse_value("9999"), serde_json::json!(9999));
        assert_eq!(parse_value("true"), serde_json::json!(true));
    }
}

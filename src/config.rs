//! Parser configuration
//!
//! Tunables for link title resolution:
//! - Fetch timeouts (each title fetch is bounded)
//! - Fetch fan-out (sequential or a bounded number in flight)
//!
//! Loaded from `<config dir>/msgparse/config.json` when present.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::error::{ParseError, Result};

/// How distinct URLs are fetched while resolving titles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// One URL after another on the parse worker
    Sequential,
    /// Up to `max_in_flight` fetches at once, all joined before assembly
    Concurrent { max_in_flight: usize },
}

impl FetchMode {
    /// Number of fetches allowed at once.
    pub fn max_in_flight(&self) -> usize {
        match self {
            FetchMode::Sequential => 1,
            FetchMode::Concurrent { max_in_flight } => *max_in_flight,
        }
    }
}

impl Default for FetchMode {
    fn default() -> Self {
        FetchMode::Concurrent { max_in_flight: 4 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub connect_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
    pub user_agent: String,
    pub fetch_mode: FetchMode,
    /// Response bodies are cut at this many bytes before looking for `<title>`.
    pub max_body_bytes: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            fetch_timeout_secs: 10,
            user_agent: concat!("msgparse/", env!("CARGO_PKG_VERSION")).to_string(),
            fetch_mode: FetchMode::default(),
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl ParserConfig {
    /// Load config from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let data = fs::read(path)?;
        let config: Self = serde_json::from_slice(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the default location, falling back to defaults on any error.
    pub fn load_or_default() -> Self {
        let path = match config_path() {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "no config directory, using defaults");
                return Self::default();
            }
        };

        Self::load(&path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "ignoring unreadable config");
            Self::default()
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout_secs == 0 || self.fetch_timeout_secs == 0 {
            return Err(ParseError::config("timeouts must be at least 1 second"));
        }
        if self.fetch_mode.max_in_flight() == 0 {
            return Err(ParseError::config("max_in_flight must be at least 1"));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Get the path of the config file
pub fn config_path() -> Result<PathBuf> {
    let config_dir =
        dirs::config_dir().ok_or_else(|| ParseError::config("failed to get config directory"))?;

    Ok(config_dir.join("msgparse").join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().expect("tempdir");
        let config = ParserConfig::load(&dir.path().join("absent.json")).expect("load");
        assert_eq!(config, ParserConfig::default());
        assert_eq!(config.fetch_timeout_secs, 10);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{ "fetch_timeout_secs": 3, "fetch_mode": "sequential" }"#,
        )
        .expect("write config");

        let config = ParserConfig::load(&path).expect("load");
        assert_eq!(config.fetch_timeout_secs, 3);
        assert_eq!(config.fetch_mode, FetchMode::Sequential);
        assert_eq!(config.max_body_bytes, 1024 * 1024);
        assert_eq!(config.connect_timeout_secs, 5);
    }

    #[test]
    fn test_concurrent_mode_round_trips_through_json() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{ "fetch_mode": { "concurrent": { "max_in_flight": 8 } } }"#,
        )
        .expect("write config");

        let config = ParserConfig::load(&path).expect("load");
        assert_eq!(config.fetch_mode.max_in_flight(), 8);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "fetch_timeout_secs": 0 }"#).expect("write config");

        let error = ParserConfig::load(&path).expect_err("zero timeout is invalid");
        assert!(matches!(error, ParseError::Config { .. }));
    }

    #[test]
    fn test_emoticon_bound_is_not_configurable() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "max_emoticon_len": 3 }"#).expect("write config");

        let config = ParserConfig::load(&path).expect("unknown keys are ignored");
        assert_eq!(config, ParserConfig::default());

        let parser = crate::MessageParser::offline(config);
        let result = parser.scan("(abcd)").expect("found");
        assert_eq!(result.emoticons, Some(vec!["abcd".to_string()]));
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").expect("write config");

        let error = ParserConfig::load(&path).expect_err("bad json");
        assert!(matches!(error, ParseError::Json(_)));
    }

    #[test]
    fn test_sequential_mode_has_one_in_flight() {
        assert_eq!(FetchMode::Sequential.max_in_flight(), 1);
        assert_eq!(FetchMode::default().max_in_flight(), 4);
    }
}

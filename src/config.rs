//! Session configuration.

use crate::game::Mark;
use crate::reconnect::ReconnectPolicy;
use crate::transport::RoomOptions;
use derive_getters::Getters;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Configuration error.
#[derive(Debug, Clone, Display)]
#[display("Configuration error: {}", message)]
pub struct ConfigError {
    /// What went wrong.
    pub message: String,
}

impl ConfigError {
    /// Creates a new configuration error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Session configuration, loadable from TOML.
///
/// Every field has a default, so an empty file (or no file) is a valid
/// configuration.
#[derive(Debug, Clone, Getters, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Mark that opens every match.
    #[serde(default = "default_first_mover")]
    first_mover: Mark,

    /// Mark played by the authority participant.
    #[serde(default = "default_authority_mark")]
    authority_mark: Mark,

    /// Room admission settings.
    #[serde(default)]
    room: RoomSection,

    /// Recovery settings for dropped connections.
    #[serde(default)]
    reconnect: ReconnectSection,
}

fn default_first_mover() -> Mark {
    Mark::X
}

fn default_authority_mark() -> Mark {
    Mark::X
}

/// Room admission settings.
#[derive(Debug, Clone, Copy, Getters, Serialize, Deserialize)]
pub struct RoomSection {
    /// Participants admitted per room.
    #[serde(default = "default_capacity")]
    capacity: usize,
}

fn default_capacity() -> usize {
    2
}

impl Default for RoomSection {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

/// Recovery settings for dropped connections.
#[derive(Debug, Clone, Copy, Getters, Serialize, Deserialize)]
pub struct ReconnectSection {
    /// Attempts before giving up.
    #[serde(default = "default_max_attempts")]
    max_attempts: u32,

    /// Fixed delay between attempts, in milliseconds.
    #[serde(default = "default_retry_interval_ms")]
    retry_interval_ms: u64,

    /// Delay between reporting failure and abandoning the session, in
    /// milliseconds.
    #[serde(default = "default_abandon_delay_ms")]
    abandon_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_interval_ms() -> u64 {
    2000
}

fn default_abandon_delay_ms() -> u64 {
    2000
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_interval_ms: default_retry_interval_ms(),
            abandon_delay_ms: default_abandon_delay_ms(),
        }
    }
}

impl MatchConfig {
    /// Loads configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;

        info!(first_mover = %config.first_mover, "Config loaded successfully");
        Ok(config)
    }

    /// Room options derived from this configuration.
    pub fn room_options(&self) -> RoomOptions {
        RoomOptions::new(*self.room.capacity())
    }

    /// Reconnect policy derived from this configuration.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: *self.reconnect.max_attempts(),
            retry_interval: Duration::from_millis(*self.reconnect.retry_interval_ms()),
            abandon_delay: Duration::from_millis(*self.reconnect.abandon_delay_ms()),
        }
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            first_mover: default_first_mover(),
            authority_mark: default_authority_mark(),
            room: RoomSection::default(),
            reconnect: ReconnectSection::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_session_constants() {
        let config = MatchConfig::default();

        assert_eq!(*config.first_mover(), Mark::X);
        assert_eq!(*config.authority_mark(), Mark::X);
        assert_eq!(config.room_options().capacity, 2);

        let policy = config.reconnect_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.retry_interval, Duration::from_secs(2));
    }

    #[test]
    fn empty_toml_is_a_valid_config() {
        let config: MatchConfig = toml::from_str("").expect("defaults fill in");
        assert_eq!(*config.first_mover(), Mark::X);
    }

    #[test]
    fn partial_toml_overrides_defaults() {
        let config: MatchConfig = toml::from_str(
            r#"
            first_mover = "O"

            [reconnect]
            max_attempts = 5
            "#,
        )
        .expect("valid config");

        assert_eq!(*config.first_mover(), Mark::O);
        assert_eq!(config.reconnect_policy().max_attempts, 5);
        // Untouched section keeps its default.
        assert_eq!(
            config.reconnect_policy().retry_interval,
            Duration::from_secs(2)
        );
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("match.toml");
        std::fs::write(&path, "authority_mark = \"O\"\n").expect("write config");

        let config = MatchConfig::from_file(&path).expect("load");

        assert_eq!(*config.authority_mark(), Mark::O);
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = MatchConfig::from_file("no-such-file.toml");
        assert!(result.is_err());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("match.toml");
        std::fs::write(&path, "first_mover = \"Q\"\n").expect("write config");

        let result = MatchConfig::from_file(&path);
        assert!(result.is_err());
    }
}

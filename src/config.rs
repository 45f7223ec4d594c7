//! Configuration file for klances
//!
//! Read from `--config <path>` or `~/.klances/config.toml`. Every key is
//! optional; command line flags override whatever the file says.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use klances_logs::{BackoffConfig, TailerConfig};

pub const APP_NAME: &str = "klances";

/// Possible errors while loading the configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// Cannot read the configuration file.
    #[error("cannot read configuration file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file is not valid TOML or has unexpected keys.
    #[error("cannot parse configuration file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Values that cannot work together.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Reconnect delays of log streams, in milliseconds.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Backoff {
    pub initial_ms: u64,
    pub max_ms: u64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial_ms: 1_000,
            max_ms: 30_000,
        }
    }
}

/// Application configuration.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub poll_interval_ms: u64,
    pub frame_interval_ms: u64,

    /// Lines kept per pod
    pub log_capacity: usize,

    /// Lines per pod handed to the renderer
    pub log_window: usize,

    pub grace_ticks: u32,

    /// Initial namespace selection, empty for all
    pub namespaces: Vec<String>,

    pub backoff: Backoff,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            frame_interval_ms: 250,
            log_capacity: 1_000,
            log_window: 200,
            grace_ticks: 2,
            namespaces: Vec::new(),
            backoff: Backoff::default(),
        }
    }
}

impl Config {
    /// Returns the default configuration path, `~/.klances/config.toml`.
    pub fn default_path() -> PathBuf {
        match std::env::home_dir() {
            Some(path) => path.join(format!(".{APP_NAME}")).join("config.toml"),
            None => PathBuf::from("config.toml"),
        }
    }

    /// Loads the configuration from `path`, or from the default path when
    /// none is given. A missing default file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (Self::default_path(), false),
        };

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if !required && err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No configuration file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        let config: Self =
            toml::from_str(&content).map_err(|source| ConfigError::Parse { path, source })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that would make the dashboard misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_zero = [
            ("poll_interval_ms", self.poll_interval_ms),
            ("frame_interval_ms", self.frame_interval_ms),
            ("log_capacity", self.log_capacity as u64),
            ("log_window", self.log_window as u64),
            ("grace_ticks", u64::from(self.grace_ticks)),
            ("backoff.initial_ms", self.backoff.initial_ms),
            ("backoff.max_ms", self.backoff.max_ms),
        ];
        if let Some((name, _)) = non_zero.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
        }

        if self.backoff.initial_ms > self.backoff.max_ms {
            return Err(ConfigError::Invalid(format!(
                "backoff.initial_ms ({}) must not exceed backoff.max_ms ({})",
                self.backoff.initial_ms, self.backoff.max_ms
            )));
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn tailer(&self) -> TailerConfig {
        TailerConfig {
            grace_ticks: self.grace_ticks,
            backoff: BackoffConfig {
                initial: Duration::from_millis(self.backoff.initial_ms),
                max: Duration::from_millis(self.backoff.max_ms),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("{APP_NAME}-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_empty_file_is_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.validate().is_ok());
        assert_eq!(config.tailer(), TailerConfig::default());
    }

    #[test]
    fn test_partial_file() {
        let config: Config = toml::from_str(
            r#"
            poll_interval_ms = 5000
            namespaces = ["kube-system"]

            [backoff]
            max_ms = 60000
            "#,
        )
        .unwrap();

        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.frame_interval(), Duration::from_millis(250));
        assert_eq!(config.namespaces, vec!["kube-system".to_string()]);
        assert_eq!(config.backoff.initial_ms, 1_000);
        assert_eq!(config.tailer().backoff.max, Duration::from_secs(60));
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(toml::from_str::<Config>("poll_interval = 5").is_err());
    }

    #[test]
    fn test_validation() {
        let zero_poll = Config {
            poll_interval_ms: 0,
            ..Config::default()
        };
        let err = zero_poll.validate().unwrap_err();
        assert!(err.to_string().contains("poll_interval_ms"));

        let zero_capacity = Config {
            log_capacity: 0,
            ..Config::default()
        };
        assert!(zero_capacity.validate().is_err());

        let no_grace = Config {
            grace_ticks: 0,
            ..Config::default()
        };
        let err = no_grace.validate().unwrap_err();
        assert!(err.to_string().contains("grace_ticks"));

        let inverted = Config {
            backoff: Backoff {
                initial_ms: 10_000,
                max_ms: 1_000,
            },
            ..Config::default()
        };
        assert!(matches!(inverted.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_explicit_path() {
        let path = write_config("good.toml", "log_capacity = 50\ngrace_ticks = 4\n");
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.log_capacity, 50);
        assert_eq!(config.tailer().grace_ticks, 4);

        let bad = write_config("bad.toml", "log_capacity = \"lots\"\n");
        assert!(matches!(
            Config::load(Some(&bad)),
            Err(ConfigError::Parse { .. })
        ));

        let invalid = write_config("invalid.toml", "frame_interval_ms = 0\n");
        assert!(matches!(
            Config::load(Some(&invalid)),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_explicit_path_is_error() {
        let path = std::env::temp_dir().join("klances-does-not-exist.toml");
        assert!(matches!(
            Config::load(Some(&path)),
            Err(ConfigError::Read { .. })
        ));
    }
}

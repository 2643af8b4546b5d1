//! Layered configuration.
//!
//! Built-in defaults, then an optional config file, then `FUZZWATCH_*`
//! environment variables (nested keys use `__`, e.g.
//! `FUZZWATCH_THRESHOLDS__MIN_STABILITY=70`). Command-line flags are applied
//! on top by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::data::duration::human;
use crate::data::{Thresholds, DEFAULT_REQUIRED_FIELDS};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "FUZZWATCH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Time between poll cycles.
    #[serde(with = "human")]
    pub interval: Duration,
    /// A status file touched this recently marks its instance as starting.
    #[serde(with = "human")]
    pub recency_window: Duration,
    /// Upper bound on reading one instance.
    #[serde(with = "human")]
    pub instance_timeout: Duration,
    /// Consecutive failed cycles before the snapshot is marked stale.
    pub stale_after_failures: u32,
    /// Include dead instances in the summary figures.
    pub show_dead: bool,
    pub required_fields: Vec<String>,
    pub plot_max_points: usize,
    pub persist_state: bool,
    /// Where delta state is kept. Defaults to the XDG state directory.
    pub state_dir: Option<PathBuf>,
    /// Shell command run with a summary on stdin when new crashes appear.
    pub notify_command: Option<String>,
    #[serde(with = "human")]
    pub notify_timeout: Duration,
    /// Address for the JSON endpoint, e.g. `127.0.0.1:8080`.
    pub listen_addr: Option<String>,
    pub thresholds: Thresholds,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            recency_window: Duration::from_secs(60),
            instance_timeout: Duration::from_secs(10),
            stale_after_failures: 3,
            show_dead: false,
            required_fields: DEFAULT_REQUIRED_FIELDS.iter().map(|s| s.to_string()).collect(),
            plot_max_points: 1000,
            persist_state: true,
            state_dir: None,
            notify_command: None,
            notify_timeout: Duration::from_secs(30),
            listen_addr: None,
            thresholds: Thresholds::default(),
        }
    }
}

impl Settings {
    /// Load settings from an optional file plus the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_from(path, None)
    }

    fn load_from(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("required_fields")
                    .source(env),
            )
            .build()?;
        config.try_deserialize()
    }

    /// The state directory, falling back to `$XDG_STATE_HOME/fuzzwatch` or
    /// `$HOME/.local/state/fuzzwatch`.
    pub fn resolved_state_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.state_dir {
            return Some(dir.clone());
        }
        if let Some(state_home) = std::env::var_os("XDG_STATE_HOME").filter(|v| !v.is_empty()) {
            return Some(PathBuf::from(state_home).join("fuzzwatch"));
        }
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".local").join("state").join("fuzzwatch"))
    }
}

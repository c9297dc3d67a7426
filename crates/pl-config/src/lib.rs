//! Configuration resolution for Pearl: defaults, YAML file, then environment.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Directory name used under the platform config and data directories.
pub const APP_DIR_NAME: &str = "pearl";

/// Editor socket address, or `host:port`.
pub const NVIM_ADDRESS_ENV: &str = "NVIM_LISTEN_ADDRESS";
/// Port the palette listens on for bridge messages.
pub const BRIDGE_PORT_ENV: &str = "ZVIM_PORT";
/// Port of the launcher that shows and hides the palette pane.
pub const LOOKING_GLASS_PORT_ENV: &str = "LOOKING_GLASS_PORT";

const CONFIG_FILE_NAME: &str = "config.yaml";

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors returned while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// A value could not be parsed.
    #[error("config parse error: {0}")]
    Parse(String),
    /// A required value is not set anywhere.
    #[error("missing configuration: {0}")]
    Missing(&'static str),
}

/// Resolved palette configuration.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Editor RPC endpoint.
    pub nvim_address: Option<String>,
    /// Port for incoming bridge messages.
    pub bridge_port: Option<u16>,
    /// Port of the looking-glass launcher.
    pub looking_glass_port: Option<u16>,
    /// Text-search executable, invoked with `--vimgrep`.
    pub search_program: String,
    /// Directory holding daily todo journals.
    pub todo_dir: Option<PathBuf>,
    /// Directory for log files.
    pub log_dir: Option<PathBuf>,
    /// Rows of overlay chrome around result lists.
    pub reserved_rows: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nvim_address: None,
            bridge_port: None,
            looking_glass_port: None,
            search_program: "ag".into(),
            todo_dir: None,
            log_dir: None,
            reserved_rows: 4,
        }
    }
}

/// Connection endpoints required to run the palette.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
    pub nvim_address: String,
    pub bridge_port: u16,
    pub looking_glass_port: u16,
}

impl Config {
    /// Default config file location (`$XDG_CONFIG_HOME/pearl/config.yaml`).
    pub fn default_path() -> ConfigResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
            .ok_or(ConfigError::Missing("config directory"))
    }

    /// Read a config file; a missing file yields the defaults.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let contents =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&contents).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Overlay environment values using `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<()> {
        if let Some(address) = lookup(NVIM_ADDRESS_ENV).filter(|value| !value.is_empty()) {
            self.nvim_address = Some(address);
        }
        if let Some(port) = lookup(BRIDGE_PORT_ENV) {
            self.bridge_port = Some(parse_port(BRIDGE_PORT_ENV, &port)?);
        }
        if let Some(port) = lookup(LOOKING_GLASS_PORT_ENV) {
            self.looking_glass_port = Some(parse_port(LOOKING_GLASS_PORT_ENV, &port)?);
        }
        Ok(())
    }

    /// Load from `path` (or the default location) and apply the process environment.
    pub fn resolve(path: Option<&Path>) -> ConfigResult<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };
        let mut config = Self::load(&path)?;
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Endpoints needed by the palette, failing on the first one that is unset.
    pub fn endpoints(&self) -> ConfigResult<Endpoints> {
        Ok(Endpoints {
            nvim_address: self
                .nvim_address
                .clone()
                .ok_or(ConfigError::Missing(NVIM_ADDRESS_ENV))?,
            bridge_port: self.bridge_port.ok_or(ConfigError::Missing(BRIDGE_PORT_ENV))?,
            looking_glass_port: self
                .looking_glass_port
                .ok_or(ConfigError::Missing(LOOKING_GLASS_PORT_ENV))?,
        })
    }

    /// Todo journal directory, defaulting to `~/Todos`.
    pub fn todo_dir(&self) -> PathBuf {
        self.todo_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("Todos")
        })
    }

    /// Log directory, defaulting to the platform data directory.
    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(APP_DIR_NAME)
        })
    }

    /// The configuration as YAML.
    pub fn to_yaml(&self) -> ConfigResult<String> {
        serde_yaml::to_string(self).map_err(|err| ConfigError::Parse(err.to_string()))
    }
}

fn parse_port(name: &str, value: &str) -> ConfigResult<u16> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Parse(format!("{name}={value} is not a port number")))
}

//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::Config;
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "ASYNC_SERIAL";

/// Config file name inside the platform config directory
const CONFIG_FILE_NAME: &str = "config.toml";

/// Config file name looked up in the current directory
const LOCAL_CONFIG_FILE_NAME: &str = "async-serial.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "ASYNC_SERIAL_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `ASYNC_SERIAL_CONFIG` environment variable (explicit path)
    /// 2. `./async-serial.toml` (current directory)
    /// 3. `config.toml` in the platform config directory
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables can override any config file values.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = match config_path {
            Some(ref path) => load_from_file(path)?,
            None => Config::default(),
        };

        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    ///
    /// Environment overrides still apply; malformed ones are ignored.
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        let _ = apply_env_overrides(&mut config);

        Self {
            config_path: None,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    /// Save the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let local = PathBuf::from(LOCAL_CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }

    get_default_config_path().filter(|path| path.exists())
}

/// Platform config directory for this crate, e.g. `~/.config/async-serial`.
pub fn get_default_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "async-serial").map(|dirs| dirs.config_dir().to_path_buf())
}

pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(ConfigError::ParseError)
}

fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern `ASYNC_SERIAL_<SECTION>_<KEY>`,
/// for example `ASYNC_SERIAL_SERIAL_BAUD_RATE=115200` or
/// `ASYNC_SERIAL_WORKER_BACKEND=blocking`.
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    if let Some((_, val)) = env_override("SERIAL_DEVICE") {
        config.serial.device = Some(val);
    }
    if let Some((var, val)) = env_override("SERIAL_BAUD_RATE") {
        config.serial.baud_rate = parse_number(&var, &val, "Invalid baud rate")?;
    }
    if let Some((var, val)) = env_override("SERIAL_DATA_BITS") {
        config.serial.data_bits = parse_keyword(&var, &val)?;
    }
    if let Some((var, val)) = env_override("SERIAL_PARITY") {
        config.serial.parity = parse_keyword(&var, &val)?;
    }
    if let Some((var, val)) = env_override("SERIAL_STOP_BITS") {
        config.serial.stop_bits = parse_keyword(&var, &val)?;
    }
    if let Some((var, val)) = env_override("SERIAL_FLOW_CONTROL") {
        config.serial.flow_control = parse_keyword(&var, &val)?;
    }
    if let Some((var, val)) = env_override("SERIAL_TIMEOUT_MS") {
        config.serial.timeout_ms = parse_number(&var, &val, "Invalid timeout")?;
    }

    if let Some((var, val)) = env_override("WORKER_BACKEND") {
        config.worker.backend = parse_keyword(&var, &val)?;
    }
    if let Some((var, val)) = env_override("WORKER_READ_ERROR_PACING_MS") {
        config.worker.read_error_pacing_ms = parse_number(&var, &val, "Invalid pacing")?;
    }
    if let Some((var, val)) = env_override("WORKER_MAX_READ_ERRORS") {
        config.worker.max_read_errors = parse_number(&var, &val, "Invalid error count")?;
    }

    if let Some((_, val)) = env_override("LOGGING_LEVEL") {
        config.logging.level = val;
    }
    if let Some((var, val)) = env_override("LOGGING_FORMAT") {
        config.logging.format = parse_keyword(&var, &val)?;
    }

    Ok(())
}

fn env_override(key: &str) -> Option<(String, String)> {
    let var = format!("{}_{}", ENV_PREFIX, key);
    std::env::var(&var).ok().map(|val| (var, val))
}

fn parse_number<T: FromStr>(var: &str, val: &str, message: &str) -> ConfigResult<T> {
    val.trim()
        .parse()
        .map_err(|_| ConfigError::env_parse(var, message))
}

/// Parse an enum from the same lowercase keyword used in the TOML file.
fn parse_keyword<T: DeserializeOwned>(var: &str, val: &str) -> ConfigResult<T> {
    serde_json::from_value(serde_json::Value::String(val.trim().to_lowercase()))
        .map_err(|e| ConfigError::env_parse(var, e.to_string()))
}

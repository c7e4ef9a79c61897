//! Configuration module for async_serial.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `ASYNC_SERIAL_CONFIG` environment variable (explicit path)
//! 2. `./async-serial.toml` (current directory)
//! 3. `config.toml` in the platform config directory
//!    (`~/.config/async-serial/` on Linux, `%APPDATA%\async-serial\config\` on Windows)
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! Any configuration value can be overridden via environment variables.
//! The pattern is: `ASYNC_SERIAL_<SECTION>_<KEY>`
//!
//! Examples:
//! - `ASYNC_SERIAL_SERIAL_DEVICE=/dev/ttyUSB0`
//! - `ASYNC_SERIAL_SERIAL_BAUD_RATE=115200`
//! - `ASYNC_SERIAL_WORKER_BACKEND=blocking`
//!
//! # Example
//!
//! ```rust,no_run
//! use async_serial::config::ConfigLoader;
//!
//! # fn main() -> Result<(), async_serial::config::ConfigError> {
//! let loader = ConfigLoader::load()?;
//! let config = loader.config();
//!
//! println!("Baud rate: {}", config.serial.baud_rate);
//! println!("Backend: {:?}", config.worker.backend);
//! # Ok(())
//! # }
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{Config, LogFormat, LoggingConfig, SerialConfig, WorkerConfig};

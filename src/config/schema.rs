//! Configuration schema definitions.
//!
//! Every section has defaults, so a file only needs the keys it changes.

use super::error::{ConfigError, ConfigResult};
use crate::backend::{BackendKind, ReadErrorPolicy};
use crate::port::{DataBits, FlowControl, Parity, PortConfiguration, StopBits};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device and framing
    pub serial: SerialConfig,
    /// Backend selection and read-error policy
    pub worker: WorkerConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Reject values no device can be opened with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.serial.baud_rate == 0 {
            return Err(ConfigError::validation(
                "serial.baud_rate",
                "baud rate must be greater than zero",
            ));
        }
        if self.serial.timeout_ms == 0 {
            return Err(ConfigError::validation(
                "serial.timeout_ms",
                "read timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Serial port configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device opened when none is given on the command line
    pub device: Option<String>,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
    /// Read timeout in milliseconds
    pub timeout_ms: u64,
    /// Port aliases for convenience
    pub port_aliases: HashMap<String, String>,
}

impl Default for SerialConfig {
    fn default() -> Self {
        let port = PortConfiguration::default();
        Self {
            device: None,
            baud_rate: port.baud_rate,
            data_bits: port.data_bits,
            parity: port.parity,
            stop_bits: port.stop_bits,
            flow_control: port.flow_control,
            timeout_ms: port.timeout.as_millis() as u64,
            port_aliases: HashMap::new(),
        }
    }
}

impl SerialConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Resolve a port name through aliases
    pub fn resolve_port(&self, name: &str) -> String {
        self.port_aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// Options handed to the device-open primitive.
    pub fn port_configuration(&self) -> PortConfiguration {
        PortConfiguration {
            baud_rate: self.baud_rate,
            data_bits: self.data_bits,
            flow_control: self.flow_control,
            parity: self.parity,
            stop_bits: self.stop_bits,
            timeout: self.timeout(),
        }
    }
}

/// Background worker configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub backend: BackendKind,
    /// Pause after a failed blocking read, in milliseconds
    pub read_error_pacing_ms: u64,
    /// Consecutive failed reads before the port is closed (0 = never)
    pub max_read_errors: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let policy = ReadErrorPolicy::default();
        Self {
            backend: BackendKind::Auto,
            read_error_pacing_ms: policy.pacing.as_millis() as u64,
            max_read_errors: policy.escalate_after,
        }
    }
}

impl WorkerConfig {
    pub fn read_error_policy(&self) -> ReadErrorPolicy {
        ReadErrorPolicy {
            pacing: Duration::from_millis(self.read_error_pacing_ms),
            escalate_after: self.max_read_errors,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset: "trace", "debug", "info", ...
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line with colors
    #[default]
    Pretty,
    /// Single line, abbreviated
    Compact,
    /// Single line with every field
    Full,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.serial.timeout_ms, 100);
        assert_eq!(config.worker.backend, BackendKind::Auto);
        assert_eq!(config.worker.read_error_policy(), ReadErrorPolicy::default());
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_port_alias_resolution() {
        let mut config = SerialConfig::default();
        config
            .port_aliases
            .insert("arduino".to_string(), "/dev/ttyACM0".to_string());

        assert_eq!(config.resolve_port("arduino"), "/dev/ttyACM0");
        assert_eq!(config.resolve_port("/dev/ttyUSB1"), "/dev/ttyUSB1");
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [serial]
            baud_rate = 115200
            parity = "even"
            stop_bits = "two"

            [worker]
            backend = "blocking"
            max_read_errors = 0
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        let port = config.serial.port_configuration();
        assert_eq!(port.baud_rate, 115200);
        assert_eq!(port.parity, Parity::Even);
        assert_eq!(port.stop_bits, StopBits::Two);
        assert_eq!(port.data_bits, DataBits::Eight);
        assert_eq!(config.worker.backend, BackendKind::Blocking);
        assert_eq!(config.worker.read_error_policy().escalate_after, 0);
        // Untouched sections keep their defaults
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        let mut config = Config::default();
        config.serial.baud_rate = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError { ref key, .. }) if key == "serial.baud_rate"
        ));

        let mut config = Config::default();
        config.serial.timeout_ms = 0;
        assert!(config.validate().is_err());
    }
}

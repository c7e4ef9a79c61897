//! Port-specific error types.
//!
//! Defines error types for device-level operations, separate from the
//! controller-level `OpenError`/`CloseError` so that backends can report what
//! the device did without knowing how the caller will see it.

use thiserror::Error;

/// Errors that can occur while acquiring or using a serial device.
#[derive(Debug, Error)]
pub enum PortError {
    /// The specified serial port was not found on the system.
    #[error("Serial port not found: {0}")]
    NotFound(String),

    /// An I/O error occurred during port operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Port configuration failed or was rejected.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The device stopped delivering data (end of stream or hang-up).
    #[error("Device disconnected: {0}")]
    Disconnected(String),

    /// A background task died without reporting a device error.
    #[error("Background worker failure: {0}")]
    Worker(String),

    /// A serialport-specific error occurred.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    /// Create a NotFound error from a port name.
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    /// Create a Config error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a Timeout error from a duration.
    pub fn timeout(duration: std::time::Duration) -> Self {
        Self::Timeout(duration)
    }

    /// Create a Disconnected error from a port name.
    pub fn disconnected(port_name: impl Into<String>) -> Self {
        Self::Disconnected(port_name.into())
    }

    /// Whether this error only means "nothing arrived before the read timeout".
    ///
    /// Blocking readers use the timeout as their cancellation poll point, so
    /// these are not device failures.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::time::Duration;

    #[test]
    fn test_error_display() {
        let err = PortError::not_found("/dev/ttyUSB0");
        assert_eq!(err.to_string(), "Serial port not found: /dev/ttyUSB0");

        let err = PortError::config("Invalid baud rate");
        assert_eq!(err.to_string(), "Configuration error: Invalid baud rate");

        let err = PortError::disconnected("/dev/ttyACM0");
        assert_eq!(err.to_string(), "Device disconnected: /dev/ttyACM0");
    }

    #[test]
    fn test_timeout_error() {
        let duration = Duration::from_millis(500);
        let err = PortError::timeout(duration);
        assert!(err.to_string().contains("500ms"));
        assert!(err.is_timeout());
    }

    #[test]
    fn test_io_timeouts_are_classified() {
        let timed_out = PortError::Io(io::Error::new(io::ErrorKind::TimedOut, "t"));
        let would_block = PortError::Io(io::Error::new(io::ErrorKind::WouldBlock, "w"));
        let broken = PortError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "b"));

        assert!(timed_out.is_timeout());
        assert!(would_block.is_timeout());
        assert!(!broken.is_timeout());
        assert!(!PortError::disconnected("x").is_timeout());
    }
}

//! Utility functions for hardware testing.
//!
//! Provides the environment-driven port settings, port discovery and a
//! timing helper.

use async_serial::PortConfiguration;
use serialport::{available_ports, SerialPortInfo, SerialPortType};
use std::env;
use std::time::{Duration, Instant};

/// Test port configuration from environment.
pub struct TestPortConfig {
    pub port_name: String,
    pub baud_rate: u32,
    pub loopback_enabled: bool,
}

impl TestPortConfig {
    /// Get test configuration from `TEST_PORT`, `TEST_BAUD` and `TEST_LOOPBACK`.
    pub fn from_env() -> Option<Self> {
        let port_name = env::var("TEST_PORT").ok()?;
        let baud_rate = env::var("TEST_BAUD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(9600);
        let loopback_enabled = env::var("TEST_LOOPBACK").ok().as_deref() == Some("1");

        Some(TestPortConfig {
            port_name,
            baud_rate,
            loopback_enabled,
        })
    }

    /// 8N1 at the configured baud rate with a short read timeout.
    pub fn to_port_config(&self) -> PortConfiguration {
        PortConfiguration {
            timeout: Duration::from_millis(50),
            ..PortConfiguration::new(self.baud_rate)
        }
    }
}

pub fn discover_available_ports() -> Vec<SerialPortInfo> {
    available_ports().unwrap_or_default()
}

/// Print available ports for debugging.
pub fn print_available_ports() {
    let ports = discover_available_ports();
    if ports.is_empty() {
        println!("No serial ports detected on this system");
        return;
    }

    println!("Available serial ports ({}):", ports.len());
    for port in &ports {
        match &port.port_type {
            SerialPortType::UsbPort(usb) => {
                println!("  {} (USB {:04x}:{:04x})", port.port_name, usb.vid, usb.pid)
            }
            other => println!("  {} ({:?})", port.port_name, other),
        }
    }
}

pub fn is_port_available(port_name: &str) -> bool {
    discover_available_ports()
        .iter()
        .any(|p| p.port_name == port_name)
}

/// Timing helper for measuring operation duration.
pub struct TimingHelper {
    start: Instant,
    name: String,
}

impl TimingHelper {
    pub fn new(name: &str) -> Self {
        println!("Starting: {}", name);
        TimingHelper {
            start: Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn finish(self) -> Duration {
        let elapsed = self.elapsed();
        println!("Completed: {} in {:?}", self.name, elapsed);
        elapsed
    }
}

/// Skip test with a clear message if hardware is not available.
#[macro_export]
macro_rules! skip_without_hardware {
    () => {
        match $crate::hardware::utils::TestPortConfig::from_env() {
            Some(config) => config,
            None => {
                println!("Skipping: TEST_PORT environment variable not set");
                println!("   Set TEST_PORT=COM3 (or /dev/ttyUSB0) to run hardware tests");
                return;
            }
        }
    };
}

/// Skip test with a clear message if loopback is not enabled.
#[macro_export]
macro_rules! skip_without_loopback {
    () => {{
        let config = $crate::skip_without_hardware!();
        if !config.loopback_enabled {
            println!("Skipping: TEST_LOOPBACK not set to 1");
            println!("   This test requires a loopback adapter (TX connected to RX)");
            return;
        }
        config
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_ports() {
        // Depends on the machine; only checks that discovery does not panic.
        let ports = discover_available_ports();
        println!("Found {} ports", ports.len());
    }

    #[test]
    fn test_timing_helper() {
        let timer = TimingHelper::new("test operation");
        std::thread::sleep(Duration::from_millis(10));
        assert!(timer.finish() >= Duration::from_millis(10));
    }

    #[test]
    fn test_port_config_uses_baud() {
        let config = TestPortConfig {
            port_name: "COM3".into(),
            baud_rate: 115_200,
            loopback_enabled: false,
        };
        assert_eq!(config.to_port_config().baud_rate, 115_200);
    }
}

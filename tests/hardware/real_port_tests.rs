//! Tests requiring actual serial hardware.
//!
//! These tests are skipped if no hardware is available.
//!
//! # Running Hardware Tests
//!
//! ```bash
//! # Set environment variables
//! export TEST_PORT=COM3                  # or /dev/ttyUSB0 on Linux
//! export TEST_BAUD=9600                  # optional, default: 9600
//! export TEST_LOOPBACK=1                 # if port has TX-RX loopback
//!
//! # Run tests
//! cargo test --all-features -- --ignored
//! ```
//!
//! # Hardware Requirements
//!
//! - **Open/close tests**: Any available serial port
//! - **Loopback tests**: Port with TX and RX connected together

use super::utils::{is_port_available, print_available_ports, TimingHelper};
use crate::common::{wait_until, Deliveries, WAIT};
use async_serial::{AsyncSerial, BlockingBackend, CallbackSerial};

#[test]
#[ignore] // Run with --ignored flag
fn test_real_port_open_close_blocking() {
    let config = crate::skip_without_hardware!();
    if !is_port_available(&config.port_name) {
        print_available_ports();
    }

    let timer = TimingHelper::new("blocking open/close");
    let port = AsyncSerial::with_backend(BlockingBackend::new());
    port.open(&config.port_name, &config.to_port_config())
        .unwrap_or_else(|e| panic!("Port open failed: {}", e));
    assert!(port.is_open());
    assert!(!port.error_status());

    port.close().unwrap();
    assert!(!port.is_open());
    timer.finish();
}

#[cfg(feature = "async-serial")]
#[test]
#[ignore]
fn test_real_port_open_close_event_loop() {
    use async_serial::EventLoopBackend;

    let config = crate::skip_without_hardware!();
    let port = AsyncSerial::with_backend(EventLoopBackend::new());
    port.open(&config.port_name, &config.to_port_config())
        .unwrap_or_else(|e| panic!("Port open failed: {}", e));
    assert!(port.is_open());
    assert!(port.capabilities().asynchronous_writes);

    port.close().unwrap();
    assert!(!port.is_open());
}

#[test]
#[ignore]
fn test_real_port_multiple_open_close() {
    let config = crate::skip_without_hardware!();
    let port = AsyncSerial::with_backend(BlockingBackend::new());

    for cycle in 0..5 {
        port.open(&config.port_name, &config.to_port_config())
            .unwrap_or_else(|e| panic!("Cycle {} open failed: {}", cycle, e));
        port.close()
            .unwrap_or_else(|e| panic!("Cycle {} close failed: {}", cycle, e));
    }
    assert!(!port.error_status());
}

#[test]
#[ignore]
fn test_real_port_loopback_echo() {
    let config = crate::skip_without_loopback!();
    let port = CallbackSerial::open_with(&config.port_name, &config.to_port_config())
        .unwrap_or_else(|e| panic!("Port open failed: {}", e));

    let deliveries = Deliveries::new();
    port.set_callback(deliveries.callback());

    let payload = b"async_serial loopback\r\n";
    port.write(payload);
    assert!(
        wait_until(WAIT, || deliveries.bytes().len() >= payload.len()),
        "no loopback data within {:?}",
        WAIT
    );
    assert_eq!(&deliveries.bytes()[..payload.len()], payload);

    port.close().unwrap();
}

#[test]
#[ignore]
fn test_real_port_loopback_bulk_ordering() {
    let config = crate::skip_without_loopback!();
    let port = CallbackSerial::open_with(&config.port_name, &config.to_port_config())
        .unwrap_or_else(|e| panic!("Port open failed: {}", e));
    let deliveries = Deliveries::new();
    port.set_callback(deliveries.callback());

    let expected: Vec<u8> = (0..512u32).map(|i| (i % 251) as u8).collect();
    for chunk in expected.chunks(32) {
        port.write(chunk);
    }

    let timer = TimingHelper::new("bulk loopback");
    assert!(wait_until(WAIT * 2, || deliveries.bytes().len() >= expected.len()));
    timer.finish();
    assert_eq!(deliveries.bytes(), expected);
    assert!(!port.error_status());

    port.close().unwrap();
}

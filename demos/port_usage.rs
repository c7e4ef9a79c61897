//! Example driving an `AsyncSerial` over the mock device.
//!
//! Shows the open / write / read-callback / close cycle without hardware,
//! and how a fault on the device shows up through the error flag.

use async_serial::{
    AsyncSerial, BlockingBackend, DataBits, FlowControl, MockSerialPort, Parity,
    PortConfiguration, StopBits,
};
use std::sync::mpsc;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== AsyncSerial over a mock device ===\n");

    let device = MockSerialPort::new("MOCK0");
    let port = AsyncSerial::with_backend(BlockingBackend::with_opener(device.opener()));

    let config = PortConfiguration {
        baud_rate: 115_200,
        data_bits: DataBits::Eight,
        flow_control: FlowControl::None,
        parity: Parity::None,
        stop_bits: StopBits::One,
        timeout: Duration::from_millis(50),
    };

    let (tx, rx) = mpsc::channel();
    port.set_read_callback(move |bytes| {
        let _ = tx.send(String::from_utf8_lossy(bytes).into_owned());
    });

    port.open("MOCK0", &config)?;
    println!("1. Opened {:?} with {:?}", port.device_name(), port.capabilities());

    port.write(b"PING\n");
    println!("2. Device received: {:?}", String::from_utf8_lossy(&device.written_bytes()));

    device.enqueue_read(b"PONG\n");
    let reply = rx.recv_timeout(Duration::from_secs(1))?;
    println!("3. Callback received: {:?}", reply);

    device.disconnect();
    while port.is_open() {
        std::thread::sleep(Duration::from_millis(10));
    }
    println!(
        "4. Device unplugged: open={} error={} fault={:?}",
        port.is_open(),
        port.error_status(),
        port.last_fault()
    );

    port.close()?;
    println!("\nStats: {}", serde_json::to_string_pretty(&port.stats())?);
    Ok(())
}

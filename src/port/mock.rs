//! Mock serial device for testing.
//!
//! Provides a `MockSerialPort` that behaves like a blocking serial device
//! without requiring hardware: reads block until data is enqueued or the
//! handle's timeout expires, each enqueued chunk is delivered by its own read,
//! and failures (read errors, write errors, disconnects) can be injected from
//! the test thread while a backend is reading on another.

use super::error::PortError;
use super::traits::{PortConfiguration, SerialDevice};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug)]
enum ReadEvent {
    Data(Vec<u8>),
    Fail(io::ErrorKind),
}

/// Inner state of the mock device, shared by every clone.
#[derive(Debug, Default)]
struct MockPortState {
    /// Chunks (or injected failures) returned by subsequent reads, in order.
    reads: VecDeque<ReadEvent>,
    /// Log of all write calls made on the device.
    write_log: Vec<Vec<u8>>,
    /// Whether writes should fail.
    fail_writes: bool,
    /// Whether the device has been unplugged.
    disconnected: bool,
}

#[derive(Debug, Default)]
struct MockDevice {
    state: Mutex<MockPortState>,
    readable: Condvar,
}

/// Mock serial device for testing.
///
/// Clones share the same underlying device, so a test keeps one handle to feed
/// data and inspect writes while a backend owns the others.
///
/// # Example
/// ```
/// use async_serial::port::{MockSerialPort, SerialDevice};
///
/// let mut port = MockSerialPort::new("MOCK0");
/// port.enqueue_read(b"Hello, World!");
///
/// let mut buffer = [0u8; 32];
/// let n = port.read_bytes(&mut buffer).unwrap();
/// assert_eq!(&buffer[..n], b"Hello, World!");
///
/// port.write_all_bytes(b"Response").unwrap();
/// assert_eq!(port.get_write_log(), vec![b"Response".to_vec()]);
/// ```
#[derive(Clone)]
pub struct MockSerialPort {
    /// The port name/identifier.
    name: String,
    /// Read timeout of this handle.
    timeout: Duration,
    device: Arc<MockDevice>,
}

impl MockSerialPort {
    /// Create a new mock serial device with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timeout: Duration::from_millis(100),
            device: Arc::new(MockDevice::default()),
        }
    }

    /// Queue one chunk to be returned by a single future read.
    ///
    /// A chunk larger than the reader's buffer is split across reads; two
    /// chunks are never merged into one read.
    pub fn enqueue_read(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.push(ReadEvent::Data(data.to_vec()));
    }

    /// Make the next read fail with the given I/O error kind.
    pub fn inject_read_error(&self, kind: io::ErrorKind) {
        self.push(ReadEvent::Fail(kind));
    }

    /// Make every write fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.device.state.lock().fail_writes = fail;
    }

    /// Simulate the device being unplugged.
    ///
    /// Data already queued is still delivered; after that every read fails
    /// with [`PortError::Disconnected`], writes fail, and the opener refuses
    /// to hand out new handles.
    pub fn disconnect(&self) {
        self.device.state.lock().disconnected = true;
        self.device.readable.notify_all();
    }

    /// Whether [`MockSerialPort::disconnect`] was called.
    pub fn is_disconnected(&self) -> bool {
        self.device.state.lock().disconnected
    }

    /// Get a copy of every write call made on the device.
    pub fn get_write_log(&self) -> Vec<Vec<u8>> {
        self.device.state.lock().write_log.clone()
    }

    /// All written bytes, concatenated in write order.
    pub fn written_bytes(&self) -> Vec<u8> {
        self.device.state.lock().write_log.concat()
    }

    /// Number of queued chunks and injected failures not yet consumed.
    pub fn pending_reads(&self) -> usize {
        self.device.state.lock().reads.len()
    }

    /// A device-open primitive handing out handles onto this mock.
    ///
    /// Each handle takes its read timeout from the configuration it is opened
    /// with. Fails with [`PortError::NotFound`] once the mock is disconnected.
    pub fn opener(
        &self,
    ) -> impl Fn(&str, &PortConfiguration) -> Result<Box<dyn SerialDevice>, PortError>
           + Send
           + Sync
           + 'static {
        let template = self.clone();
        move |port_name, config| {
            if template.is_disconnected() {
                return Err(PortError::not_found(port_name));
            }
            let mut handle = template.clone();
            handle.timeout = config.timeout;
            Ok(Box::new(handle) as Box<dyn SerialDevice>)
        }
    }

    fn push(&self, event: ReadEvent) {
        self.device.state.lock().reads.push_back(event);
        self.device.readable.notify_all();
    }
}

impl SerialDevice for MockSerialPort {
    fn write_all_bytes(&mut self, data: &[u8]) -> Result<(), PortError> {
        let mut state = self.device.state.lock();
        if state.disconnected {
            return Err(PortError::disconnected(&self.name));
        }
        if state.fail_writes {
            return Err(PortError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "injected write failure",
            )));
        }
        state.write_log.push(data.to_vec());
        Ok(())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let deadline = Instant::now() + self.timeout;
        let mut state = self.device.state.lock();

        loop {
            if let Some(event) = state.reads.pop_front() {
                return match event {
                    ReadEvent::Data(mut chunk) => {
                        let n = chunk.len().min(buffer.len());
                        buffer[..n].copy_from_slice(&chunk[..n]);
                        if n < chunk.len() {
                            let rest = chunk.split_off(n);
                            state.reads.push_front(ReadEvent::Data(rest));
                        }
                        Ok(n)
                    }
                    ReadEvent::Fail(kind) => Err(PortError::Io(io::Error::new(
                        kind,
                        "injected read failure",
                    ))),
                };
            }

            if state.disconnected {
                return Err(PortError::disconnected(&self.name));
            }

            let waited = self.device.readable.wait_until(&mut state, deadline);
            if waited.timed_out() && state.reads.is_empty() && !state.disconnected {
                return Err(PortError::timeout(self.timeout));
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn try_clone_device(&self) -> Result<Box<dyn SerialDevice>, PortError> {
        Ok(Box::new(self.clone()))
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("pending_reads", &self.pending_reads())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn handle_with_timeout(mock: &MockSerialPort, timeout: Duration) -> Box<dyn SerialDevice> {
        let config = PortConfiguration {
            timeout,
            ..PortConfiguration::default()
        };
        mock.opener()("MOCK0", &config).unwrap()
    }

    #[test]
    fn test_enqueue_and_read() {
        let mut port = MockSerialPort::new("MOCK0");
        port.enqueue_read(b"Hello");

        let mut buffer = [0u8; 10];
        let n = port.read_bytes(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"Hello");
    }

    #[test]
    fn test_chunks_are_not_merged() {
        let mut port = MockSerialPort::new("MOCK0");
        port.enqueue_read(b"hi");
        port.enqueue_read(b"!");

        let mut buffer = [0u8; 10];
        let n = port.read_bytes(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"hi");
        let n = port.read_bytes(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"!");
    }

    #[test]
    fn test_partial_read_keeps_remainder() {
        let mut port = MockSerialPort::new("MOCK0");
        port.enqueue_read(b"Hello, World!");

        let mut buffer = [0u8; 5];
        let n = port.read_bytes(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"Hello");
        assert_eq!(port.pending_reads(), 1);

        let mut rest = [0u8; 16];
        let n = port.read_bytes(&mut rest).unwrap();
        assert_eq!(&rest[..n], b", World!");
    }

    #[test]
    fn test_empty_read_times_out() {
        let mock = MockSerialPort::new("MOCK0");
        let mut port = handle_with_timeout(&mock, Duration::from_millis(20));

        let started = Instant::now();
        let result = port.read_bytes(&mut [0u8; 4]);
        assert!(matches!(result, Err(PortError::Timeout(d)) if d == Duration::from_millis(20)));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_blocked_read_wakes_on_enqueue() {
        let feeder = MockSerialPort::new("MOCK0");
        let mut port = handle_with_timeout(&feeder, Duration::from_secs(5));

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            feeder.enqueue_read(b"late");
        });

        let mut buffer = [0u8; 8];
        let n = port.read_bytes(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"late");
        handle.join().unwrap();
    }

    #[test]
    fn test_injected_read_error() {
        let mut port = MockSerialPort::new("MOCK0");
        port.inject_read_error(io::ErrorKind::Other);
        port.enqueue_read(b"after");

        let mut buffer = [0u8; 8];
        match port.read_bytes(&mut buffer) {
            Err(PortError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::Other),
            other => panic!("Expected injected error, got {:?}", other),
        }
        let n = port.read_bytes(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"after");
    }

    #[test]
    fn test_write_logging_and_failure() {
        let mut port = MockSerialPort::new("MOCK0");
        port.write_all_bytes(b"Test1").unwrap();
        port.write_all_bytes(b"Test2").unwrap();
        assert_eq!(port.written_bytes(), b"Test1Test2".to_vec());

        port.set_fail_writes(true);
        assert!(port.write_all_bytes(b"Test3").is_err());
        assert_eq!(port.get_write_log().len(), 2);
    }

    #[test]
    fn test_disconnect_fails_reads_and_opener() {
        let mut port = MockSerialPort::new("MOCK0");
        port.enqueue_read(b"last");
        port.disconnect();

        let mut buffer = [0u8; 8];
        assert_eq!(port.read_bytes(&mut buffer).unwrap(), 4);
        assert!(matches!(
            port.read_bytes(&mut buffer),
            Err(PortError::Disconnected(_))
        ));

        let open = port.opener();
        assert!(matches!(
            open("MOCK0", &PortConfiguration::default()),
            Err(PortError::NotFound(_))
        ));
    }

    #[test]
    fn test_opener_applies_timeout() {
        let port = MockSerialPort::new("MOCK0");
        let open = port.opener();
        let config = PortConfiguration {
            timeout: Duration::from_millis(10),
            ..PortConfiguration::default()
        };

        let mut handle = open("MOCK0", &config).unwrap();
        assert_eq!(handle.name(), "MOCK0");
        let result = handle.read_bytes(&mut [0u8; 4]);
        assert!(matches!(result, Err(PortError::Timeout(d)) if d == Duration::from_millis(10)));
    }
}

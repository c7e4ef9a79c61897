//! Shared test utilities for async_serial integration tests.
//!
//! - mock-backed ports with a short read timeout and a fast error policy
//! - an event-loop backend over in-memory duplex pipes
//! - a recorder for read callback deliveries
//! - polling helpers

#![allow(dead_code)]

use async_serial::backend::AsyncDevice;
use async_serial::{
    AsyncSerial, BlockingBackend, EventLoopBackend, MockSerialPort, PortConfiguration,
    ReadErrorPolicy,
};
use parking_lot::Mutex;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, DuplexStream};
use tokio::runtime::Runtime;

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

/// Poll `condition` until it holds or `timeout` expires.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// 9600 8N1 with a 20 ms read timeout, so blocking readers notice a close quickly.
pub fn fast_config() -> PortConfiguration {
    PortConfiguration {
        timeout: Duration::from_millis(20),
        ..PortConfiguration::new(9600)
    }
}

pub fn fast_policy(escalate_after: u32) -> ReadErrorPolicy {
    ReadErrorPolicy {
        pacing: Duration::from_millis(1),
        escalate_after,
    }
}

/// A closed blocking-loop port over a fresh mock device.
pub fn blocking_port(name: &str) -> (MockSerialPort, AsyncSerial<BlockingBackend>) {
    blocking_port_with_policy(name, fast_policy(8))
}

pub fn blocking_port_with_policy(
    name: &str,
    policy: ReadErrorPolicy,
) -> (MockSerialPort, AsyncSerial<BlockingBackend>) {
    let device = MockSerialPort::new(name);
    let backend = BlockingBackend::with_opener(device.opener()).with_policy(policy);
    (device, AsyncSerial::with_backend(backend))
}

/// Event-loop backend whose devices are in-memory duplex pipes.
///
/// Every successful open sends the far end of the new pipe on the returned
/// channel.
pub fn duplex_backend(capacity: usize) -> (EventLoopBackend, mpsc::Receiver<DuplexStream>) {
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let backend = EventLoopBackend::with_opener(move |_, _| {
        let (local, peer) = tokio::io::duplex(capacity);
        let _ = tx.lock().send(peer);
        Ok(Box::new(local) as Box<dyn AsyncDevice>)
    });
    (backend, rx)
}

/// An open event-loop port plus the device side of its pipe.
pub fn open_duplex_port(
    capacity: usize,
) -> (
    AsyncSerial<EventLoopBackend>,
    mpsc::Receiver<DuplexStream>,
    DuplexStream,
) {
    let (backend, peers) = duplex_backend(capacity);
    let port = AsyncSerial::with_backend(backend);
    port.open("DUPLEX0", &PortConfiguration::default()).unwrap();
    let peer = peers.recv_timeout(WAIT).unwrap();
    (port, peers, peer)
}

/// Runtime used by tests to drive the device side of a duplex pipe.
pub fn device_runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// Read exactly `len` bytes from the device side, failing after [`WAIT`].
pub fn read_from_device(runtime: &Runtime, peer: &mut DuplexStream, len: usize) -> Vec<u8> {
    runtime.block_on(async {
        let mut buffer = vec![0u8; len];
        tokio::time::timeout(WAIT, peer.read_exact(&mut buffer))
            .await
            .expect("device did not receive the expected bytes in time")
            .unwrap();
        buffer
    })
}

/// Records every delivery of a read callback.
#[derive(Clone, Default)]
pub struct Deliveries {
    chunks: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl Deliveries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(&self) -> impl FnMut(&[u8]) + Send + 'static {
        let chunks = Arc::clone(&self.chunks);
        move |bytes: &[u8]| chunks.lock().push(bytes.to_vec())
    }

    pub fn chunks(&self) -> Vec<Vec<u8>> {
        self.chunks.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.chunks.lock().len()
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.chunks.lock().concat()
    }

    pub fn wait_for_count(&self, count: usize) -> bool {
        wait_until(WAIT, || self.count() >= count)
    }
}

//! Blocking-loop backend.
//!
//! The worker thread owns one Device Handle and runs a blocking read loop;
//! writes go through a second handle on the caller's thread. The read timeout
//! of the handle doubles as the cancellation poll point: after every timeout
//! the loop re-checks the lifecycle cell, so `close()` completes within one
//! timeout period.

use super::{Backend, Capabilities, Session, WorkerGuard, READ_BUFFER_SIZE};
use crate::error::{CloseError, DeviceFault, OpenError};
use crate::port::{PortConfiguration, PortError, SerialDevice, SyncSerialPort};
use crate::state::PortShared;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use tracing::debug;

type DeviceOpener =
    dyn Fn(&str, &PortConfiguration) -> Result<Box<dyn SerialDevice>, PortError> + Send + Sync;

/// How the blocking reader reacts to failed reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadErrorPolicy {
    /// Sleep between a failed read and the next attempt.
    pub pacing: Duration,
    /// Consecutive failures after which the port is closed; `0` never closes.
    pub escalate_after: u32,
}

impl Default for ReadErrorPolicy {
    fn default() -> Self {
        Self {
            pacing: Duration::from_millis(10),
            escalate_after: 16,
        }
    }
}

/// Backend running a blocking read loop on a dedicated thread.
pub struct BlockingBackend {
    opener: Box<DeviceOpener>,
    policy: ReadErrorPolicy,
}

impl BlockingBackend {
    /// Backend for real serial ports, opened through the serialport crate.
    pub fn new() -> Self {
        Self::with_opener(|name, config| {
            let port = SyncSerialPort::open(name, config)?;
            Ok(Box::new(port) as Box<dyn SerialDevice>)
        })
    }

    /// Backend using a custom device-open primitive.
    ///
    /// The returned handle must honour the configured read timeout and must
    /// support [`SerialDevice::try_clone_device`].
    pub fn with_opener<F>(opener: F) -> Self
    where
        F: Fn(&str, &PortConfiguration) -> Result<Box<dyn SerialDevice>, PortError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            opener: Box::new(opener),
            policy: ReadErrorPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ReadErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> ReadErrorPolicy {
        self.policy
    }
}

impl Default for BlockingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for BlockingBackend {
    type Device = Box<dyn SerialDevice>;

    fn name(&self) -> &'static str {
        "blocking"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            asynchronous_writes: false,
            honors_framing: true,
        }
    }

    fn acquire(
        &self,
        device: &str,
        config: &PortConfiguration,
    ) -> Result<Self::Device, PortError> {
        (self.opener)(device, config)
    }

    fn launch(
        &self,
        device: Self::Device,
        shared: Arc<PortShared>,
    ) -> Result<Box<dyn Session>, OpenError> {
        let name = device.name().to_string();
        let writer = device
            .try_clone_device()
            .map_err(|source| OpenError::Device {
                device: name.clone(),
                source,
            })?;

        let policy = self.policy;
        let reader_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name(format!("serial-reader-{}", name))
            .spawn(move || {
                let _guard = WorkerGuard::new(&reader_shared, &name);
                read_loop(device, &reader_shared, policy)
            })
            .map_err(OpenError::Worker)?;

        Ok(Box::new(BlockingSession {
            shared,
            writer: Mutex::new(writer),
            worker,
        }))
    }
}

struct BlockingSession {
    shared: Arc<PortShared>,
    writer: Mutex<Box<dyn SerialDevice>>,
    worker: JoinHandle<()>,
}

impl Session for BlockingSession {
    fn submit(&self, bytes: &[u8]) {
        let result = self.writer.lock().write_all_bytes(bytes);
        match result {
            Ok(()) => self.shared.record_written(bytes.len()),
            Err(e) => {
                self.shared.record_fault(DeviceFault::Fatal(e));
            }
        }
    }

    fn worker_id(&self) -> ThreadId {
        self.worker.thread().id()
    }

    fn shutdown(self: Box<Self>) -> Result<(), CloseError> {
        let BlockingSession { writer, worker, .. } = *self;
        drop(writer);
        worker.join().map_err(|_| CloseError::WorkerPanicked)
    }

    fn detach(self: Box<Self>) {
        // The reader notices the lifecycle change at its next timeout.
    }
}

/// Read until the port leaves the live states or a failure escalates.
pub(crate) fn read_loop(
    mut device: Box<dyn SerialDevice>,
    shared: &PortShared,
    policy: ReadErrorPolicy,
) {
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    let mut consecutive_failures = 0u32;
    debug!("blocking reader started for {}", device.name());

    while shared.is_live() {
        let error = match device.read_bytes(&mut buffer) {
            Ok(0) => PortError::disconnected(device.name()),
            Ok(n) => {
                consecutive_failures = 0;
                shared.deliver(&buffer[..n]);
                continue;
            }
            Err(e) if e.is_timeout() => continue,
            Err(e) => e,
        };

        if !shared.is_live() {
            debug!("ignoring read error during shutdown: {}", error);
            break;
        }

        consecutive_failures = consecutive_failures.saturating_add(1);
        if policy.escalate_after > 0 && consecutive_failures >= policy.escalate_after {
            shared.record_fault(DeviceFault::Fatal(error));
            break;
        }
        shared.record_fault(DeviceFault::TransientRead(error));
        thread::sleep(policy.pacing);
    }

    debug!("blocking reader for {} stopped", device.name());
}

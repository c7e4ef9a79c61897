//! Background I/O backends.
//!
//! A backend acquires the Device Handle and launches the single background
//! worker that runs the read loop (and, on the event-loop backend, the write
//! pipeline). Two interchangeable strategies ship:
//!
//! - [`EventLoopBackend`]: a current-thread tokio runtime on the worker drives
//!   an unbounded chain of async reads and the double-buffered writer.
//! - [`BlockingBackend`]: the worker runs a blocking read loop; writes are
//!   performed synchronously on the caller's thread.
//!
//! Backend differences surface only through [`Capabilities`].

pub mod blocking;
pub mod event_loop;

pub use blocking::{BlockingBackend, ReadErrorPolicy};
pub use event_loop::{AsyncDevice, EventLoopBackend, EventLoopDevice};

use crate::error::{CloseError, DeviceFault, OpenError};
use crate::port::{PortConfiguration, PortError, SerialDevice};
use crate::state::PortShared;
use serde::Serialize;
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Size of the read buffer each worker allocates once per session.
pub const READ_BUFFER_SIZE: usize = 512;

/// What a backend can promise beyond the common contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// `write` only queues bytes and returns; `false` means `write` performs
    /// the device write on the calling thread.
    pub asynchronous_writes: bool,
    /// Parity, character size, flow control and stop bits are applied as
    /// requested (or rejected), never replaced by a fixed 8N1.
    pub honors_framing: bool,
}

/// I/O strategy used by a port controller.
pub trait Backend: Send + Sync + 'static {
    /// Acquired device, handed from [`Backend::acquire`] to [`Backend::launch`].
    type Device: Send + 'static;

    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    /// Open and configure the device.
    fn acquire(
        &self,
        device: &str,
        config: &PortConfiguration,
    ) -> Result<Self::Device, PortError>;

    /// Start the background worker for an acquired device.
    fn launch(
        &self,
        device: Self::Device,
        shared: Arc<PortShared>,
    ) -> Result<Box<dyn Session>, OpenError>;
}

/// Handle on a running background worker.
pub trait Session: Send {
    /// Hand bytes to the device (queue them, or write them synchronously).
    fn submit(&self, bytes: &[u8]);

    /// Thread id of the background worker.
    fn worker_id(&self) -> ThreadId;

    /// Cancel outstanding I/O, release the device and join the worker.
    ///
    /// The lifecycle cell must already be out of the live states.
    fn shutdown(self: Box<Self>) -> Result<(), CloseError>;

    /// Ask the worker to stop without waiting for it.
    fn detach(self: Box<Self>);
}

/// Held by a worker thread for its whole life; a panic unwinding through it
/// is recorded as a fatal fault so the port stops reporting itself open.
pub(crate) struct WorkerGuard<'a> {
    shared: &'a PortShared,
    device: &'a str,
}

impl<'a> WorkerGuard<'a> {
    pub(crate) fn new(shared: &'a PortShared, device: &'a str) -> Self {
        Self { shared, device }
    }
}

impl Drop for WorkerGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.shared.record_fault(DeviceFault::Fatal(PortError::Worker(format!(
                "worker for {} panicked",
                self.device
            ))));
        }
    }
}

/// Backend used by [`crate::AsyncSerial::new`].
#[cfg(all(feature = "async-serial", not(target_os = "macos")))]
pub type DefaultBackend = EventLoopBackend;

/// Backend used by [`crate::AsyncSerial::new`].
#[cfg(not(all(feature = "async-serial", not(target_os = "macos"))))]
pub type DefaultBackend = BlockingBackend;

/// Which strategy a [`ConfiguredBackend`] should use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// The platform default ([`DefaultBackend`]).
    #[default]
    Auto,
    EventLoop,
    Blocking,
}

/// Backend chosen at configuration time rather than at build time.
pub enum ConfiguredBackend {
    EventLoop(EventLoopBackend),
    Blocking(BlockingBackend),
}

/// Device acquired by a [`ConfiguredBackend`].
pub enum ConfiguredDevice {
    EventLoop(EventLoopDevice),
    Blocking(Box<dyn SerialDevice>),
}

impl ConfiguredBackend {
    /// Build the real-device backend for `kind`.
    ///
    /// Fails when `kind` asks for the event loop and the crate was built
    /// without `async-serial`.
    pub fn for_kind(kind: BackendKind, policy: ReadErrorPolicy) -> Result<Self, PortError> {
        match kind {
            BackendKind::Blocking => Ok(Self::Blocking(BlockingBackend::new().with_policy(policy))),
            BackendKind::EventLoop => Self::event_loop(),
            BackendKind::Auto => {
                if cfg!(all(feature = "async-serial", not(target_os = "macos"))) {
                    Self::event_loop()
                } else {
                    Ok(Self::Blocking(BlockingBackend::new().with_policy(policy)))
                }
            }
        }
    }

    #[cfg(feature = "async-serial")]
    fn event_loop() -> Result<Self, PortError> {
        Ok(Self::EventLoop(EventLoopBackend::new()))
    }

    #[cfg(not(feature = "async-serial"))]
    fn event_loop() -> Result<Self, PortError> {
        Err(PortError::config(
            "the event-loop backend requires the `async-serial` feature",
        ))
    }
}

impl From<EventLoopBackend> for ConfiguredBackend {
    fn from(backend: EventLoopBackend) -> Self {
        Self::EventLoop(backend)
    }
}

impl From<BlockingBackend> for ConfiguredBackend {
    fn from(backend: BlockingBackend) -> Self {
        Self::Blocking(backend)
    }
}

impl Backend for ConfiguredBackend {
    type Device = ConfiguredDevice;

    fn name(&self) -> &'static str {
        match self {
            Self::EventLoop(backend) => backend.name(),
            Self::Blocking(backend) => backend.name(),
        }
    }

    fn capabilities(&self) -> Capabilities {
        match self {
            Self::EventLoop(backend) => backend.capabilities(),
            Self::Blocking(backend) => backend.capabilities(),
        }
    }

    fn acquire(
        &self,
        device: &str,
        config: &PortConfiguration,
    ) -> Result<Self::Device, PortError> {
        match self {
            Self::EventLoop(backend) => backend.acquire(device, config).map(ConfiguredDevice::EventLoop),
            Self::Blocking(backend) => backend.acquire(device, config).map(ConfiguredDevice::Blocking),
        }
    }

    fn launch(
        &self,
        device: Self::Device,
        shared: Arc<PortShared>,
    ) -> Result<Box<dyn Session>, OpenError> {
        match (self, device) {
            (Self::EventLoop(backend), ConfiguredDevice::EventLoop(device)) => {
                backend.launch(device, shared)
            }
            (Self::Blocking(backend), ConfiguredDevice::Blocking(device)) => {
                backend.launch(device, shared)
            }
            _ => Err(OpenError::Device {
                device: String::new(),
                source: PortError::config("device was acquired by a different backend"),
            }),
        }
    }
}

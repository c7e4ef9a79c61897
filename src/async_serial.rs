//! The port controller.
//!
//! [`AsyncSerial`] composes a [`Backend`] with the shared lifecycle cell,
//! error flag, write pipeline and callback slot. Callers write and register a
//! read callback without blocking; the backend's background worker performs
//! the device I/O and reports faults through the error flag.
//!
//! # Example
//! ```
//! use async_serial::{AsyncSerial, BlockingBackend, MockSerialPort, PortConfiguration};
//!
//! let device = MockSerialPort::new("MOCK0");
//! let port = AsyncSerial::with_backend(BlockingBackend::with_opener(device.opener()));
//!
//! port.open("MOCK0", &PortConfiguration::new(9600)).unwrap();
//! port.write([0x01, 0x02, 0x03]);
//! port.close().unwrap();
//!
//! assert_eq!(device.written_bytes(), vec![0x01, 0x02, 0x03]);
//! assert!(!port.is_open());
//! ```

use crate::backend::{Backend, Capabilities, DefaultBackend, Session};
use crate::error::{CloseError, OpenError};
use crate::port::PortConfiguration;
use crate::state::{LifecycleState, PortShared, PortStats};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::{debug, info, warn};

/// Asynchronous serial port.
///
/// All methods take `&self`; share the controller across threads with an
/// `Arc`. Dropping an open port closes it and discards any close error.
pub struct AsyncSerial<B: Backend = DefaultBackend> {
    backend: B,
    shared: Arc<PortShared>,
    session: Mutex<Option<Box<dyn Session>>>,
    /// Worker of the current session, kept until the session is reaped.
    worker: Mutex<Option<ThreadId>>,
    device: Mutex<Option<String>>,
    /// Serializes open and close.
    transition: Mutex<()>,
}

impl AsyncSerial<DefaultBackend> {
    /// A closed port on the platform default backend.
    pub fn new() -> Self {
        Self::with_backend(DefaultBackend::default())
    }

    /// Construct and immediately open a port on the default backend.
    pub fn open_with(device: &str, config: &PortConfiguration) -> Result<Self, OpenError> {
        Self::open_with_backend(DefaultBackend::default(), device, config)
    }
}

impl Default for AsyncSerial<DefaultBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> AsyncSerial<B> {
    /// A closed port driven by `backend`.
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend,
            shared: Arc::new(PortShared::new()),
            session: Mutex::new(None),
            worker: Mutex::new(None),
            device: Mutex::new(None),
            transition: Mutex::new(()),
        }
    }

    /// Construct and immediately open a port driven by `backend`.
    pub fn open_with_backend(
        backend: B,
        device: &str,
        config: &PortConfiguration,
    ) -> Result<Self, OpenError> {
        let port = Self::with_backend(backend);
        port.open(device, config)?;
        Ok(port)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Open `device`, closing the current session first if there is one.
    ///
    /// A device fault reported by that implicit close is logged and does not
    /// prevent the new session.
    ///
    /// The error flag is raised before the attempt and cleared once the
    /// device has been acquired. On failure the port stays closed with the
    /// error flag set.
    pub fn open(&self, device: &str, config: &PortConfiguration) -> Result<(), OpenError> {
        if self.on_worker_thread() {
            return Err(OpenError::PreviousSession(CloseError::CalledFromWorker));
        }
        let _transition = self.transition.lock();
        match self.close_session() {
            // The flag is reset below; the old session's fault is history.
            Err(CloseError::DeviceFault { detail }) => warn!(
                "previous session ended with an error{}",
                detail.map(|d| format!(": {}", d)).unwrap_or_default()
            ),
            Err(e) => return Err(OpenError::PreviousSession(e)),
            Ok(()) => {}
        }

        self.shared.begin_session();
        debug!(
            "opening {} at {} baud with the {} backend",
            device,
            config.baud_rate,
            self.backend.name()
        );

        let acquired = match self.backend.acquire(device, config) {
            Ok(acquired) => acquired,
            Err(source) => {
                self.shared.set_state(LifecycleState::Closed);
                warn!("failed to open {}: {}", device, source);
                return Err(OpenError::Device {
                    device: device.to_string(),
                    source,
                });
            }
        };

        self.shared.set_error(false);
        let session = match self.backend.launch(acquired, Arc::clone(&self.shared)) {
            Ok(session) => session,
            Err(e) => {
                self.shared.set_error(true);
                self.shared.set_state(LifecycleState::Closed);
                warn!("failed to start {}: {}", device, e);
                return Err(e);
            }
        };

        *self.worker.lock() = Some(session.worker_id());
        *self.device.lock() = Some(device.to_string());
        *self.session.lock() = Some(session);

        if self
            .shared
            .transition(LifecycleState::Opening, LifecycleState::Open)
        {
            info!("opened {}", device);
        } else {
            warn!("{} failed while opening", device);
        }
        Ok(())
    }

    /// Whether the port is open. Lock-free.
    pub fn is_open(&self) -> bool {
        self.shared.is_open()
    }

    /// Whether a device error occurred in the current (or last) session.
    pub fn error_status(&self) -> bool {
        self.shared.error_status()
    }

    /// Close the port and wait for the background worker to exit.
    ///
    /// A no-op returning success when the port is not open. Fails with
    /// [`CloseError::DeviceFault`] when the error flag was raised during the
    /// session, and with [`CloseError::CalledFromWorker`] when called from
    /// inside the read callback. Any failure leaves the error flag set.
    ///
    /// The wait is bounded by the session's [`PortConfiguration::timeout`]:
    /// the blocking backend's reader notices the close at its next read
    /// timeout, and the event-loop backend gives queued writes that long to
    /// reach the device.
    pub fn close(&self) -> Result<(), CloseError> {
        if self.on_worker_thread() {
            return Err(CloseError::CalledFromWorker);
        }
        let _transition = self.transition.lock();
        self.close_session()
    }

    /// Hand bytes to the device.
    ///
    /// Bytes of one call are transmitted contiguously and calls are
    /// transmitted in order. On a port that is not open the bytes are dropped.
    pub fn write(&self, bytes: impl AsRef<[u8]>) {
        let bytes = bytes.as_ref();
        if bytes.is_empty() {
            return;
        }
        let session = self.session.lock();
        match session.as_ref() {
            Some(session) if self.shared.is_open() => session.submit(bytes),
            _ => warn!("discarding {} bytes written to a closed port", bytes.len()),
        }
    }

    /// Install the callback invoked with the bytes of every completed read.
    pub fn set_read_callback<F>(&self, callback: F)
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        self.shared.callback().set(Box::new(callback));
    }

    /// Remove the read callback.
    ///
    /// Outside the callback this returns only once a running invocation has
    /// finished; from inside the callback it takes effect immediately.
    pub fn clear_read_callback(&self) {
        self.shared.callback().clear();
    }

    pub fn capabilities(&self) -> Capabilities {
        self.backend.capabilities()
    }

    pub fn state(&self) -> LifecycleState {
        self.shared.state()
    }

    pub fn stats(&self) -> PortStats {
        self.shared.stats()
    }

    /// Message of the most recent device error since the last `open`.
    pub fn last_fault(&self) -> Option<String> {
        self.shared.last_fault()
    }

    /// Device of the current session.
    pub fn device_name(&self) -> Option<String> {
        self.device.lock().clone()
    }

    fn on_worker_thread(&self) -> bool {
        *self.worker.lock() == Some(thread::current().id())
    }

    /// Shut the current session down. Caller holds the transition lock.
    fn close_session(&self) -> Result<(), CloseError> {
        let Some(session) = self.session.lock().take() else {
            return Ok(());
        };

        if !self
            .shared
            .transition(LifecycleState::Open, LifecycleState::Closing)
        {
            // The worker closed the port after a fatal fault; only reap it.
            if let Err(e) = session.shutdown() {
                debug!("reaping a faulted session: {}", e);
            }
            self.finish_session();
            return Ok(());
        }

        let joined = session.shutdown();
        self.shared.set_state(LifecycleState::Closed);
        let device = self.finish_session();
        if let Err(e) = joined {
            self.shared.set_error(true);
            warn!(
                "closing {} failed: {}",
                device.as_deref().unwrap_or("port"),
                e
            );
            return Err(e);
        }

        if self.shared.error_status() {
            return Err(CloseError::DeviceFault {
                detail: self.shared.last_fault(),
            });
        }
        info!("closed {}", device.as_deref().unwrap_or("port"));
        Ok(())
    }

    fn finish_session(&self) -> Option<String> {
        *self.worker.lock() = None;
        self.device.lock().take()
    }
}

impl<B: Backend> Drop for AsyncSerial<B> {
    fn drop(&mut self) {
        self.shared.callback().clear();

        if self.on_worker_thread() {
            // Joining ourselves would never return.
            if let Some(session) = self.session.get_mut().take() {
                self.shared.set_state(LifecycleState::Closed);
                session.detach();
            }
            return;
        }

        if let Err(e) = self.close() {
            debug!("discarding close error during drop: {}", e);
        }
    }
}

impl<B: Backend> std::fmt::Debug for AsyncSerial<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncSerial")
            .field("backend", &self.backend.name())
            .field("device", &self.device_name())
            .field("state", &self.state())
            .field("error", &self.error_status())
            .finish()
    }
}

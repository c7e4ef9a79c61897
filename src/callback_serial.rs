//! Callback-only facade over [`AsyncSerial`].

use crate::async_serial::AsyncSerial;
use crate::backend::{Backend, Capabilities, DefaultBackend};
use crate::error::{CloseError, OpenError};
use crate::port::PortConfiguration;

/// Serial port whose received bytes are consumed through one callback.
///
/// The callback is cleared before the port is torn down, so it never runs
/// while the port is being dropped.
pub struct CallbackSerial<B: Backend = DefaultBackend> {
    port: AsyncSerial<B>,
}

impl CallbackSerial<DefaultBackend> {
    pub fn new() -> Self {
        Self {
            port: AsyncSerial::new(),
        }
    }

    pub fn open_with(device: &str, config: &PortConfiguration) -> Result<Self, OpenError> {
        Ok(Self {
            port: AsyncSerial::open_with(device, config)?,
        })
    }
}

impl Default for CallbackSerial<DefaultBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> CallbackSerial<B> {
    pub fn with_backend(backend: B) -> Self {
        Self {
            port: AsyncSerial::with_backend(backend),
        }
    }

    pub fn open_with_backend(
        backend: B,
        device: &str,
        config: &PortConfiguration,
    ) -> Result<Self, OpenError> {
        Ok(Self {
            port: AsyncSerial::open_with_backend(backend, device, config)?,
        })
    }

    /// Install the callback, replacing the previous one.
    pub fn set_callback<F>(&self, callback: F)
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        self.port.set_read_callback(callback);
    }

    pub fn clear_callback(&self) {
        self.port.clear_read_callback();
    }

    pub fn open(&self, device: &str, config: &PortConfiguration) -> Result<(), OpenError> {
        self.port.open(device, config)
    }

    pub fn close(&self) -> Result<(), CloseError> {
        self.port.close()
    }

    pub fn write(&self, bytes: impl AsRef<[u8]>) {
        self.port.write(bytes);
    }

    pub fn is_open(&self) -> bool {
        self.port.is_open()
    }

    pub fn error_status(&self) -> bool {
        self.port.error_status()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.port.capabilities()
    }
}

impl<B: Backend> Drop for CallbackSerial<B> {
    fn drop(&mut self) {
        self.clear_callback();
    }
}

impl<B: Backend> std::fmt::Debug for CallbackSerial<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackSerial")
            .field("port", &self.port)
            .finish()
    }
}

//! Controller-level error types.
//!
//! `OpenError` and `CloseError` are what callers of `open`/`close` see.
//! `DeviceFault` is the worker-side classification of a device failure; it
//! never reaches a caller directly and is recorded through the error flag.

use crate::port::PortError;
use thiserror::Error;

/// Failure to bring a port into the open state.
#[derive(Debug, Error)]
pub enum OpenError {
    /// The implicit close of the previous session failed.
    #[error("failed to close the previous session: {0}")]
    PreviousSession(#[source] CloseError),

    /// The device could not be acquired or configured.
    #[error("failed to open '{device}': {source}")]
    Device {
        device: String,
        #[source]
        source: PortError,
    },

    /// The background worker thread could not be started.
    #[error("failed to start the background worker: {0}")]
    Worker(#[source] std::io::Error),
}

/// Failure reported by `close()` once the worker has been shut down.
#[derive(Debug, Error)]
pub enum CloseError {
    /// The error flag was raised during the session.
    #[error("error while closing the device{}", detail_suffix(.detail))]
    DeviceFault { detail: Option<String> },

    /// The background worker panicked instead of exiting.
    #[error("the background worker panicked")]
    WorkerPanicked,

    /// `close` (or `open`) was called from the worker thread, e.g. inside the
    /// read callback; joining would dead-lock.
    #[error("cannot close the port from its own background worker")]
    CalledFromWorker,
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default()
}

/// Device failure observed on the background worker.
#[derive(Debug, Error)]
pub enum DeviceFault {
    /// One read attempt failed; the port stays usable.
    #[error("transient read error: {0}")]
    TransientRead(#[source] PortError),

    /// The device can no longer be used; the port is closed.
    #[error("fatal device error: {0}")]
    Fatal(#[source] PortError),
}

impl DeviceFault {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

//! State shared between a port controller and its background worker.
//!
//! The lifecycle cell and the error flag are atomics so `is_open()` and
//! `error_status()` are cheap to poll from any thread. Everything a worker
//! needs to report (faults, delivered bytes, completed writes) goes through
//! [`PortShared`].

use crate::callback::CallbackSlot;
use crate::error::DeviceFault;
use crate::pipeline::WritePipeline;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use tracing::{debug, warn};

/// Lifecycle of a port controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum LifecycleState {
    #[default]
    Closed = 0,
    Opening = 1,
    Open = 2,
    Closing = 3,
}

impl LifecycleState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Opening,
            2 => Self::Open,
            3 => Self::Closing,
            _ => Self::Closed,
        }
    }

    /// States in which device errors are genuine rather than shutdown noise.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Opening | Self::Open)
    }
}

/// Snapshot of a port's I/O counters.
///
/// Counters accumulate over every session of the same controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortStats {
    pub bytes_written: u64,
    pub bytes_read: u64,
    /// Number of callback deliveries (one per completed read).
    pub reads_delivered: u64,
    pub read_errors: u64,
    /// Number of completed device writes.
    pub transmissions: u64,
    /// Bytes queued but not yet handed to the device.
    pub queued_bytes: usize,
    pub write_in_flight: bool,
}

#[derive(Debug, Default)]
struct Counters {
    bytes_written: AtomicU64,
    bytes_read: AtomicU64,
    reads_delivered: AtomicU64,
    read_errors: AtomicU64,
    transmissions: AtomicU64,
}

/// Lifecycle cell, error flag, callback slot, write queue and counters of one
/// port controller.
#[derive(Debug, Default)]
pub struct PortShared {
    lifecycle: AtomicU8,
    error: AtomicBool,
    callback: CallbackSlot,
    pipeline: WritePipeline,
    counters: Counters,
    last_fault: Mutex<Option<String>>,
}

impl PortShared {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.lifecycle.load(Ordering::Acquire))
    }

    pub fn is_open(&self) -> bool {
        self.state() == LifecycleState::Open
    }

    pub fn is_live(&self) -> bool {
        self.state().is_live()
    }

    pub fn error_status(&self) -> bool {
        self.error.load(Ordering::Acquire)
    }

    pub fn callback(&self) -> &CallbackSlot {
        &self.callback
    }

    pub fn pipeline(&self) -> &WritePipeline {
        &self.pipeline
    }

    pub fn last_fault(&self) -> Option<String> {
        self.last_fault.lock().clone()
    }

    pub(crate) fn set_state(&self, state: LifecycleState) {
        self.lifecycle.store(state as u8, Ordering::Release);
    }

    /// Compare-and-swap the lifecycle cell.
    pub(crate) fn transition(&self, from: LifecycleState, to: LifecycleState) -> bool {
        self.lifecycle
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn set_error(&self, error: bool) {
        self.error.store(error, Ordering::Release);
    }

    /// Enter `Opening` with the pessimistic error flag and a clean queue.
    pub(crate) fn begin_session(&self) {
        self.set_state(LifecycleState::Opening);
        self.set_error(true);
        self.pipeline.reset();
        *self.last_fault.lock() = None;
    }

    /// Hand one completed read to the callback slot.
    pub fn deliver(&self, bytes: &[u8]) {
        self.counters
            .bytes_read
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);
        self.counters.reads_delivered.fetch_add(1, Ordering::Relaxed);
        self.callback.dispatch(bytes);
    }

    /// Account for one completed device write.
    pub fn record_written(&self, len: usize) {
        self.counters
            .bytes_written
            .fetch_add(len as u64, Ordering::Relaxed);
        self.counters.transmissions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a device failure seen by the worker.
    ///
    /// Returns `false` when the port is already shutting down: the failure
    /// is the expected consequence of a deliberate close and is swallowed.
    /// A fatal fault marks the port closed before raising the error flag, so
    /// a concurrent `close()` cannot mistake it for its own shutdown.
    pub fn record_fault(&self, fault: DeviceFault) -> bool {
        let recorded = match &fault {
            DeviceFault::TransientRead(_) => {
                if self.is_live() {
                    self.counters.read_errors.fetch_add(1, Ordering::Relaxed);
                    true
                } else {
                    false
                }
            }
            DeviceFault::Fatal(_) => self
                .lifecycle
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                    LifecycleState::from_u8(raw)
                        .is_live()
                        .then_some(LifecycleState::Closed as u8)
                })
                .is_ok(),
        };

        if !recorded {
            debug!("ignoring device error raised during shutdown: {}", fault);
            return false;
        }

        *self.last_fault.lock() = Some(fault.to_string());
        self.set_error(true);
        warn!("{}", fault);
        true
    }

    pub fn stats(&self) -> PortStats {
        PortStats {
            bytes_written: self.counters.bytes_written.load(Ordering::Relaxed),
            bytes_read: self.counters.bytes_read.load(Ordering::Relaxed),
            reads_delivered: self.counters.reads_delivered.load(Ordering::Relaxed),
            read_errors: self.counters.read_errors.load(Ordering::Relaxed),
            transmissions: self.counters.transmissions.load(Ordering::Relaxed),
            queued_bytes: self.pipeline.queued_bytes(),
            write_in_flight: self.pipeline.is_in_flight(),
        }
    }
}

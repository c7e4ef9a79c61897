//! Double-buffered write pipeline.
//!
//! Callers append to the write queue from any thread; the single background
//! writer swaps the whole queue out as the in-flight buffer, transmits it, and
//! on completion swaps again with whatever arrived meanwhile. The spent
//! in-flight allocation becomes the next queue, so steady-state writing does
//! not allocate.

use parking_lot::Mutex;
use std::mem;

#[derive(Debug, Default)]
struct PipelineState {
    /// Bytes waiting for the next transmission.
    queue: Vec<u8>,
    /// Whether a transmission is outstanding.
    in_flight: bool,
    /// Allocation returned by the last completed transmission.
    spare: Vec<u8>,
}

/// Ordered queue of outbound bytes plus the in-flight marker.
///
/// At most one buffer is in flight at a time: [`WritePipeline::begin_transmit`]
/// refuses to hand out a second one until the first is completed or abandoned.
#[derive(Debug, Default)]
pub struct WritePipeline {
    inner: Mutex<PipelineState>,
}

impl WritePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes; each call's bytes stay contiguous.
    pub fn enqueue(&self, bytes: &[u8]) {
        self.inner.lock().queue.extend_from_slice(bytes);
    }

    /// Take the whole queue as the new in-flight buffer.
    ///
    /// Returns `None` when a transmission is already outstanding (its
    /// completion will pick the new bytes up) or when nothing is queued.
    pub fn begin_transmit(&self) -> Option<Vec<u8>> {
        let mut state = self.inner.lock();
        if state.in_flight || state.queue.is_empty() {
            return None;
        }
        state.in_flight = true;
        let next = mem::take(&mut state.spare);
        Some(mem::replace(&mut state.queue, next))
    }

    /// Finish the outstanding transmission successfully.
    ///
    /// If more bytes arrived while `spent` was on the wire they come back as
    /// the next in-flight buffer; otherwise the pipeline goes idle.
    pub fn complete_transmit(&self, mut spent: Vec<u8>) -> Option<Vec<u8>> {
        spent.clear();
        let mut state = self.inner.lock();
        debug_assert!(state.in_flight, "completion without a transmission");
        if state.queue.is_empty() {
            state.in_flight = false;
            state.spare = spent;
            return None;
        }
        Some(mem::replace(&mut state.queue, spent))
    }

    /// Drop the outstanding transmission after a device error.
    pub fn abandon_transmit(&self) {
        self.inner.lock().in_flight = false;
    }

    /// Discard queued bytes and any in-flight marker from a previous session.
    pub fn reset(&self) {
        let mut state = self.inner.lock();
        state.queue.clear();
        state.in_flight = false;
    }

    /// Bytes queued but not yet handed to the device.
    pub fn queued_bytes(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn is_in_flight(&self) -> bool {
        self.inner.lock().in_flight
    }
}

//! Single-slot mailbox for the read callback.
//!
//! The slot can be set, replaced or cleared from any thread while the
//! background worker dispatches into it. Two guarantees hold:
//!
//! - once [`CallbackSlot::clear`] returns on a thread other than the
//!   dispatching one, no invocation is running and none will start;
//! - a callback may clear or replace the slot from inside itself without
//!   dead-locking.
//!
//! Dispatch takes the callback out of the slot for the duration of the call
//! and puts it back only if the slot's generation did not move meanwhile.

use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, ThreadId};
use tracing::error;

/// Callback invoked with the bytes of one completed read.
pub type ReadCallback = Box<dyn FnMut(&[u8]) + Send + 'static>;

#[derive(Default)]
struct SlotState {
    callback: Option<ReadCallback>,
    /// Bumped by every set/clear.
    generation: u64,
    /// Thread currently running the callback, if any.
    dispatching: Option<ThreadId>,
}

#[derive(Default)]
pub struct CallbackSlot {
    state: Mutex<SlotState>,
    /// Held for the whole duration of an invocation.
    invocation: Mutex<()>,
}

impl CallbackSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `callback`, replacing any previous one.
    pub fn set(&self, callback: ReadCallback) {
        let mut state = self.state.lock();
        state.callback = Some(callback);
        state.generation = state.generation.wrapping_add(1);
    }

    /// Empty the slot and wait out an invocation running on another thread.
    pub fn clear(&self) {
        let reentrant = {
            let mut state = self.state.lock();
            state.callback = None;
            state.generation = state.generation.wrapping_add(1);
            state.dispatching == Some(thread::current().id())
        };
        if !reentrant {
            drop(self.invocation.lock());
        }
    }

    pub fn is_set(&self) -> bool {
        self.state.lock().callback.is_some()
    }

    /// Invoke the callback with `bytes`; returns whether one was installed.
    ///
    /// A panicking callback is dropped from the slot and the panic is logged.
    pub fn dispatch(&self, bytes: &[u8]) -> bool {
        let _running = self.invocation.lock();

        let (mut callback, generation) = {
            let mut state = self.state.lock();
            let Some(callback) = state.callback.take() else {
                return false;
            };
            state.dispatching = Some(thread::current().id());
            (callback, state.generation)
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(bytes)));

        let mut state = self.state.lock();
        state.dispatching = None;
        match outcome {
            Ok(()) => {
                if state.generation == generation {
                    state.callback = Some(callback);
                }
            }
            Err(_) => error!("read callback panicked; removing it"),
        }
        true
    }
}

impl std::fmt::Debug for CallbackSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CallbackSlot")
            .field("set", &state.callback.is_some())
            .field("generation", &state.generation)
            .finish()
    }
}

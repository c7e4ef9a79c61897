//! Async Serial Library
//!
//! Non-blocking access to a serial port: callers queue writes and register a
//! read callback, while one background worker per open port performs the
//! device I/O and reports failures through an error flag.
//!
//! # Modules
//!
//! - `async_serial`: The port controller (open/close/write/callback)
//! - `callback_serial`: Callback-only facade over the controller
//! - `backend`: Event-loop and blocking-loop I/O strategies
//! - `pipeline`: Double-buffered write queue
//! - `callback`: Single-slot read callback mailbox
//! - `state`: Lifecycle cell, error flag and counters shared with the worker
//! - `port`: Device handles (serialport, tokio-serial, mock)
//! - `error`: Open/close error types
//! - `config`: Configuration management with TOML support
//! - `logging`: Tracing subscriber setup

pub mod async_serial;
pub mod backend;
pub mod callback;
pub mod callback_serial;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod port;
pub mod state;

pub use crate::async_serial::AsyncSerial;
pub use backend::{
    Backend, BackendKind, BlockingBackend, Capabilities, ConfiguredBackend, DefaultBackend,
    EventLoopBackend, ReadErrorPolicy, READ_BUFFER_SIZE,
};
pub use callback_serial::CallbackSerial;
pub use error::{CloseError, DeviceFault, OpenError};
pub use port::{
    DataBits, FlowControl, MockSerialPort, Parity, PortConfiguration, PortError, SerialDevice,
    StopBits, SyncSerialPort,
};
pub use state::{LifecycleState, PortStats};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};

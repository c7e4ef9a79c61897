//! Device handle layer.
//!
//! Provides the traits, framing options and concrete handles (real, async and
//! mock) that the backends acquire at open time and release at close time.

pub mod error;
pub mod mock;
pub mod sync_port;
pub mod traits;

#[cfg(feature = "async-serial")]
pub mod async_port;

pub use error::PortError;
pub use mock::MockSerialPort;
pub use sync_port::SyncSerialPort;
pub use traits::*;

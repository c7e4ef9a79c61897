//! Async serial port acquisition using tokio-serial.
//!
//! Opens the Device Handle of the event-loop backend. The returned stream is
//! registered with the reactor of the runtime that is current when
//! [`open_stream`] runs, so the backend calls it from inside the worker's own
//! runtime context.
//!
//! Note: This module is gated behind the `async-serial` feature flag.

use super::error::PortError;
use super::traits::{DataBits, FlowControl, Parity, PortConfiguration, StopBits};

/// Open a serial port as a tokio `AsyncRead + AsyncWrite` stream.
///
/// # Example
/// ```no_run
/// use async_serial::port::{async_port::open_stream, PortConfiguration};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let stream = open_stream("/dev/ttyUSB0", &PortConfiguration::new(115_200))?;
/// # Ok(())
/// # }
/// ```
pub fn open_stream(
    port_name: &str,
    config: &PortConfiguration,
) -> Result<tokio_serial::SerialStream, PortError> {
    let builder = tokio_serial::new(port_name, config.baud_rate)
        .data_bits(convert_data_bits(config.data_bits))
        .flow_control(convert_flow_control(config.flow_control))
        .parity(convert_parity(config.parity))
        .stop_bits(convert_stop_bits(config.stop_bits)?)
        .timeout(config.timeout);

    tokio_serial::SerialStream::open(&builder).map_err(|e| match e.kind {
        tokio_serial::ErrorKind::NoDevice => PortError::not_found(port_name),
        tokio_serial::ErrorKind::InvalidInput => PortError::config(e.to_string()),
        _ => PortError::Io(std::io::Error::other(e.to_string())),
    })
}

// Helper conversion functions for tokio-serial types

fn convert_data_bits(bits: DataBits) -> tokio_serial::DataBits {
    match bits {
        DataBits::Five => tokio_serial::DataBits::Five,
        DataBits::Six => tokio_serial::DataBits::Six,
        DataBits::Seven => tokio_serial::DataBits::Seven,
        DataBits::Eight => tokio_serial::DataBits::Eight,
    }
}

fn convert_flow_control(flow: FlowControl) -> tokio_serial::FlowControl {
    match flow {
        FlowControl::None => tokio_serial::FlowControl::None,
        FlowControl::Software => tokio_serial::FlowControl::Software,
        FlowControl::Hardware => tokio_serial::FlowControl::Hardware,
    }
}

fn convert_parity(parity: Parity) -> tokio_serial::Parity {
    match parity {
        Parity::None => tokio_serial::Parity::None,
        Parity::Odd => tokio_serial::Parity::Odd,
        Parity::Even => tokio_serial::Parity::Even,
    }
}

fn convert_stop_bits(stop_bits: StopBits) -> Result<tokio_serial::StopBits, PortError> {
    match stop_bits {
        StopBits::One => Ok(tokio_serial::StopBits::One),
        StopBits::Two => Ok(tokio_serial::StopBits::Two),
        StopBits::OnePointFive => Err(PortError::config(
            "1.5 stop bits are not supported by the serial driver",
        )),
    }
}

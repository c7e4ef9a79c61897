//! Event-loop backend.
//!
//! Each session owns a current-thread tokio runtime that lives on the
//! background worker thread. The device stream is split into a reader task
//! (an unbounded chain of reads into one reused buffer) and a writer task
//! that drains the [`WritePipeline`](crate::pipeline::WritePipeline) one
//! in-flight buffer at a time. Any device error on either task is fatal for
//! the session.
//!
//! On close the reader is cancelled at once while the writer is given up to
//! the configured port timeout to hand the queued bytes to the device.

use super::{Backend, Capabilities, Session, WorkerGuard, READ_BUFFER_SIZE};
use crate::error::{CloseError, DeviceFault, OpenError};
use crate::port::{PortConfiguration, PortError};
use crate::state::PortShared;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::runtime::{Builder, Runtime};
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinError;
use tracing::{debug, info, warn};

/// Byte stream the event-loop backend can drive.
pub trait AsyncDevice: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> AsyncDevice for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

type StreamOpener =
    dyn Fn(&str, &PortConfiguration) -> Result<Box<dyn AsyncDevice>, PortError> + Send + Sync;

/// A device opened inside the runtime that will drive it.
pub struct EventLoopDevice {
    name: String,
    runtime: Runtime,
    stream: Box<dyn AsyncDevice>,
    /// How long a close waits for queued writes.
    drain_timeout: Duration,
}

impl EventLoopDevice {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Backend running a tokio reactor on the worker thread.
pub struct EventLoopBackend {
    opener: Box<StreamOpener>,
}

impl EventLoopBackend {
    /// Backend for real serial ports, opened through tokio-serial.
    #[cfg(feature = "async-serial")]
    pub fn new() -> Self {
        Self::with_opener(|name, config| {
            let stream = crate::port::async_port::open_stream(name, config)?;
            Ok(Box::new(stream) as Box<dyn AsyncDevice>)
        })
    }

    /// Backend using a custom stream-open primitive.
    ///
    /// The opener runs with the session's runtime entered, so streams that
    /// register with the reactor (serial ports, sockets) bind to the right one.
    pub fn with_opener<F>(opener: F) -> Self
    where
        F: Fn(&str, &PortConfiguration) -> Result<Box<dyn AsyncDevice>, PortError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            opener: Box::new(opener),
        }
    }
}

#[cfg(feature = "async-serial")]
impl Default for EventLoopBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for EventLoopBackend {
    type Device = EventLoopDevice;

    fn name(&self) -> &'static str {
        "event-loop"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            asynchronous_writes: true,
            honors_framing: true,
        }
    }

    fn acquire(
        &self,
        device: &str,
        config: &PortConfiguration,
    ) -> Result<Self::Device, PortError> {
        let runtime = Builder::new_current_thread().enable_all().build()?;

        let opened = {
            let _context = runtime.enter();
            (self.opener)(device, config)
        };

        match opened {
            Ok(stream) => Ok(EventLoopDevice {
                name: device.to_string(),
                runtime,
                stream,
                drain_timeout: config.timeout,
            }),
            Err(e) => {
                // The caller may itself be inside a runtime, where a plain
                // drop would panic.
                runtime.shutdown_background();
                Err(e)
            }
        }
    }

    fn launch(
        &self,
        device: Self::Device,
        shared: Arc<PortShared>,
    ) -> Result<Box<dyn Session>, OpenError> {
        let wake = Arc::new(Notify::new());
        let (stop_tx, stop_rx) = oneshot::channel();

        let worker_shared = Arc::clone(&shared);
        let worker_wake = Arc::clone(&wake);
        let worker = thread::Builder::new()
            .name(format!("serial-io-{}", device.name))
            .spawn(move || run_worker(device, worker_shared, worker_wake, stop_rx))
            .map_err(OpenError::Worker)?;

        Ok(Box::new(EventLoopSession {
            shared,
            wake,
            stop: stop_tx,
            worker,
        }))
    }
}

struct EventLoopSession {
    shared: Arc<PortShared>,
    wake: Arc<Notify>,
    stop: oneshot::Sender<()>,
    worker: JoinHandle<()>,
}

impl Session for EventLoopSession {
    fn submit(&self, bytes: &[u8]) {
        self.shared.pipeline().enqueue(bytes);
        self.wake.notify_one();
    }

    fn worker_id(&self) -> ThreadId {
        self.worker.thread().id()
    }

    fn shutdown(self: Box<Self>) -> Result<(), CloseError> {
        let EventLoopSession { stop, worker, .. } = *self;
        // The worker may already have exited after a device fault.
        let _ = stop.send(());
        worker.join().map_err(|_| CloseError::WorkerPanicked)
    }

    fn detach(self: Box<Self>) {
        let _ = self.stop.send(());
    }
}

enum Exit {
    Stopped,
    Reader(Result<Result<(), PortError>, JoinError>),
    Writer(Result<Result<(), PortError>, JoinError>),
}

fn run_worker(
    device: EventLoopDevice,
    shared: Arc<PortShared>,
    wake: Arc<Notify>,
    stop: oneshot::Receiver<()>,
) {
    let EventLoopDevice {
        name,
        runtime,
        stream,
        drain_timeout,
    } = device;
    let _guard = WorkerGuard::new(&shared, &name);
    debug!("event-loop worker started for {}", name);

    runtime.block_on(async {
        let (reader, writer) = tokio::io::split(stream);
        let mut read_task = tokio::spawn(read_loop(reader, Arc::clone(&shared), name.clone()));
        let mut write_task =
            tokio::spawn(write_loop(writer, Arc::clone(&shared), Arc::clone(&wake)));

        let exit = tokio::select! {
            _ = stop => Exit::Stopped,
            result = &mut read_task => Exit::Reader(result),
            result = &mut write_task => Exit::Writer(result),
        };

        match exit {
            Exit::Stopped => {
                read_task.abort();
                let _ = read_task.await;

                // Bytes queued before the close still go out.
                wake.notify_one();
                match tokio::time::timeout(drain_timeout, &mut write_task).await {
                    Ok(result) => report(&shared, "writer", result),
                    Err(_) => {
                        write_task.abort();
                        let _ = write_task.await;
                        warn!(
                            "{} queued bytes for {} not sent within {:?} of close",
                            shared.pipeline().queued_bytes(),
                            name,
                            drain_timeout
                        );
                    }
                }
            }
            Exit::Reader(result) => {
                write_task.abort();
                let _ = write_task.await;
                report(&shared, "reader", result);
            }
            Exit::Writer(result) => {
                read_task.abort();
                let _ = read_task.await;
                report(&shared, "writer", result);
            }
        }
    });

    // Pending writes of an aborted transmission are gone with the device.
    shared.pipeline().abandon_transmit();
    info!("event-loop worker for {} stopped", name);
}

fn report(shared: &PortShared, task: &str, result: Result<Result<(), PortError>, JoinError>) {
    let error = match result {
        Ok(Ok(())) => return,
        Ok(Err(e)) => e,
        Err(join) => PortError::Worker(format!("{} task failed: {}", task, join)),
    };
    shared.record_fault(DeviceFault::Fatal(error));
}

/// Read until the device fails, delivering every completed read in order.
///
/// Zero bytes means the peer went away and is reported as a disconnect.
pub(crate) async fn read_loop<R>(
    mut reader: R,
    shared: Arc<PortShared>,
    device: String,
) -> Result<(), PortError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buffer).await?;
        if n == 0 {
            return Err(PortError::disconnected(device));
        }
        shared.deliver(&buffer[..n]);
    }
}

/// Transmit queued bytes whenever woken, one in-flight buffer at a time.
///
/// Returns once the queue is empty and the port has left the live states.
pub(crate) async fn write_loop<W>(
    mut writer: W,
    shared: Arc<PortShared>,
    wake: Arc<Notify>,
) -> Result<(), PortError>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let mut buffer = match shared.pipeline().begin_transmit() {
            Some(buffer) => buffer,
            None if shared.is_live() => {
                wake.notified().await;
                continue;
            }
            None => return Ok(()),
        };

        loop {
            let sent = async {
                writer.write_all(&buffer).await?;
                writer.flush().await
            }
            .await;

            if let Err(e) = sent {
                shared.pipeline().abandon_transmit();
                return Err(e.into());
            }
            shared.record_written(buffer.len());

            match shared.pipeline().complete_transmit(buffer) {
                Some(next) => buffer = next,
                None => break,
            }
        }
    }
}

use async_serial::config::ConfigLoader;
use async_serial::logging::init_logging;
use async_serial::{AsyncSerial, Backend, BackendKind, ConfiguredBackend};
use clap::{Parser, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, warn};

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "serial-term",
    version,
    about = "Minimal serial terminal: prints received bytes and sends stdin lines.",
    long_about = "Opens a serial device through async_serial, prints everything the device sends (raw or hex, optionally timestamped) and writes each line read from stdin to the device. Prints the port statistics as JSON on exit."
)]
struct Args {
    /// Serial device or alias. Defaults to `serial.device` from the configuration.
    device: Option<String>,

    /// Baud rate, overriding the configuration.
    #[arg(short, long)]
    baud: Option<u32>,

    /// Configuration file to load instead of the standard locations.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// I/O backend, overriding the configuration.
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,

    /// Print received bytes as hex.
    #[arg(long)]
    hex: bool,

    /// Prefix every received chunk with the local time.
    #[arg(short, long)]
    timestamps: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Auto,
    EventLoop,
    Blocking,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Auto => BackendKind::Auto,
            BackendArg::EventLoop => BackendKind::EventLoop,
            BackendArg::Blocking => BackendKind::Blocking,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let loader = match args.config {
        Some(ref path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    let mut config = loader.into_config();

    match args.verbose {
        0 => {}
        1 => config.logging.level = "debug".to_string(),
        _ => config.logging.level = "trace".to_string(),
    }
    init_logging(&config.logging);

    if let Some(baud) = args.baud {
        config.serial.baud_rate = baud;
    }
    config.validate()?;

    let device = args
        .device
        .clone()
        .or_else(|| config.serial.device.clone())
        .ok_or("no device given and `serial.device` is not configured")?;
    let device = config.serial.resolve_port(&device);

    let kind = args.backend.map(BackendKind::from).unwrap_or(config.worker.backend);
    let backend = ConfiguredBackend::for_kind(kind, config.worker.read_error_policy())?;
    let port = AsyncSerial::with_backend(backend);

    let (hex, timestamps) = (args.hex, args.timestamps);
    port.set_read_callback(move |bytes| {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(render(bytes, hex, timestamps).as_bytes());
        let _ = stdout.flush();
    });

    port.open(&device, &config.serial.port_configuration())?;
    info!(
        "connected to {} at {} baud ({} backend)",
        device,
        config.serial.baud_rate,
        port.backend().name()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut health = tokio::time::interval(Duration::from_millis(250));
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => port.write(format!("{}\n", line)),
                None => break,
            },
            _ = health.tick() => {
                if !port.is_open() {
                    warn!("{} is no longer open", device);
                    break;
                }
            }
            _ = signal::ctrl_c() => break,
        }
    }

    let closed = port.close();
    eprintln!("{}", serde_json::to_string_pretty(&port.stats())?);
    closed?;
    Ok(())
}

/// Format one received chunk for the terminal.
fn render(bytes: &[u8], hex: bool, timestamps: bool) -> String {
    let body = if hex {
        let mut line = bytes
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(" ");
        line.push('\n');
        line
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    };

    if timestamps {
        format!("[{}] {}", chrono::Local::now().format("%H:%M:%S%.3f"), body)
    } else {
        body
    }
}

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use opt3001_lib::{
    DeviceConfig, OperatingMode, Reading, RegisterAddress, SensorConfig, Session, SessionConfig, UsbTransport,
    list_adapters,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::{signal, time::sleep};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Read an OPT3001 ambient light sensor through an SM-USB-DIG adapter.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
    #[command(flatten)]
    sensor: SensorArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct SensorArgs {
    /// Full-scale range selector, 12 for auto-ranging.
    #[arg(long, default_value_t = 12, global = true)]
    full_scale: u8,
    /// Conversion time in milliseconds (100 or 800).
    #[arg(long, default_value_t = 800, global = true)]
    conversion_time: u16,
    /// Operating mode written to the sensor.
    #[arg(long, value_enum, default_value_t = ModeArg::Continuous, global = true)]
    mode: ModeArg,
    /// USB transfer timeout in milliseconds.
    #[arg(long, default_value_t = 1000, global = true)]
    timeout_ms: u64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List attached adapters.
    List,
    /// Print a single lux reading.
    Lux,
    /// Dump all 16 registers.
    Registers,
    /// Sample lux readings into a file.
    Log {
        /// Run continuously until Ctrl+C is pressed.
        #[arg(short, long)]
        continuous: bool,
        /// Number of samples to take if not running continuously.
        #[arg(short, long, default_value_t = 10)]
        samples: u32,
        /// Sampling interval in milliseconds.
        #[arg(short, long, default_value_t = 1000)]
        interval_ms: u64,
        /// Output file.
        #[arg(short, long, default_value = "data.csv")]
        output: PathBuf,
        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
        format: OutputFormat,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Shutdown,
    SingleShot,
    Continuous,
    ContinuousAlt,
}

impl From<ModeArg> for OperatingMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Shutdown => OperatingMode::Shutdown,
            ModeArg::SingleShot => OperatingMode::SingleShot,
            ModeArg::Continuous => OperatingMode::Continuous,
            ModeArg::ContinuousAlt => OperatingMode::ContinuousAlt,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutputFormat {
    Csv,
    /// One JSON object per line
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(cli.verbose.tracing_level_filter().into())
                .from_env_lossy(),
        )
        .with_target(false)
        .init();

    if let Err(e) = run(cli).await {
        error!("Application failed: {:?}", e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let device = DeviceConfig {
        timeout: Duration::from_millis(cli.sensor.timeout_ms),
        ..DeviceConfig::default()
    };

    match cli.command {
        Command::List => {
            let adapters = list_adapters(&device).context("Failed to list USB devices")?;
            if adapters.is_empty() {
                warn!("No SM-USB-DIG adapter found.");
            }
            for adapter in adapters {
                println!(
                    "Bus {:03} Address {:03}  {}  serial {}",
                    adapter.bus,
                    adapter.address,
                    adapter.product.as_deref().unwrap_or("<unknown product>"),
                    adapter.serial.as_deref().unwrap_or("<none>")
                );
            }
        }
        Command::Lux => {
            let mut session = open_session(&cli.sensor, &device).await?;
            let reading = session.sample().await.context("Failed to read lux")?;
            println!("{} {:.2} lx", reading.timestamp, reading.lux);
        }
        Command::Registers => {
            let mut session = open_session(&cli.sensor, &device).await?;
            let values = session.read_all_registers().await.context("Failed to read registers")?;
            for (address, value) in RegisterAddress::all().zip(values) {
                println!("R{}: {}", address, value);
            }
        }
        Command::Log {
            continuous,
            samples,
            interval_ms,
            output,
            format,
        } => {
            let mut session = open_session(&cli.sensor, &device).await?;
            let mut sink = ReadingSink::create(&output, format)?;
            let iterations = if continuous { u32::MAX } else { samples };
            let interval = Duration::from_millis(interval_ms);

            info!("--- Entering Sampling Loop ---");
            let mut written = 0u32;
            for i in 0..iterations {
                let reading = session.sample().await.context("Failed to read lux")?;
                sink.write(&reading)?;
                written += 1;
                info!("[Sample {}] {:.2} lx", i + 1, reading.lux);

                tokio::select! {
                    _ = sleep(interval) => {}
                    _ = signal::ctrl_c() => {
                        info!("Ctrl+C received, shutting down gracefully.");
                        break;
                    }
                }
            }
            sink.flush()?;

            let path = std::path::absolute(&output).unwrap_or(output);
            info!("Wrote {} lines to {}", written, path.display());
        }
    }
    Ok(())
}

async fn open_session(args: &SensorArgs, device: &DeviceConfig) -> Result<Session<UsbTransport>> {
    let sensor = SensorConfig::new(args.full_scale, args.conversion_time, args.mode.into())
        .context("Invalid sensor configuration")?;
    let transport = UsbTransport::open(device).context("Failed to open the USB adapter")?;
    let timing = SessionConfig {
        read_timeout: device.timeout,
        ..SessionConfig::default()
    };
    Session::open_with(transport, sensor, timing)
        .await
        .context("Failed to configure the sensor")
}

enum ReadingSink {
    Csv(csv::Writer<File>),
    Json(BufWriter<File>),
}

impl ReadingSink {
    fn create(path: &Path, format: OutputFormat) -> Result<Self> {
        let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        Ok(match format {
            OutputFormat::Csv => ReadingSink::Csv(csv::Writer::from_writer(file)),
            OutputFormat::Json => ReadingSink::Json(BufWriter::new(file)),
        })
    }

    fn write(&mut self, reading: &Reading) -> Result<()> {
        match self {
            ReadingSink::Csv(writer) => writer.serialize(reading)?,
            ReadingSink::Json(writer) => {
                serde_json::to_writer(&mut *writer, reading)?;
                writeln!(writer)?;
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        match self {
            ReadingSink::Csv(writer) => writer.flush()?,
            ReadingSink::Json(writer) => writer.flush()?,
        }
        Ok(())
    }
}

use std::io::{stderr, stdout};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use linux_embedded_hal::{Delay, Serial};
use pms7003::monitor::DEFAULT_POLL_INTERVAL_MS;
use pms7003::{ConsoleReporter, Monitor, MonitorConfig, Pms7003Sensor};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Prints measurements streamed by a PMS 7003 air quality sensor.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Serial device the sensor is connected to, e.g. /dev/ttyUSB0.
    device: PathBuf,

    /// Pause between polls of the serial device, at most 1000.
    #[arg(short, long, default_value_t = DEFAULT_POLL_INTERVAL_MS, value_name = "ms")]
    interval_ms: u32,

    /// Stop after this many readings.
    #[arg(short, long)]
    count: Option<usize>,

    /// Do not clear the terminal before each reading.
    #[arg(long, action)]
    no_clear: bool,

    /// Do not print readings failing the checksum.
    #[arg(long, action)]
    skip_invalid: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(stderr)
        .with_env_filter(
            EnvFilter::try_from_env("PMS7003_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Connecting to: {}", cli.device.display());
    let serial = Serial::open(&cli.device)
        .with_context(|| format!("opening serial device {}", cli.device.display()))?;

    let config = MonitorConfig {
        poll_interval_ms: cli.interval_ms,
        skip_invalid: cli.skip_invalid,
    };
    let mut monitor = Monitor::with_config(Pms7003Sensor::from_serial(serial), Delay, config)?;
    let mut reporter = ConsoleReporter::new(stdout().lock()).clear_screen(!cli.no_clear);

    monitor
        .run(&mut reporter, cli.count)
        .with_context(|| format!("reading from {}", cli.device.display()))?;

    Ok(())
}

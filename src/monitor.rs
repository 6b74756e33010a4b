use core::fmt::Debug;
use std::io;

use embedded_hal::blocking::delay::DelayMs;
use tracing::{debug, info};

use crate::{ByteSource, Error, Pms7003Sensor, Reading};

/// Maximum recommended delay between reads, as per data sheet.
pub const DEFAULT_POLL_INTERVAL_MS: u32 = 700;
/// The sensor reports at least once a second, waiting longer only lets frames pile up.
pub const MAX_POLL_INTERVAL_MS: u32 = 1000;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

///
/// Receives every decoded reading.
///
pub trait Reporter {
    fn report(&mut self, reading: &Reading) -> io::Result<()>;
}

impl<R: Reporter + ?Sized> Reporter for &mut R {
    fn report(&mut self, reading: &Reading) -> io::Result<()> {
        (**self).report(reading)
    }
}

///
/// Prints readings as text, optionally clearing the terminal before each one.
///
pub struct ConsoleReporter<W: io::Write> {
    out: W,
    clear: bool,
}

impl<W: io::Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out, clear: true }
    }

    pub fn clear_screen(mut self, clear: bool) -> Self {
        self.clear = clear;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: io::Write> Reporter for ConsoleReporter<W> {
    fn report(&mut self, reading: &Reading) -> io::Result<()> {
        if self.clear {
            self.out.write_all(CLEAR_SCREEN.as_bytes())?;
        }
        write!(self.out, "{}", reading)?;
        self.out.flush()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MonitorConfig {
    /// Pause after every poll [ms]
    pub poll_interval_ms: u32,
    /// Do not pass readings failing the checksum to the reporter
    pub skip_invalid: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            skip_invalid: false,
        }
    }
}

impl MonitorConfig {
    pub fn validate<E: Debug>(&self) -> Result<(), Error<E>> {
        if self.poll_interval_ms == 0 || self.poll_interval_ms > MAX_POLL_INTERVAL_MS {
            return Err(Error::InvalidInterval(self.poll_interval_ms));
        }
        Ok(())
    }
}

///
/// Polling loop: wait for a frame, decode it, hand it to a [`Reporter`], pause.
///
/// Frames are always read whole, so the loop can be stopped between any two polls.
///
pub struct Monitor<Source, Delay>
where
    Source: ByteSource,
    Delay: DelayMs<u32>,
{
    sensor: Pms7003Sensor<Source>,
    delay: Delay,
    config: MonitorConfig,
}

impl<Source, Delay> Monitor<Source, Delay>
where
    Source: ByteSource,
    Delay: DelayMs<u32>,
{
    pub fn new(sensor: Pms7003Sensor<Source>, delay: Delay) -> Self {
        Self {
            sensor,
            delay,
            config: MonitorConfig::default(),
        }
    }

    pub fn with_config(
        sensor: Pms7003Sensor<Source>,
        delay: Delay,
        config: MonitorConfig,
    ) -> Result<Self, Error<Source::Error>> {
        config.validate()?;
        Ok(Self {
            sensor,
            delay,
            config,
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn sensor(&self) -> &Pms7003Sensor<Source> {
        &self.sensor
    }

    ///
    /// Runs a single iteration of the loop. Returns `true` if a reading was reported.
    ///
    pub fn poll<R: Reporter>(&mut self, reporter: &mut R) -> Result<bool, Error<Source::Error>> {
        let reported = match self.sensor.read() {
            Ok(reading) if self.config.skip_invalid && !reading.checksum_ok() => {
                debug!("dropping reading with invalid checksum");
                false
            }
            Ok(reading) => {
                reporter.report(&reading).map_err(Error::Report)?;
                true
            }
            Err(nb::Error::WouldBlock) => false,
            Err(nb::Error::Other(e)) => return Err(e),
        };

        self.delay.delay_ms(self.config.poll_interval_ms);
        Ok(reported)
    }

    ///
    /// Polls until `limit` readings have been reported, forever if there is no limit.
    ///
    /// Returns the number of readings reported. Transport and reporter errors end the run.
    ///
    pub fn run<R: Reporter>(
        &mut self,
        reporter: &mut R,
        limit: Option<usize>,
    ) -> Result<usize, Error<Source::Error>> {
        info!(interval_ms = self.config.poll_interval_ms, ?limit, "monitoring sensor");

        let mut reported = 0usize;
        while limit.map_or(true, |limit| reported < limit) {
            if self.poll(reporter)? {
                reported += 1;
            }
        }

        info!(reported, discarded = self.sensor.discarded(), "monitoring finished");
        Ok(reported)
    }

    pub fn release(self) -> (Pms7003Sensor<Source>, Delay) {
        (self.sensor, self.delay)
    }
}

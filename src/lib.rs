//! Reads measurements streamed by a Plantower PMS 7003 air quality sensor.
//!
//! The sensor continuously sends 32 byte frames: the `0x42 0x4D` marker followed by a
//! 30 byte payload with big endian fields. [`Synchronizer`] finds frames in the byte
//! stream, [`RawFrame::decode`] turns them into [`Reading`]s and [`Monitor`] drives
//! the whole thing from a polling loop.

use embedded_hal::serial::Read;
use tracing::{trace, warn};

mod error;
pub mod frame;
pub mod monitor;
pub mod source;
pub mod sync;

pub use error::Error;
pub use frame::{RawFrame, Reading, FRAME_SIZE, PAYLOAD_SIZE};
pub use monitor::{ConsoleReporter, Monitor, MonitorConfig, Reporter};
pub use source::{ByteSource, SerialSource};
pub use sync::Synchronizer;

pub struct Pms7003Sensor<Source>
where
    Source: ByteSource,
{
    source: Source,
    synchronizer: Synchronizer,
}

impl<Source> Pms7003Sensor<Source>
where
    Source: ByteSource,
{
    ///
    /// Creates a new sensor instance reading from any byte source
    ///
    pub fn new(source: Source) -> Self {
        Self {
            source,
            synchronizer: Synchronizer::new(),
        }
    }

    ///
    /// Reads the next frame. `WouldBlock` until a whole frame is available.
    ///
    pub fn read_frame(&mut self) -> nb::Result<RawFrame, Error<Source::Error>> {
        self.synchronizer.next_frame(&mut self.source)
    }

    ///
    /// Reads and decodes the next frame. `WouldBlock` until a whole frame is available.
    ///
    /// Frames failing the checksum are returned too, check [`Reading::checksum_ok`].
    ///
    pub fn read(&mut self) -> nb::Result<Reading, Error<Source::Error>> {
        let reading = self.read_frame()?.decode();

        if reading.checksum_ok() {
            trace!(?reading, "frame decoded");
        } else {
            warn!(
                computed = reading.checksum_computed,
                declared = reading.checksum_declared,
                "checksum mismatch"
            );
        }

        Ok(reading)
    }

    /// Bytes skipped so far while looking for frame boundaries.
    pub fn discarded(&self) -> u64 {
        self.synchronizer.discarded()
    }

    pub fn release(self) -> Source {
        self.source
    }
}

impl<Serial> Pms7003Sensor<SerialSource<Serial>>
where
    Serial: Read<u8>,
    Serial::Error: core::fmt::Debug,
{
    ///
    /// Creates a new sensor instance using an object implementing embedded hal serial read
    ///
    pub fn from_serial(serial: Serial) -> Self {
        Self::new(SerialSource::new(serial))
    }
}

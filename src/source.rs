use core::fmt::Debug;
use std::collections::VecDeque;

use embedded_hal::serial::Read;
use nb::block;

/// Bytes kept ahead of the reader, enough for four frames.
pub const SERIAL_QUEUE_SIZE: usize = 128;

///
/// A stream of bytes coming from the sensor.
///
pub trait ByteSource {
    type Error: Debug;

    /// Number of bytes that can be read right now without blocking.
    fn bytes_available(&mut self) -> Result<usize, Self::Error>;

    /// Fills `buf` completely, blocking until enough bytes arrive.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), Self::Error>;
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    type Error = S::Error;

    fn bytes_available(&mut self) -> Result<usize, Self::Error> {
        (**self).bytes_available()
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        (**self).read_exact(buf)
    }
}

///
/// Turns an embedded hal serial reader into a [`ByteSource`].
///
/// Embedded hal serial traits have no notion of "bytes waiting", so bytes that
/// can be read without blocking are moved into a bounded queue and counted there.
///
pub struct SerialSource<Serial>
where
    Serial: Read<u8>,
{
    serial: Serial,
    queue: VecDeque<u8>,
}

impl<Serial> SerialSource<Serial>
where
    Serial: Read<u8>,
    Serial::Error: Debug,
{
    pub fn new(serial: Serial) -> Self {
        Self {
            serial,
            queue: VecDeque::with_capacity(SERIAL_QUEUE_SIZE),
        }
    }

    /// Returns the serial reader. Queued bytes are dropped.
    pub fn release(self) -> Serial {
        self.serial
    }

    fn fill_queue(&mut self) -> Result<(), Serial::Error> {
        while self.queue.len() < SERIAL_QUEUE_SIZE {
            match self.serial.read() {
                Ok(byte) => self.queue.push_back(byte),
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(e)) => return Err(e),
            }
        }
        Ok(())
    }
}

impl<Serial> ByteSource for SerialSource<Serial>
where
    Serial: Read<u8>,
    Serial::Error: Debug,
{
    type Error = Serial::Error;

    fn bytes_available(&mut self) -> Result<usize, Self::Error> {
        self.fill_queue()?;
        Ok(self.queue.len())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        for byte in buf.iter_mut() {
            *byte = match self.queue.pop_front() {
                Some(queued) => queued,
                None => block!(self.serial.read())?,
            };
        }
        Ok(())
    }
}

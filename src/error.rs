use core::fmt::Debug;
use std::io;

/// Errors produced while reading and reporting PMS 7003 frames.
///
/// `E` is the error type of the underlying byte source.
#[derive(Debug, thiserror::Error)]
pub enum Error<E = ()>
where
    E: Debug,
{
    /// The byte source could not be read (device gone, I/O fault).
    #[error("transport error: {0:?}")]
    Transport(E),

    /// Not enough bytes to build a frame.
    #[error("short frame: needed {needed} bytes, got {got}")]
    ShortFrame { needed: usize, got: usize },

    /// Poll interval outside of the sensor's reporting period.
    #[error("invalid poll interval: {0} ms (expected 1..=1000)")]
    InvalidInterval(u32),

    /// The reporter failed to render a reading.
    #[error("failed to report reading")]
    Report(#[source] io::Error),
}

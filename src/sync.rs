use tracing::debug;

use crate::frame::{RawFrame, FRAME_SIZE, MARKER, PAYLOAD_SIZE};
use crate::source::ByteSource;
use crate::Error;

#[derive(PartialEq, Debug)]
enum ScanStatus {
    InProgress,
    Found,
}

#[derive(Clone, Copy, PartialEq, Debug)]
enum State {
    WaitingForFirstMagicNumber,
    WaitingForSecondMagicNumber,
    Found,
}

///
/// Sliding search for the two byte frame marker, fed one byte at a time.
///
struct MarkerScan {
    state: State,
}

impl MarkerScan {
    fn new() -> Self {
        Self {
            state: State::WaitingForFirstMagicNumber,
        }
    }

    /// A first marker byte has been consumed and its partner is still expected.
    fn is_pending(&self) -> bool {
        self.state == State::WaitingForSecondMagicNumber
    }

    fn update(&mut self, byte: u8) -> ScanStatus {
        self.state = match self.state {
            State::WaitingForSecondMagicNumber if byte == MARKER[1] => State::Found,
            _ if byte == MARKER[0] => State::WaitingForSecondMagicNumber,
            _ => State::WaitingForFirstMagicNumber,
        };

        match self.state {
            State::Found => ScanStatus::Found,
            _ => ScanStatus::InProgress,
        }
    }
}

///
/// Aligns the sensor byte stream on frame boundaries.
///
/// Holds no stream state between calls, only a count of bytes thrown away while
/// looking for a marker.
///
#[derive(Default, Debug)]
pub struct Synchronizer {
    discarded: u64,
}

impl Synchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes discarded so far because they did not start a frame.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    ///
    /// Reads the next frame from `source`.
    ///
    /// Returns `WouldBlock` without touching the source unless a whole frame
    /// (marker and payload) is available. Once a marker byte has been consumed the
    /// rest of the frame is read with blocking reads.
    ///
    pub fn next_frame<Source>(&mut self, source: &mut Source) -> nb::Result<RawFrame, Error<Source::Error>>
    where
        Source: ByteSource,
    {
        let mut scan = MarkerScan::new();
        let mut skipped = 0u64;
        let mut byte = [0u8; 1];

        loop {
            if !scan.is_pending() && Self::available(source)? < FRAME_SIZE {
                self.discarded += skipped;
                return Err(nb::Error::WouldBlock);
            }

            source
                .read_exact(&mut byte)
                .map_err(|e| nb::Error::Other(Error::Transport(e)))?;

            let was_pending = scan.is_pending();
            if scan.update(byte[0]) == ScanStatus::Found {
                break;
            }
            // first marker byte not followed by its partner
            if was_pending {
                skipped += 1;
            }
            if !scan.is_pending() {
                skipped += 1;
            }
        }

        self.discarded += skipped;
        if skipped > 0 {
            debug!(skipped, total = self.discarded, "resynchronized on frame marker");
        }

        let mut payload = [0u8; PAYLOAD_SIZE];
        source
            .read_exact(&mut payload)
            .map_err(|e| nb::Error::Other(Error::Transport(e)))?;

        Ok(RawFrame::new(payload))
    }

    fn available<Source: ByteSource>(source: &mut Source) -> Result<usize, Error<Source::Error>> {
        source.bytes_available().map_err(Error::Transport)
    }
}

use core::fmt;

use scroll::{ctx, Endian, Pread, BE};

use crate::Error;

/// Start of every frame sent by the sensor.
pub const MARKER: [u8; 2] = [0x42, 0x4D];
/// Whole frame on the wire, marker included.
pub const FRAME_SIZE: usize = MARKER.len() + PAYLOAD_SIZE;
/// Frame contents following the marker.
pub const PAYLOAD_SIZE: usize = 30;
/// Value of the frame length field for the PMS 7003 layout.
pub const NOMINAL_FRAME_LENGTH: u16 = 28;

/// Payload bytes covered by the checksum: everything up to the version byte, inclusive.
const CHECKSUMMED_LEN: usize = 27;
const CHECKSUM_OFFSET: usize = 28;

///
/// The 30 bytes following a frame marker, as captured from the stream.
///
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RawFrame([u8; PAYLOAD_SIZE]);

impl RawFrame {
    pub fn new(bytes: [u8; PAYLOAD_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PAYLOAD_SIZE] {
        &self.0
    }

    ///
    /// Decodes the frame. A checksum mismatch does not fail the decode, see [`Reading::checksum_ok`].
    ///
    pub fn decode(&self) -> Reading {
        // Only fails on short input, and the payload always has PAYLOAD_SIZE bytes.
        self.0
            .pread_with::<Reading>(0, BE)
            .expect("payload holds every reading field")
    }
}

impl<'a> TryFrom<&'a [u8]> for RawFrame {
    type Error = Error;

    fn try_from(bytes: &'a [u8]) -> Result<Self, Self::Error> {
        if bytes.len() < PAYLOAD_SIZE {
            return Err(Error::ShortFrame {
                needed: PAYLOAD_SIZE,
                got: bytes.len(),
            });
        }
        let mut payload = [0u8; PAYLOAD_SIZE];
        payload.copy_from_slice(&bytes[..PAYLOAD_SIZE]);
        Ok(Self(payload))
    }
}

///
/// Sum of the marker bytes and the checksummed part of `payload`.
///
/// `payload` must hold at least the first 27 payload bytes.
///
pub fn checksum(payload: &[u8]) -> u16 {
    let sum: u32 = MARKER
        .iter()
        .chain(payload[..CHECKSUMMED_LEN].iter())
        .map(|b| *b as u32)
        .sum();
    sum as u16
}

///
/// Measurements decoded from a single frame.
///
#[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
pub struct Reading {
    pub frame_length: u16,
    /// PM1.0, CF=1 [μg/m³]
    pub pm1_0_standard: u16,
    /// PM2.5, CF=1 [μg/m³]
    pub pm2_5_standard: u16,
    /// PM10, CF=1 [μg/m³]
    pub pm10_standard: u16,
    /// PM1.0, atmospheric environment [μg/m³]
    pub pm1_0_atmospheric: u16,
    /// PM2.5, atmospheric environment [μg/m³]
    pub pm2_5_atmospheric: u16,
    /// PM10, atmospheric environment [μg/m³]
    pub pm10_atmospheric: u16,
    /// Particles beyond 0.3 μm [per 0.1 l]
    pub count_gt_0_3um: u16,
    /// Particles beyond 0.5 μm [per 0.1 l]
    pub count_gt_0_5um: u16,
    /// Particles beyond 1.0 μm [per 0.1 l]
    pub count_gt_1_0um: u16,
    /// Particles beyond 2.5 μm [per 0.1 l]
    pub count_gt_2_5um: u16,
    /// Particles beyond 5.0 μm [per 0.1 l]
    pub count_gt_5_0um: u16,
    /// Particles beyond 10 μm [per 0.1 l]
    pub count_gt_10_0um: u16,
    pub version: u8,
    pub error_code: u8,
    /// Checksum sent by the sensor
    pub checksum_declared: u16,
    /// Checksum calculated from the received bytes
    pub checksum_computed: u16,
}

impl Reading {
    pub fn checksum_ok(&self) -> bool {
        self.checksum_declared == self.checksum_computed
    }

    /// Whether the frame length field matches the PMS 7003 layout. Informational only.
    pub fn frame_length_matches(&self) -> bool {
        self.frame_length == NOMINAL_FRAME_LENGTH
    }
}

impl<'a> ctx::TryFromCtx<'a, Endian> for Reading {
    type Error = scroll::Error;

    fn try_from_ctx(src: &'a [u8], endian: Endian) -> Result<(Self, usize), Self::Error> {
        let mut reading = Reading::default();
        let mut offset = 0usize;

        reading.frame_length = src.gread_with::<u16>(&mut offset, endian)?;
        reading.pm1_0_standard = src.gread_with::<u16>(&mut offset, endian)?;
        reading.pm2_5_standard = src.gread_with::<u16>(&mut offset, endian)?;
        reading.pm10_standard = src.gread_with::<u16>(&mut offset, endian)?;
        reading.pm1_0_atmospheric = src.gread_with::<u16>(&mut offset, endian)?;
        reading.pm2_5_atmospheric = src.gread_with::<u16>(&mut offset, endian)?;
        reading.pm10_atmospheric = src.gread_with::<u16>(&mut offset, endian)?;
        reading.count_gt_0_3um = src.gread_with::<u16>(&mut offset, endian)?;
        reading.count_gt_0_5um = src.gread_with::<u16>(&mut offset, endian)?;
        reading.count_gt_1_0um = src.gread_with::<u16>(&mut offset, endian)?;
        reading.count_gt_2_5um = src.gread_with::<u16>(&mut offset, endian)?;
        reading.count_gt_5_0um = src.gread_with::<u16>(&mut offset, endian)?;
        reading.count_gt_10_0um = src.gread_with::<u16>(&mut offset, endian)?;
        reading.version = src.gread::<u8>(&mut offset)?;
        reading.error_code = src.gread::<u8>(&mut offset)?;
        debug_assert_eq!(offset, CHECKSUM_OFFSET);
        reading.checksum_declared = src.gread_with::<u16>(&mut offset, endian)?;
        reading.checksum_computed = checksum(src);

        Ok((reading, offset))
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "PMS7003 Sensor Data:")?;
        writeln!(f, "PM1.0 = {} ug/m3", self.pm1_0_standard)?;
        writeln!(f, "PM2.5 = {} ug/m3", self.pm2_5_standard)?;
        writeln!(f, "PM10 = {} ug/m3", self.pm10_standard)?;
        writeln!(f, "PM1 Atmospheric concentration = {} ug/m3", self.pm1_0_atmospheric)?;
        writeln!(f, "PM2.5 Atmospheric concentration = {} ug/m3", self.pm2_5_atmospheric)?;
        writeln!(f, "PM10 Atmospheric concentration = {} ug/m3", self.pm10_atmospheric)?;
        writeln!(f, "Count: 0.3um = {} per 0.1l", self.count_gt_0_3um)?;
        writeln!(f, "Count: 0.5um = {} per 0.1l", self.count_gt_0_5um)?;
        writeln!(f, "Count: 1.0um = {} per 0.1l", self.count_gt_1_0um)?;
        writeln!(f, "Count: 2.5um = {} per 0.1l", self.count_gt_2_5um)?;
        writeln!(f, "Count: 5.0um = {} per 0.1l", self.count_gt_5_0um)?;
        writeln!(f, "Count: 10um = {} per 0.1l", self.count_gt_10_0um)?;
        writeln!(f, "Version = {}", self.version)?;
        writeln!(f, "Error Code = {}", self.error_code)?;
        writeln!(f, "Frame length = {}", self.frame_length)?;
        if !self.checksum_ok() {
            writeln!(f, "Warning! Checksums don't match!")?;
            writeln!(f, "Calculated Checksum = {}", self.checksum_computed)?;
            writeln!(f, "Payload checksum = {}", self.checksum_declared)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scroll::Pwrite;

    // Payload of a frame captured from a sensor, marker stripped.
    const CAPTURED: [u8; PAYLOAD_SIZE] = [
        0x0, 0x1c, 0x0, 0x5, 0x0, 0x7, 0x0, 0x7, 0x0, 0x5, 0x0, 0x7, 0x0, 0x7, 0x0, 0x0, 0x0,
        0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x97, 0x0, 0x1, 0x68,
    ];

    fn with_checksum(mut payload: [u8; PAYLOAD_SIZE]) -> [u8; PAYLOAD_SIZE] {
        let sum = checksum(&payload);
        payload
            .pwrite_with::<u16>(sum, CHECKSUM_OFFSET, BE)
            .unwrap();
        payload
    }

    #[test]
    fn decodes_captured_frame() {
        let reading = RawFrame::new(CAPTURED).decode();

        assert_eq!(28, reading.frame_length);
        assert_eq!(5, reading.pm1_0_standard);
        assert_eq!(7, reading.pm2_5_standard);
        assert_eq!(7, reading.pm10_standard);
        assert_eq!(5, reading.pm1_0_atmospheric);
        assert_eq!(7, reading.pm2_5_atmospheric);
        assert_eq!(7, reading.pm10_atmospheric);
        assert_eq!(0x97, reading.version);
        assert_eq!(0, reading.error_code);
        assert_eq!(0x168, reading.checksum_declared);
        assert_eq!(0x168, reading.checksum_computed);
        assert!(reading.checksum_ok());
        assert!(reading.frame_length_matches());
    }

    #[test]
    fn every_field_is_read_big_endian_at_its_offset() {
        let mut payload = [0u8; PAYLOAD_SIZE];
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte = i as u8 + 1;
        }
        let be = |offset: usize| payload[offset] as u16 * 256 + payload[offset + 1] as u16;

        let reading = RawFrame::new(payload).decode();

        assert_eq!(be(0), reading.frame_length);
        assert_eq!(be(2), reading.pm1_0_standard);
        assert_eq!(be(4), reading.pm2_5_standard);
        assert_eq!(be(6), reading.pm10_standard);
        assert_eq!(be(8), reading.pm1_0_atmospheric);
        assert_eq!(be(10), reading.pm2_5_atmospheric);
        assert_eq!(be(12), reading.pm10_atmospheric);
        assert_eq!(be(14), reading.count_gt_0_3um);
        assert_eq!(be(16), reading.count_gt_0_5um);
        assert_eq!(be(18), reading.count_gt_1_0um);
        assert_eq!(be(20), reading.count_gt_2_5um);
        assert_eq!(be(22), reading.count_gt_5_0um);
        assert_eq!(be(24), reading.count_gt_10_0um);
        assert_eq!(payload[26], reading.version);
        assert_eq!(payload[27], reading.error_code);
        assert_eq!(be(28), reading.checksum_declared);
    }

    #[test]
    fn checksum_covers_marker_and_payload_up_to_version() {
        let mut payload = [0u8; PAYLOAD_SIZE];
        payload[0] = 0x01;
        payload[26] = 0x02;
        // error code and checksum field are not summed
        payload[27] = 0xff;
        payload[28] = 0xff;
        payload[29] = 0xff;

        assert_eq!(0x42 + 0x4d + 0x01 + 0x02, checksum(&payload));
    }

    #[test]
    fn checksum_does_not_overflow_for_saturated_payload() {
        let payload = [0xffu8; PAYLOAD_SIZE];

        assert_eq!(0x8f + 27 * 0xff, checksum(&payload) as u32);
    }

    #[test]
    fn pm_example_with_valid_checksum() {
        let mut payload = [0u8; PAYLOAD_SIZE];
        payload[..8].copy_from_slice(&[0x00, 0x1c, 0x00, 0x05, 0x00, 0x07, 0x00, 0x09]);

        let reading = RawFrame::new(with_checksum(payload)).decode();

        assert_eq!(5, reading.pm1_0_standard);
        assert_eq!(7, reading.pm2_5_standard);
        assert_eq!(9, reading.pm10_standard);
        assert!(reading.checksum_ok());
    }

    #[test]
    fn corrupting_any_checksummed_byte_is_detected() {
        let payload = with_checksum(CAPTURED);

        for i in 0..CHECKSUMMED_LEN {
            let mut corrupted = payload;
            corrupted[i] ^= 0x01;

            let reading = RawFrame::new(corrupted).decode();

            assert!(!reading.checksum_ok(), "flipped byte {} went unnoticed", i);
        }
    }

    #[test]
    fn mismatch_still_produces_reading() {
        let mut payload = CAPTURED;
        payload[5] = 0x08;

        let reading = RawFrame::new(payload).decode();

        assert_eq!(8, reading.pm2_5_standard);
        assert_eq!(0x168, reading.checksum_declared);
        assert_eq!(0x169, reading.checksum_computed);
        assert!(!reading.checksum_ok());
    }

    #[test]
    fn unexpected_frame_length_is_only_reported() {
        let mut payload = CAPTURED;
        payload[1] = 0x14;

        let reading = RawFrame::new(with_checksum(payload)).decode();

        assert_eq!(20, reading.frame_length);
        assert!(!reading.frame_length_matches());
        assert!(reading.checksum_ok());
    }

    #[test]
    fn decoding_is_idempotent() {
        let frame = RawFrame::new(CAPTURED);

        assert_eq!(frame.decode(), frame.decode());
        assert_eq!(CAPTURED, *frame.as_bytes());
    }

    #[test]
    fn raw_frame_from_slice() {
        let frame = RawFrame::try_from(&CAPTURED[..]).unwrap();
        assert_eq!(CAPTURED, *frame.as_bytes());

        match RawFrame::try_from(&CAPTURED[..12]) {
            Err(Error::ShortFrame { needed, got }) => {
                assert_eq!(PAYLOAD_SIZE, needed);
                assert_eq!(12, got);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn reading_parses_from_any_slice_with_scroll() {
        let mut bytes = vec![0xaa, 0xbb];
        bytes.extend_from_slice(&CAPTURED);

        let reading: Reading = bytes.pread_with(2, BE).unwrap();
        assert_eq!(RawFrame::new(CAPTURED).decode(), reading);

        assert!(CAPTURED[..20].pread_with::<Reading>(0, BE).is_err());
    }

    #[test]
    fn display_warns_about_checksum_mismatch() {
        let valid = RawFrame::new(CAPTURED).decode().to_string();
        assert!(valid.contains("PM2.5 = 7 ug/m3"));
        assert!(valid.contains("Frame length = 28"));
        assert!(!valid.contains("Warning"));

        let mut payload = CAPTURED;
        payload[3] = 0x06;
        let invalid = RawFrame::new(payload).decode().to_string();
        assert!(invalid.contains("Warning! Checksums don't match!"));
        assert!(invalid.contains("Calculated Checksum = 361"));
        assert!(invalid.contains("Payload checksum = 360"));
    }
}

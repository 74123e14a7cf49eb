//! Sample chunk wire format.
//!
//! ```text
//! offset  size  field
//! 0       2     descriptor_length   u16 BE
//! 2       2     version             u16 BE
//! 4       8     seconds             u64 BE
//! 12      8     nanoseconds         u64 BE
//! 20      8     samples_from_start  u64 BE
//! 28      2     element_size        u16 BE
//! 30      2     columns             u16 BE
//! 32      ..    sample data, row-major, `columns` elements per row
//! ```

pub mod error;

use std::fmt;

use jiff::Timestamp;
use serde::{Serialize, Serializer};

pub use error::DecodeError;

pub const HEADER_SIZE: usize = 2 + 2 + 8 + 8 + 8 + 2 + 2;

const NANOS_PER_SEC: i128 = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleChunkHeader {
    pub descriptor_length: u16,
    pub version: u16,
    pub seconds: u64,
    pub nanoseconds: u64,
    pub samples_from_start: u64,
    /// bytes per sample
    pub element_size: u16,
    pub columns: u16,
}

/// A decoded data message, borrowing the sample bytes from the payload
#[derive(Debug, Clone, PartialEq)]
pub struct SampleChunk<'a> {
    pub header: SampleChunkHeader,
    pub timestamp: Timestamp,
    pub shape: Shape,
    pub element_type: ElementType,
    pub data: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub rows: usize,
    pub columns: usize,
}

/// `float<bits>` tag derived from the element size. Widths are not validated,
/// a 3 byte element yields `float24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementType {
    pub bits: u32,
}

/// Splits `payload` into header and sample data and derives timestamp, shape and element type
pub fn decode(payload: &[u8]) -> Result<SampleChunk<'_>, DecodeError> {
    let header = SampleChunkHeader::parse(payload)?;
    let data = &payload[HEADER_SIZE..];

    Ok(SampleChunk {
        timestamp: header.timestamp()?,
        shape: header.shape(data.len())?,
        element_type: header.element_type(),
        header,
        data,
    })
}

impl SampleChunkHeader {
    pub fn parse(payload: &[u8]) -> Result<Self, DecodeError> {
        let Some(buf) = payload.first_chunk::<HEADER_SIZE>() else {
            return Err(DecodeError::TruncatedHeader(payload.len()));
        };

        Ok(Self {
            descriptor_length: u16::from_be_bytes([buf[0], buf[1]]),
            version: u16::from_be_bytes([buf[2], buf[3]]),
            seconds: read_u64(buf, 4),
            nanoseconds: read_u64(buf, 12),
            samples_from_start: read_u64(buf, 20),
            element_size: u16::from_be_bytes([buf[28], buf[29]]),
            columns: u16::from_be_bytes([buf[30], buf[31]]),
        })
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..2].copy_from_slice(&self.descriptor_length.to_be_bytes());
        buf[2..4].copy_from_slice(&self.version.to_be_bytes());
        buf[4..12].copy_from_slice(&self.seconds.to_be_bytes());
        buf[12..20].copy_from_slice(&self.nanoseconds.to_be_bytes());
        buf[20..28].copy_from_slice(&self.samples_from_start.to_be_bytes());
        buf[28..30].copy_from_slice(&self.element_size.to_be_bytes());
        buf[30..32].copy_from_slice(&self.columns.to_be_bytes());
        buf
    }

    /// UTC instant of the first sample. Accumulated in whole nanoseconds,
    /// so `nanoseconds` past one second carries into the seconds.
    pub fn timestamp(&self) -> Result<Timestamp, DecodeError> {
        let total = self.seconds as i128 * NANOS_PER_SEC + self.nanoseconds as i128;
        Timestamp::from_nanosecond(total).map_err(|_| DecodeError::TimestampOutOfRange {
            seconds: self.seconds,
            nanoseconds: self.nanoseconds,
        })
    }

    /// Number of complete rows in `data_len` bytes. Trailing bytes that do
    /// not fill a row are ignored.
    pub fn shape(&self, data_len: usize) -> Result<Shape, DecodeError> {
        if self.columns == 0 {
            return Err(DecodeError::ZeroColumns);
        }
        if self.element_size == 0 {
            return Err(DecodeError::ZeroElementSize);
        }

        let columns = self.columns as usize;
        Ok(Shape {
            rows: data_len / self.element_size as usize / columns,
            columns,
        })
    }

    pub fn element_type(&self) -> ElementType {
        ElementType {
            bits: 8 * self.element_size as u32,
        }
    }
}

fn read_u64(buf: &[u8; HEADER_SIZE], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_be_bytes(bytes)
}

impl ElementType {
    pub fn is_standard_float(&self) -> bool {
        matches!(self.bits, 16 | 32 | 64)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "float{}", self.bits)
    }
}

impl Serialize for ElementType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
pub(crate) fn test_payload(header: &SampleChunkHeader, data_len: usize) -> Vec<u8> {
    let mut payload = header.encode().to_vec();
    payload.extend((0..data_len).map(|i| i as u8));
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(element_size: u16, columns: u16) -> SampleChunkHeader {
        SampleChunkHeader {
            descriptor_length: 30,
            version: 1,
            seconds: 1_700_000_000,
            nanoseconds: 250_000_000,
            samples_from_start: 4096,
            element_size,
            columns,
        }
    }

    #[test]
    fn header_size_matches_layout() {
        assert_eq!(HEADER_SIZE, 32);
    }

    #[test]
    fn header_round_trip() {
        let headers = [
            SampleChunkHeader {
                descriptor_length: 0xBEEF,
                version: 7,
                seconds: u64::MAX - 1,
                nanoseconds: 999_999_999,
                samples_from_start: 0x0102_0304_0506_0708,
                element_size: 8,
                columns: 0x1234,
            },
            SampleChunkHeader {
                descriptor_length: 0,
                version: 0,
                seconds: 0,
                nanoseconds: 0,
                samples_from_start: 0,
                element_size: 0,
                columns: 0,
            },
            SampleChunkHeader {
                descriptor_length: u16::MAX,
                version: u16::MAX,
                seconds: u64::MAX,
                nanoseconds: u64::MAX,
                samples_from_start: u64::MAX,
                element_size: u16::MAX,
                columns: u16::MAX,
            },
            header(2, 1),
        ];

        for original in headers {
            let bytes = original.encode();
            let parsed = SampleChunkHeader::parse(&bytes).unwrap();
            assert_eq!(parsed, original);
            assert_eq!(parsed.encode(), bytes);
        }
    }

    #[test]
    fn fields_are_big_endian() {
        let bytes = header(4, 3).encode();
        assert_eq!(&bytes[0..2], &[0, 30]);
        assert_eq!(&bytes[2..4], &[0, 1]);
        assert_eq!(&bytes[28..30], &[0, 4]);
        assert_eq!(&bytes[30..32], &[0, 3]);
        assert_eq!(&bytes[20..28], &4096u64.to_be_bytes());
    }

    #[test]
    fn truncated_payloads_fail() {
        let full = header(4, 4).encode();
        for len in 0..HEADER_SIZE {
            assert_eq!(
                decode(&full[..len]),
                Err(DecodeError::TruncatedHeader(len))
            );
        }
    }

    #[test]
    fn header_only_payload_has_zero_rows() {
        let payload = header(4, 4).encode();
        let chunk = decode(&payload).unwrap();
        assert_eq!(chunk.shape, Shape { rows: 0, columns: 4 });
        assert!(chunk.data.is_empty());
    }

    #[test]
    fn rows_from_exact_payload() {
        let payload = test_payload(&header(4, 4), 64);
        let chunk = decode(&payload).unwrap();
        assert_eq!(chunk.shape, Shape { rows: 4, columns: 4 });
        assert_eq!(chunk.data.len(), 64);
        assert_eq!(chunk.data[0], 0);
        assert_eq!(chunk.data[63], 63);
    }

    #[test]
    fn trailing_bytes_are_discarded_from_rows() {
        let payload = test_payload(&header(4, 4), 65);
        let chunk = decode(&payload).unwrap();
        assert_eq!(chunk.shape.rows, 4);
        assert_eq!(chunk.data.len(), 65);
    }

    #[test]
    fn zero_columns_and_element_size() {
        assert_eq!(
            decode(&test_payload(&header(4, 0), 16)),
            Err(DecodeError::ZeroColumns)
        );
        assert_eq!(
            decode(&test_payload(&header(0, 4), 16)),
            Err(DecodeError::ZeroElementSize)
        );
    }

    #[test]
    fn element_type_naming() {
        assert_eq!(header(4, 1).element_type().to_string(), "float32");
        assert_eq!(header(8, 1).element_type().to_string(), "float64");

        let odd = header(3, 1).element_type();
        assert_eq!(odd.to_string(), "float24");
        assert!(!odd.is_standard_float());
        assert!(header(2, 1).element_type().is_standard_float());
    }

    #[test]
    fn timestamp_keeps_subsecond_precision() {
        let ts = header(4, 1).timestamp().unwrap();
        assert_eq!(ts.as_second(), 1_700_000_000);
        assert_eq!(ts.subsec_nanosecond(), 250_000_000);
        assert_eq!(ts, "2023-11-14T22:13:20.25Z".parse::<Timestamp>().unwrap());
    }

    #[test]
    fn nanoseconds_past_one_second_carry() {
        let mut h = header(4, 1);
        h.seconds = 10;
        h.nanoseconds = 2_500_000_000;
        let ts = h.timestamp().unwrap();
        assert_eq!(ts.as_second(), 12);
        assert_eq!(ts.subsec_nanosecond(), 500_000_000);
    }

    #[test]
    fn timestamp_out_of_range() {
        let mut h = header(4, 1);
        h.seconds = u64::MAX;
        assert!(matches!(
            decode(&test_payload(&h, 4)),
            Err(DecodeError::TimestampOutOfRange { .. })
        ));
    }
}

use thiserror::Error;

use super::HEADER_SIZE;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("payload is {0} bytes, sample chunk header needs {HEADER_SIZE}")]
    TruncatedHeader(usize),
    #[error("sample chunk header declares zero columns")]
    ZeroColumns,
    #[error("sample chunk header declares zero-byte elements")]
    ZeroElementSize,
    #[error("timestamp {seconds}s + {nanoseconds}ns is outside the representable range")]
    TimestampOutOfRange { seconds: u64, nanoseconds: u64 },
}

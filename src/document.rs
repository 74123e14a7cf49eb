use jiff::Timestamp;
use serde::Serialize;

use crate::chunk::{ElementType, SampleChunk};

/// One stored data message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleDocument {
    pub timestamp: Timestamp,
    pub sampling_rate: f64,
    /// (rows, columns)
    pub data_shape: (usize, usize),
    pub data_dtype: ElementType,
    /// raw sample bytes, not decoded
    pub data: Vec<u8>,
}

impl SampleDocument {
    pub fn assemble(chunk: &SampleChunk<'_>, sampling_rate: f64) -> Self {
        Self {
            timestamp: chunk.timestamp,
            sampling_rate,
            data_shape: (chunk.shape.rows, chunk.shape.columns),
            data_dtype: chunk.element_type,
            data: chunk.data.to_vec(),
        }
    }
}

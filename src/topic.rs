use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_DEVICE_SEGMENT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Metadata,
    Data,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TopicError {
    #[error("topic `{topic}` has no device segment at index {segment}")]
    MalformedTopic { topic: String, segment: usize },
    #[error("unknown last topic component `{0}`")]
    UnknownMessageKind(String),
    #[error("invalid metadata payload: {0}")]
    InvalidMetadata(String),
}

/// Splits a topic into (device_id, kind)
///  base/site/DEV1/metadata -> ("DEV1", Metadata)
///  base/site/DEV1/data -> ("DEV1", Data)
pub fn classify(topic: &str, device_segment: usize) -> Result<(&str, MessageKind), TopicError> {
    let parts: Vec<&str> = topic.split('/').collect();

    let device_id = match parts.get(device_segment) {
        Some(id) if !id.is_empty() => *id,
        _ => {
            return Err(TopicError::MalformedTopic {
                topic: topic.to_string(),
                segment: device_segment,
            })
        }
    };

    // split always yields at least one part
    let kind = match parts[parts.len() - 1] {
        "data" => MessageKind::Data,
        "metadata" => MessageKind::Metadata,
        other => return Err(TopicError::UnknownMessageKind(other.to_string())),
    };

    Ok((device_id, kind))
}

/// Metadata message body, only the sampling rate is read
#[derive(Debug, Deserialize)]
pub struct Metadata {
    #[serde(rename = "DataChunk")]
    pub data_chunk: DataChunkMetadata,
}

#[derive(Debug, Deserialize)]
pub struct DataChunkMetadata {
    /// sampling rate in Hz
    #[serde(rename = "Fs")]
    pub fs: f64,
}

impl Metadata {
    pub fn parse(payload: &[u8]) -> Result<Self, TopicError> {
        serde_json::from_slice(payload).map_err(|e| TopicError::InvalidMetadata(e.to_string()))
    }

    pub fn sampling_rate(&self) -> f64 {
        self.data_chunk.fs
    }
}

use thiserror::Error;

use crate::{chunk::DecodeError, store::StoreError, topic::TopicError};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("{0}")]
    Topic(#[from] TopicError),
    #[error("{0}")]
    Decode(#[from] DecodeError),
    #[error("storage: {0}")]
    Storage(#[from] StoreError),
}

impl IngestError {
    /// Only storage failures stop the loop, bad messages are dropped
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

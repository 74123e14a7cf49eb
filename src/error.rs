use thiserror::Error;

use crate::{config::ConfigError, ingest::IngestError, store::StoreError};

/// Anything that ends the process with a non-zero status
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("ingest: {0}")]
    Ingest(#[from] IngestError),
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite error `{0}`")]
    Sqlite(tokio_rusqlite::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<tokio_rusqlite::Error> for StoreError {
    fn from(value: tokio_rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

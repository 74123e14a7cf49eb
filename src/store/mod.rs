pub mod error;
pub mod memory;
pub mod sqlite;

use std::future::Future;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::document::SampleDocument;

/// Collection-oriented document sink
pub trait DocumentStore {
    /// Connectivity check, run once before ingesting
    fn ping(&self) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn list_collections(&self) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;

    /// No-op when the collection already exists. The call count is still
    /// kept low by [`crate::collection::CollectionManager`].
    fn create_collection(&self, name: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn insert(
        &self,
        collection: &str,
        doc: &SampleDocument,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

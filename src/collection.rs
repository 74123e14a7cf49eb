use std::collections::HashSet;

use tracing::info;

use crate::store::{DocumentStore, StoreError};

/// Device id -> collection, creating collections on first use.
/// Known names are cached so the store is only asked on a cache miss.
#[derive(Debug, Default)]
pub struct CollectionManager {
    known: HashSet<String>,
}

impl CollectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collections are named by device id exactly
    pub fn collection_for(device_id: &str) -> &str {
        device_id
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.known.contains(name)
    }

    pub async fn ensure<S: DocumentStore>(
        &mut self,
        store: &S,
        name: &str,
    ) -> Result<(), StoreError> {
        if self.known.contains(name) {
            return Ok(());
        }

        // collections made by someone else (or a previous run) are picked up here
        self.known.extend(store.list_collections().await?);
        if self.known.contains(name) {
            return Ok(());
        }

        store.create_collection(name).await?;
        info!(collection = name, "collection created");
        self.known.insert(name.to_string());
        Ok(())
    }
}

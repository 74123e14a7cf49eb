use std::collections::BTreeMap;

use tokio::sync::Mutex;

use super::{DocumentStore, StoreError};
use crate::document::SampleDocument;

/// Store kept entirely in memory, with call counters and injectable failures
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    /// collection -> documents, in insertion order
    collections: BTreeMap<String, Vec<SampleDocument>>,
    list_calls: usize,
    create_calls: usize,
    /// number of upcoming calls that fail with [`StoreError::Unavailable`]
    failures: usize,
}

impl Inner {
    fn check_available(&mut self) -> Result<(), StoreError> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` store calls fail
    pub async fn fail_next(&self, n: usize) {
        self.inner.lock().await.failures = n;
    }

    pub async fn documents(&self, collection: &str) -> Vec<SampleDocument> {
        let inner = self.inner.lock().await;
        inner.collections.get(collection).cloned().unwrap_or_default()
    }

    pub async fn document_count(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.collections.values().map(Vec::len).sum()
    }

    pub async fn list_calls(&self) -> usize {
        self.inner.lock().await.list_calls
    }

    pub async fn create_calls(&self) -> usize {
        self.inner.lock().await.create_calls
    }
}

impl DocumentStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.lock().await.check_available()
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.list_calls += 1;
        inner.check_available()?;
        Ok(inner.collections.keys().cloned().collect())
    }

    async fn create_collection(&self, name: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.create_calls += 1;
        inner.check_available()?;
        inner.collections.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn insert(&self, collection: &str, doc: &SampleDocument) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.check_available()?;
        match inner.collections.get_mut(collection) {
            Some(docs) => {
                docs.push(doc.clone());
                Ok(())
            }
            None => Err(StoreError::Unavailable(format!(
                "collection `{collection}` does not exist"
            ))),
        }
    }
}

pub mod error;

use std::{future::Future, time::Duration};

use jiff::Timestamp;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};

pub use error::IngestError;

use crate::{
    chunk,
    collection::CollectionManager,
    config::IngestConfig,
    document::SampleDocument,
    session::SessionState,
    store::{DocumentStore, StoreError},
    topic::{self, MessageKind, Metadata},
    transport::{InboundMessage, MessageRx},
};

/// What happened to one message
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Inserted {
        collection: String,
        rows: usize,
        timestamp: Timestamp,
    },
    MetadataStored { device: String, sampling_rate: f64 },
    /// sampling rate already known and kept
    MetadataIgnored,
    /// data before any metadata, dropped without error
    AwaitingMetadata,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    pub received: u64,
    pub inserted: u64,
    pub dropped: u64,
}

/// Single consumer of the inbound queue. Messages are fully handled, one at
/// a time and in arrival order, before the next is taken.
pub struct IngestLoop<S> {
    store: S,
    session: SessionState,
    collections: CollectionManager,
    device_segment: usize,
    storage_retries: u32,
    storage_retry_delay: Duration,
    stats: IngestStats,
}

impl<S: DocumentStore> IngestLoop<S> {
    pub fn new(store: S, cfg: &IngestConfig) -> Self {
        Self {
            store,
            session: SessionState::new(cfg.correlation, cfg.refresh_policy),
            collections: CollectionManager::new(),
            device_segment: cfg.device_segment,
            storage_retries: cfg.storage_retries,
            storage_retry_delay: cfg.storage_retry_delay(),
            stats: IngestStats::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    /// Processes the queue until it closes or `shutdown` resolves.
    ///
    /// On shutdown `stop_source` is awaited first, it must stop whatever feeds
    /// the queue. Messages already queued are then drained until `grace` runs
    /// out. A message being handled is never interrupted.
    pub async fn run(
        &mut self,
        rx: &mut MessageRx,
        shutdown: impl Future<Output = ()>,
        stop_source: impl Future<Output = ()>,
        grace: Duration,
    ) -> Result<(), IngestError> {
        info!("running");
        tokio::pin!(shutdown);

        loop {
            let msg = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                msg = rx.recv() => msg,
            };
            let Some(msg) = msg else {
                info!("queue closed");
                self.log_stats();
                return Ok(());
            };
            self.process(msg).await?;
        }

        info!("shutting down");
        stop_source.await;

        let deadline = Instant::now() + grace;
        loop {
            // `timeout_at` alone keeps yielding messages that are already queued
            if Instant::now() >= deadline {
                self.drop_queued(rx);
                break;
            }
            match timeout_at(deadline, rx.recv()).await {
                Ok(Some(msg)) => self.process(msg).await?,
                Ok(None) => break,
                Err(_) => {
                    self.drop_queued(rx);
                    break;
                }
            }
        }

        self.log_stats();
        Ok(())
    }

    async fn process(&mut self, msg: InboundMessage) -> Result<(), IngestError> {
        self.stats.received += 1;
        match self.handle(&msg).await {
            Ok(Outcome::Inserted {
                collection,
                rows,
                timestamp,
            }) => {
                self.stats.inserted += 1;
                info!(collection, rows, %timestamp, "document inserted");
            }
            Ok(Outcome::MetadataStored {
                device,
                sampling_rate,
            }) => info!(device, sampling_rate, "metadata read"),
            Ok(Outcome::MetadataIgnored) => {}
            Ok(Outcome::AwaitingMetadata) => self.stats.dropped += 1,
            Err(e) if e.is_fatal() => {
                error!(topic = msg.topic, "{e}");
                return Err(e);
            }
            Err(e) => {
                warn!(topic = msg.topic, "skipping message: {e}");
                self.stats.dropped += 1;
            }
        }
        Ok(())
    }

    /// Classify -> (metadata: update session | data: decode, assemble, insert)
    pub async fn handle(&mut self, msg: &InboundMessage) -> Result<Outcome, IngestError> {
        let (device_id, kind) = topic::classify(&msg.topic, self.device_segment)?;
        let collection = CollectionManager::collection_for(device_id);

        // every device that speaks gets its collection, metadata included
        self.ensure_collection(collection).await?;

        match kind {
            MessageKind::Metadata => {
                if !self.session.wants_metadata(device_id) {
                    debug!(device = device_id, "sampling rate already known, metadata ignored");
                    return Ok(Outcome::MetadataIgnored);
                }

                let sampling_rate = Metadata::parse(&msg.payload)?.sampling_rate();
                self.session.observe_metadata(device_id, sampling_rate);
                Ok(Outcome::MetadataStored {
                    device: device_id.to_string(),
                    sampling_rate,
                })
            }
            MessageKind::Data => {
                let Some(sampling_rate) = self.session.sampling_rate_for(device_id) else {
                    debug!(device = device_id, "no metadata yet, data dropped");
                    return Ok(Outcome::AwaitingMetadata);
                };

                let chunk = chunk::decode(&msg.payload)?;
                if !chunk.element_type.is_standard_float() {
                    warn!(
                        device = device_id,
                        element_size = chunk.header.element_size,
                        "storing samples with non-standard float width {}",
                        chunk.element_type
                    );
                }

                let doc = SampleDocument::assemble(&chunk, sampling_rate);
                self.insert(collection, &doc).await?;
                Ok(Outcome::Inserted {
                    collection: collection.to_string(),
                    rows: chunk.shape.rows,
                    timestamp: doc.timestamp,
                })
            }
        }
    }

    async fn ensure_collection(&mut self, name: &str) -> Result<(), StoreError> {
        let mut attempt = 0;
        loop {
            match self.collections.ensure(&self.store, name).await {
                Ok(()) => return Ok(()),
                Err(e) => self.backoff(&mut attempt, e).await?,
            }
        }
    }

    async fn insert(&self, collection: &str, doc: &SampleDocument) -> Result<(), StoreError> {
        let mut attempt = 0;
        loop {
            match self.store.insert(collection, doc).await {
                Ok(()) => return Ok(()),
                Err(e) => self.backoff(&mut attempt, e).await?,
            }
        }
    }

    /// Waits before the next attempt, doubling each time. Gives `err` back
    /// once retries are used up.
    async fn backoff(&self, attempt: &mut u32, err: StoreError) -> Result<(), StoreError> {
        if *attempt >= self.storage_retries {
            return Err(err);
        }
        let delay = self
            .storage_retry_delay
            .saturating_mul(2u32.saturating_pow(*attempt));
        *attempt += 1;
        warn!(
            attempt = *attempt,
            max = self.storage_retries,
            "storage error: {err}, retrying in {delay:?}"
        );
        tokio::time::sleep(delay).await;
        Ok(())
    }

    fn drop_queued(&mut self, rx: &MessageRx) {
        let left = rx.len();
        if left > 0 {
            warn!(
                dropped = left,
                "shutdown grace period elapsed, dropping queued messages"
            );
        }
        self.stats.dropped += left as u64;
    }

    fn log_stats(&self) {
        info!(
            received = self.stats.received,
            inserted = self.stats.inserted,
            dropped = self.stats.dropped,
            "ingest stopped"
        );
    }
}

pub mod mqtt;

use tokio::sync::mpsc;

pub use mqtt::MqttTransport;

/// A publish as received from the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

pub type MessageTx = mpsc::UnboundedSender<InboundMessage>;
pub type MessageRx = mpsc::UnboundedReceiver<InboundMessage>;

/// Unbounded so the receive task never waits on the ingest loop
pub fn queue() -> (MessageTx, MessageRx) {
    mpsc::unbounded_channel()
}

use std::time::Duration;

use rumqttc::{
    AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS, SubscribeReasonCode,
};
use tokio::{sync::oneshot, task::JoinHandle};
use tracing::{debug, error, info, span, warn, Instrument, Level};
use uuid::Uuid;

use super::{InboundMessage, MessageTx};
use crate::config::{ConfigError, MqttConfig};

const REQUEST_CAPACITY: usize = 10;
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Receive side of the broker connection. Every publish on the subscribed
/// topic is pushed onto the ingest queue.
pub struct MqttTransport {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

struct Subscription {
    topic: String,
    qos: QoS,
}

pub fn qos_for_level(level: u8) -> Option<QoS> {
    match level {
        0 => Some(QoS::AtMostOnce),
        1 => Some(QoS::AtLeastOnce),
        2 => Some(QoS::ExactlyOnce),
        _ => None,
    }
}

impl MqttTransport {
    pub fn spawn(cfg: &MqttConfig, tx: MessageTx) -> Result<Self, ConfigError> {
        let sub = Subscription {
            topic: cfg.topic()?.to_string(),
            qos: cfg.qos()?,
        };

        let client_id = cfg
            .client_id
            .clone()
            .unwrap_or_else(|| format!("daq-ingest_{}", Uuid::now_v7()));
        let mut options = MqttOptions::new(client_id, cfg.host.clone(), cfg.port);
        if !cfg.username.is_empty() {
            options.set_credentials(cfg.username.clone(), cfg.password.clone());
        }
        options.set_keep_alive(cfg.keep_alive());
        options.set_max_packet_size(cfg.max_packet_size, cfg.max_packet_size);

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let span = span!(Level::INFO, "MQTT", host = cfg.host, port = cfg.port);
        let task = tokio::spawn(
            receive_task(client, eventloop, sub, cfg.reconnect_delay(), tx, shutdown_rx)
                .instrument(span),
        );

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    /// Disconnects and waits for the receive task. Nothing is enqueued
    /// after this returns. Calling it again is a no-op.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("receive task: {e}");
            }
        }
    }
}

async fn receive_task(
    client: AsyncClient,
    mut eventloop: EventLoop,
    sub: Subscription,
    reconnect_delay: Duration,
    tx: MessageTx,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    debug!("connecting");

    loop {
        let notif = tokio::select! {
            _ = &mut shutdown_rx => break,
            notif = eventloop.poll() => notif,
        };

        match notif {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let msg = InboundMessage::new(publish.topic, publish.payload.to_vec());
                if tx.send(msg).is_err() {
                    info!("ingest queue closed");
                    break;
                }
            }
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                // sessions are clean, so subscribe on every (re)connect
                info!("connected, subscribing to `{}`", sub.topic);
                if let Err(e) = client.try_subscribe(&sub.topic, sub.qos) {
                    error!("subscribing: {e}");
                }
            }
            Ok(Event::Incoming(Packet::SubAck(ack))) => {
                if ack
                    .return_codes
                    .iter()
                    .any(|code| matches!(code, SubscribeReasonCode::Failure))
                {
                    error!("broker rejected subscription to `{}`", sub.topic);
                } else {
                    info!("subscribed to `{}`", sub.topic);
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!("connection error: {e}, retrying in {reconnect_delay:?}");
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = tokio::time::sleep(reconnect_delay) => {}
                }
            }
        }
    }

    // tx drops here, so the ingest loop sees the end of the queue once drained
    drop(tx);

    if client.try_disconnect().is_ok() {
        let flush = async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        };
        if tokio::time::timeout(DISCONNECT_TIMEOUT, flush).await.is_err() {
            warn!("broker did not take the disconnect in time");
        }
    }
    info!("disconnected");
}

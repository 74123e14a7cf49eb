use std::{path::{Path, PathBuf}, time::Duration};

use config::{builder::DefaultState, Config, ConfigBuilder, Environment, File, FileFormat};
use rumqttc::QoS;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    session::{Correlation, RefreshPolicy},
    topic::DEFAULT_DEVICE_SEGMENT,
    transport::mqtt::qos_for_level,
};

pub const ENV_PREFIX: &str = "DAQ_INGEST";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("loading config: {0}")]
    Load(#[from] config::ConfigError),
    #[error("multiple topics are not supported, got {0}")]
    MultipleTopics(usize),
    #[error("no topic to subscribe to")]
    NoTopics,
    #[error("QoS must be 0, 1 or 2, got {0}")]
    InvalidQos(u8),
}

/// Private (credentials) and public (topics) files merged into one tree.
/// Files laid out with `MQTT_IN` / `MongoDB` sections are read as well.
#[derive(Debug, Deserialize)]
pub struct BridgeConfig {
    #[serde(alias = "MQTT_IN")]
    pub mqtt: MqttConfig,
    #[serde(alias = "MongoDB")]
    pub store: StoreConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize)]
pub struct MqttConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// empty -> connect without credentials
    #[serde(default, alias = "userId")]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_qos", alias = "QoS")]
    pub qos: u8,
    pub client_id: Option<String>,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// largest publish accepted, in bytes
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: usize,
    /// exactly one topic filter is supported, see [`MqttConfig::topic`]
    #[serde(default, alias = "TopicsToSubscribe")]
    pub topics: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file, `:memory:` for a throwaway store.
    /// A `MongoDB.database_name` names the file in the working directory.
    #[serde(alias = "database_name")]
    pub path: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct IngestConfig {
    /// index of the topic segment naming the device
    #[serde(default = "default_device_segment")]
    pub device_segment: usize,
    #[serde(default)]
    pub correlation: Correlation,
    #[serde(default)]
    pub refresh_policy: RefreshPolicy,
    #[serde(default = "default_storage_retries")]
    pub storage_retries: u32,
    #[serde(default = "default_storage_retry_delay_ms")]
    pub storage_retry_delay_ms: u64,
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

fn default_port() -> u16 {
    1883
}
fn default_qos() -> u8 {
    1
}
fn default_keep_alive_secs() -> u64 {
    60
}
fn default_reconnect_delay_ms() -> u64 {
    1000
}
fn default_max_packet_size() -> usize {
    16 * 1024 * 1024
}
fn default_device_segment() -> usize {
    DEFAULT_DEVICE_SEGMENT
}
fn default_storage_retries() -> u32 {
    3
}
fn default_storage_retry_delay_ms() -> u64 {
    500
}
fn default_shutdown_grace_secs() -> u64 {
    5
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            device_segment: default_device_segment(),
            correlation: Correlation::default(),
            refresh_policy: RefreshPolicy::default(),
            storage_retries: default_storage_retries(),
            storage_retry_delay_ms: default_storage_retry_delay_ms(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

impl BridgeConfig {
    /// Reads both files (JSON, both required) then applies `DAQ_INGEST_*` overrides,
    /// ex. `DAQ_INGEST_MQTT__HOST=broker.local`
    pub fn load(private: &Path, public: &Path) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::new(&private.to_string_lossy(), FileFormat::Json))
            .add_source(File::new(&public.to_string_lossy(), FileFormat::Json))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("mqtt.topics")
                    .try_parsing(true),
            );
        Self::build(builder)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mqtt.topic()?;
        self.mqtt.qos()?;
        Ok(())
    }
}

impl MqttConfig {
    /// The single topic filter to subscribe to
    pub fn topic(&self) -> Result<&str, ConfigError> {
        match self.topics.as_slice() {
            [topic] => Ok(topic),
            [] => Err(ConfigError::NoTopics),
            topics => Err(ConfigError::MultipleTopics(topics.len())),
        }
    }

    pub fn qos(&self) -> Result<QoS, ConfigError> {
        qos_for_level(self.qos).ok_or(ConfigError::InvalidQos(self.qos))
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl IngestConfig {
    pub fn storage_retry_delay(&self) -> Duration {
        Duration::from_millis(self.storage_retry_delay_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIVATE: &str = r#"{
        "mqtt": {
            "host": "broker.local", "port": 8883,
            "username": "daq", "password": "secret", "qos": 2
        },
        "store": { "path": "/var/lib/daq/samples.sqlite" }
    }"#;

    const LEGACY_PRIVATE: &str = r#"{
        "MQTT_IN": {
            "host": "mqtt.lab", "port": 1884,
            "userId": "daq", "password": "secret", "QoS": 2
        },
        "MongoDB": {
            "host": "mongo.lab", "port": 27017,
            "username": "", "password": "", "database_name": "cpsns"
        }
    }"#;

    fn parse(private: &str, public: &str) -> Result<BridgeConfig, ConfigError> {
        BridgeConfig::build(
            Config::builder()
                .add_source(File::from_str(private, FileFormat::Json))
                .add_source(File::from_str(public, FileFormat::Json)),
        )
    }

    #[test]
    fn merges_private_and_public() {
        let cfg = parse(PRIVATE, r#"{ "mqtt": { "topics": ["lab/site/+/+"] } }"#).unwrap();
        assert_eq!(cfg.mqtt.host, "broker.local");
        assert_eq!(cfg.mqtt.port, 8883);
        assert_eq!(cfg.mqtt.qos, 2);
        assert_eq!(cfg.mqtt.topic().unwrap(), "lab/site/+/+");
        assert_eq!(cfg.store.path, PathBuf::from("/var/lib/daq/samples.sqlite"));

        assert_eq!(cfg.ingest.device_segment, 2);
        assert_eq!(cfg.ingest.correlation, Correlation::PerDevice);
        assert_eq!(cfg.ingest.refresh_policy, RefreshPolicy::FirstWins);
        assert_eq!(cfg.ingest.storage_retries, 3);
        assert_eq!(cfg.ingest.shutdown_grace(), Duration::from_secs(5));
    }

    #[test]
    fn defaults() {
        let cfg = parse(
            r#"{ "mqtt": { "host": "localhost" }, "store": { "path": ":memory:" } }"#,
            r#"{ "mqtt": { "topics": ["a/b/+/+"] } }"#,
        )
        .unwrap();
        assert_eq!(cfg.mqtt.port, 1883);
        assert_eq!(cfg.mqtt.qos, 1);
        assert!(cfg.mqtt.username.is_empty());
        assert_eq!(cfg.mqtt.client_id, None);
        assert_eq!(cfg.mqtt.keep_alive(), Duration::from_secs(60));
        assert_eq!(cfg.mqtt.reconnect_delay(), Duration::from_secs(1));
        assert_eq!(cfg.mqtt.max_packet_size, 16 * 1024 * 1024);
    }

    #[test]
    fn ingest_policies() {
        let cfg = parse(
            PRIVATE,
            r#"{
                "mqtt": { "topics": ["a/b/+/+"] },
                "ingest": {
                    "correlation": "global",
                    "refresh_policy": "latest_wins",
                    "device_segment": 3
                }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.ingest.correlation, Correlation::Global);
        assert_eq!(cfg.ingest.refresh_policy, RefreshPolicy::LatestWins);
        assert_eq!(cfg.ingest.device_segment, 3);
        assert_eq!(cfg.ingest.storage_retry_delay(), Duration::from_millis(500));
    }

    #[test]
    fn multiple_topics_rejected() {
        let res = parse(PRIVATE, r#"{ "mqtt": { "topics": ["a/+/+/data", "b/+/+/data"] } }"#);
        assert!(matches!(res, Err(ConfigError::MultipleTopics(2))));
    }

    #[test]
    fn missing_topic_rejected() {
        assert!(matches!(parse(PRIVATE, "{}"), Err(ConfigError::NoTopics)));
    }

    #[test]
    fn bad_values_rejected() {
        let res = parse(
            r#"{ "mqtt": { "host": "h", "qos": 3 }, "store": { "path": "x" } }"#,
            r#"{ "mqtt": { "topics": ["t"] } }"#,
        );
        assert!(matches!(res, Err(ConfigError::InvalidQos(3))));

        let res = parse(
            PRIVATE,
            r#"{ "mqtt": { "topics": ["t"] }, "ingest": { "correlation": "sometimes" } }"#,
        );
        assert!(matches!(res, Err(ConfigError::Load(_))));
    }

    #[test]
    fn legacy_section_names() {
        let cfg = parse(
            LEGACY_PRIVATE,
            r#"{ "MQTT_IN": { "TopicsToSubscribe": ["cpsns/site/+/+"] } }"#,
        )
        .unwrap();
        assert_eq!(cfg.mqtt.host, "mqtt.lab");
        assert_eq!(cfg.mqtt.port, 1884);
        assert_eq!(cfg.mqtt.username, "daq");
        assert_eq!(cfg.mqtt.password, "secret");
        assert_eq!(cfg.mqtt.qos().unwrap(), QoS::ExactlyOnce);
        assert_eq!(cfg.mqtt.topic().unwrap(), "cpsns/site/+/+");
        assert_eq!(cfg.store.path, PathBuf::from("cpsns"));
    }

    #[test]
    fn legacy_topic_list_is_still_checked() {
        let res = parse(
            LEGACY_PRIVATE,
            r#"{ "MQTT_IN": { "TopicsToSubscribe": ["a/+/+/+", "b/+/+/+"] } }"#,
        );
        assert!(matches!(res, Err(ConfigError::MultipleTopics(2))));
    }

    #[test]
    fn topic_without_validation() {
        let mut cfg = parse(PRIVATE, r#"{ "mqtt": { "topics": ["t"] } }"#).unwrap();
        cfg.mqtt.topics.clear();
        assert!(matches!(cfg.mqtt.topic(), Err(ConfigError::NoTopics)));
        cfg.mqtt.qos = 7;
        assert!(matches!(cfg.mqtt.qos(), Err(ConfigError::InvalidQos(7))));
    }

    #[test]
    fn missing_file_is_an_error() {
        let res = BridgeConfig::load(
            Path::new("/nonexistent/private_config.json"),
            Path::new("/nonexistent/public_config.json"),
        );
        assert!(matches!(res, Err(ConfigError::Load(_))));
    }
}

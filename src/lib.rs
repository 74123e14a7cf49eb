//! MQTT -> document store bridge for DAQ sample chunks.
//!
//! Topics look like `<root>/<site>/<device>/<kind>`. `metadata` messages carry
//! the sampling rate as JSON, `data` messages carry a [`chunk`] of raw samples
//! which are stored as [`document::SampleDocument`]s in a collection per device.

pub mod chunk;
pub mod cli;
pub mod collection;
pub mod config;
pub mod document;
pub mod error;
pub mod ingest;
pub mod session;
pub mod store;
pub mod topic;
pub mod transport;

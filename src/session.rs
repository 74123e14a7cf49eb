use std::collections::HashMap;

use serde::Deserialize;

/// How metadata is correlated with data messages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Correlation {
    /// each device needs its own metadata before its data is stored
    #[default]
    PerDevice,
    /// one process-wide slot: the first metadata from any device
    /// unlocks data from every device, all sharing its sampling rate
    Global,
}

/// What to do with metadata for a device that already has a sampling rate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
    #[default]
    FirstWins,
    LatestWins,
}

/// Sampling rates observed from metadata messages, owned by the ingest loop
#[derive(Debug, Default)]
pub struct SessionState {
    correlation: Correlation,
    refresh: RefreshPolicy,
    /// key -> sampling rate (Hz)
    rates: HashMap<String, f64>,
}

const GLOBAL_KEY: &str = "";

impl SessionState {
    pub fn new(correlation: Correlation, refresh: RefreshPolicy) -> Self {
        Self {
            correlation,
            refresh,
            rates: HashMap::new(),
        }
    }

    fn key<'a>(&self, device_id: &'a str) -> &'a str {
        match self.correlation {
            Correlation::PerDevice => device_id,
            Correlation::Global => GLOBAL_KEY,
        }
    }

    /// Whether a metadata message for this device would change anything
    pub fn wants_metadata(&self, device_id: &str) -> bool {
        match self.refresh {
            RefreshPolicy::FirstWins => !self.has_metadata(device_id),
            RefreshPolicy::LatestWins => true,
        }
    }

    /// Returns true if `rate` was stored
    pub fn observe_metadata(&mut self, device_id: &str, rate: f64) -> bool {
        if !self.wants_metadata(device_id) {
            return false;
        }
        let key = self.key(device_id).to_string();
        self.rates.insert(key, rate);
        true
    }

    pub fn sampling_rate_for(&self, device_id: &str) -> Option<f64> {
        self.rates.get(self.key(device_id)).copied()
    }

    pub fn has_metadata(&self, device_id: &str) -> bool {
        self.rates.contains_key(self.key(device_id))
    }
}

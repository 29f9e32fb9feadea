use super::Miliseconds;
use crate::stats::StatsConfig;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct StatsToml {
    pub max_samples: Option<usize>,
    pub log_samples_interval: Option<Miliseconds>,
    pub log_counters_interval: Option<Miliseconds>,
    pub log_rotation_count: Option<usize>,
    pub log_headers: Option<bool>,
    pub log_counters_filename: Option<String>,
    pub log_samples_filename: Option<String>,
}

impl Default for StatsToml {
    fn default() -> Self {
        (&StatsConfig::default()).into()
    }
}

impl StatsConfig {
    pub fn merge_toml(&mut self, toml: &StatsToml) {
        if let Some(filename) = &toml.log_counters_filename {
            self.log_counters_filename = filename.clone();
        }
        if let Some(interval) = toml.log_counters_interval {
            self.log_counters_interval = interval.to_duration();
        }
        if let Some(log_headers) = toml.log_headers {
            self.log_headers = log_headers;
        }
        if let Some(log_rotation_count) = toml.log_rotation_count {
            self.log_rotation_count = log_rotation_count;
        }
        if let Some(max_samples) = toml.max_samples {
            self.max_samples = max_samples;
        }
        if let Some(filename) = &toml.log_samples_filename {
            self.log_samples_filename = filename.clone();
        }
        if let Some(interval) = toml.log_samples_interval {
            self.log_samples_interval = interval.to_duration();
        }
    }
}

impl From<&StatsConfig> for StatsToml {
    fn from(config: &StatsConfig) -> Self {
        Self {
            max_samples: Some(config.max_samples),
            log_samples_interval: Some(config.log_samples_interval.into()),
            log_counters_interval: Some(config.log_counters_interval.into()),
            log_rotation_count: Some(config.log_rotation_count),
            log_headers: Some(config.log_headers),
            log_counters_filename: Some(config.log_counters_filename.clone()),
            log_samples_filename: Some(config.log_samples_filename.clone()),
        }
    }
}

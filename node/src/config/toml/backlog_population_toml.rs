use crate::block_processing::BacklogPopulationConfig;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct BacklogPopulationToml {
    pub enable: Option<bool>,
    pub batch_size: Option<u32>,
    pub frequency: Option<u32>,
}

impl Default for BacklogPopulationToml {
    fn default() -> Self {
        (&BacklogPopulationConfig::default()).into()
    }
}

impl BacklogPopulationConfig {
    pub fn merge_toml(&mut self, toml: &BacklogPopulationToml) {
        if let Some(enabled) = toml.enable {
            self.enabled = enabled;
        }
        if let Some(batch_size) = toml.batch_size {
            self.batch_size = batch_size;
        }
        if let Some(frequency) = toml.frequency {
            self.frequency = frequency;
        }
    }
}

impl From<&BacklogPopulationConfig> for BacklogPopulationToml {
    fn from(config: &BacklogPopulationConfig) -> Self {
        Self {
            enable: Some(config.enabled),
            batch_size: Some(config.batch_size),
            frequency: Some(config.frequency),
        }
    }
}

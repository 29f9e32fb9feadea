use super::Miliseconds;
use crate::cementation::ConfirmingSetConfig;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ConfirmingSetToml {
    pub batch_time: Option<Miliseconds>,
    pub max_blocks: Option<usize>,
    pub max_queued_notifications: Option<usize>,
}

impl Default for ConfirmingSetToml {
    fn default() -> Self {
        (&ConfirmingSetConfig::default()).into()
    }
}

impl ConfirmingSetConfig {
    pub fn merge_toml(&mut self, toml: &ConfirmingSetToml) {
        if let Some(batch_time) = toml.batch_time {
            self.batch_time = batch_time.to_duration();
        }
        if let Some(max_blocks) = toml.max_blocks {
            self.max_blocks = max_blocks;
        }
        if let Some(max) = toml.max_queued_notifications {
            self.max_queued_notifications = max;
        }
    }
}

impl From<&ConfirmingSetConfig> for ConfirmingSetToml {
    fn from(config: &ConfirmingSetConfig) -> Self {
        Self {
            batch_time: Some(config.batch_time.into()),
            max_blocks: Some(config.max_blocks),
            max_queued_notifications: Some(config.max_queued_notifications),
        }
    }
}

use super::Miliseconds;
use crate::consensus::HintedSchedulerConfig;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct HintedSchedulerToml {
    pub enable: Option<bool>,
    pub hinting_threshold: Option<u32>,
    pub check_interval: Option<Miliseconds>,
    pub block_cooldown: Option<Miliseconds>,
    pub vacancy_threshold: Option<u32>,
}

impl Default for HintedSchedulerToml {
    fn default() -> Self {
        (&HintedSchedulerConfig::default()).into()
    }
}

impl HintedSchedulerConfig {
    pub fn merge_toml(&mut self, toml: &HintedSchedulerToml) {
        if let Some(enabled) = toml.enable {
            self.enabled = enabled;
        }
        if let Some(block_cooldown) = toml.block_cooldown {
            self.block_cooldown = block_cooldown.to_duration();
        }
        if let Some(check_interval) = toml.check_interval {
            self.check_interval = check_interval.to_duration();
        }
        if let Some(hinting_threshold) = toml.hinting_threshold {
            self.hinting_threshold_percent = hinting_threshold;
        }
        if let Some(vacancy_threshold) = toml.vacancy_threshold {
            self.vacancy_threshold_percent = vacancy_threshold;
        }
    }
}

impl From<&HintedSchedulerConfig> for HintedSchedulerToml {
    fn from(config: &HintedSchedulerConfig) -> Self {
        Self {
            enable: Some(config.enabled),
            hinting_threshold: Some(config.hinting_threshold_percent),
            check_interval: Some(config.check_interval.into()),
            block_cooldown: Some(config.block_cooldown.into()),
            vacancy_threshold: Some(config.vacancy_threshold_percent),
        }
    }
}

use super::Miliseconds;
use crate::consensus::ActiveElectionsConfig;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ActiveElectionsToml {
    pub confirmation_cache: Option<usize>,
    pub confirmation_history_size: Option<usize>,
    pub hinted_limit_percentage: Option<usize>,
    pub optimistic_limit_percentage: Option<usize>,
    pub size: Option<usize>,
    pub priority_ttl: Option<Miliseconds>,
    pub manual_ttl: Option<Miliseconds>,
    pub hinted_ttl: Option<Miliseconds>,
    pub optimistic_ttl: Option<Miliseconds>,
}

impl Default for ActiveElectionsToml {
    fn default() -> Self {
        let config = ActiveElectionsConfig::default();
        (&config).into()
    }
}

impl ActiveElectionsConfig {
    pub fn merge_toml(&mut self, toml: &ActiveElectionsToml) {
        if let Some(size) = toml.size {
            self.size = size
        };
        if let Some(hinted_limit_percentage) = toml.hinted_limit_percentage {
            self.hinted_limit_percentage = hinted_limit_percentage
        };
        if let Some(optimistic_limit_percentage) = toml.optimistic_limit_percentage {
            self.optimistic_limit_percentage = optimistic_limit_percentage
        };
        if let Some(confirmation_history_size) = toml.confirmation_history_size {
            self.confirmation_history_size = confirmation_history_size
        };
        if let Some(confirmation_cache) = toml.confirmation_cache {
            self.confirmation_cache = confirmation_cache
        };
        if let Some(ttl) = toml.priority_ttl {
            self.priority_ttl = ttl.to_duration();
        }
        if let Some(ttl) = toml.manual_ttl {
            self.manual_ttl = ttl.to_duration();
        }
        if let Some(ttl) = toml.hinted_ttl {
            self.hinted_ttl = ttl.to_duration();
        }
        if let Some(ttl) = toml.optimistic_ttl {
            self.optimistic_ttl = ttl.to_duration();
        }
    }
}

impl From<&ActiveElectionsConfig> for ActiveElectionsToml {
    fn from(config: &ActiveElectionsConfig) -> Self {
        Self {
            size: Some(config.size),
            hinted_limit_percentage: Some(config.hinted_limit_percentage),
            optimistic_limit_percentage: Some(config.optimistic_limit_percentage),
            confirmation_history_size: Some(config.confirmation_history_size),
            confirmation_cache: Some(config.confirmation_cache),
            priority_ttl: Some(config.priority_ttl.into()),
            manual_ttl: Some(config.manual_ttl.into()),
            hinted_ttl: Some(config.hinted_ttl.into()),
            optimistic_ttl: Some(config.optimistic_ttl.into()),
        }
    }
}

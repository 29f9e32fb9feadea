use super::Miliseconds;
use crate::consensus::VoteCacheConfig;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct VoteCacheToml {
    pub max_size: Option<usize>,
    pub max_voters: Option<usize>,
    pub age_cutoff: Option<Miliseconds>,
}

impl Default for VoteCacheToml {
    fn default() -> Self {
        (&VoteCacheConfig::default()).into()
    }
}

impl VoteCacheConfig {
    pub fn merge_toml(&mut self, toml: &VoteCacheToml) {
        if let Some(max_size) = toml.max_size {
            self.max_size = max_size;
        }
        if let Some(max_voters) = toml.max_voters {
            self.max_voters = max_voters;
        }
        if let Some(age_cutoff) = toml.age_cutoff {
            self.age_cutoff = age_cutoff.to_duration();
        }
    }
}

impl From<&VoteCacheConfig> for VoteCacheToml {
    fn from(config: &VoteCacheConfig) -> Self {
        Self {
            max_size: Some(config.max_size),
            max_voters: Some(config.max_voters),
            age_cutoff: Some(config.age_cutoff.into()),
        }
    }
}

mod active_elections_toml;
mod backlog_population_toml;
mod confirming_set_toml;
mod hinted_scheduler_toml;
mod node_toml;
mod optimistic_scheduler_toml;
mod stats_toml;
mod vote_cache_toml;

pub use active_elections_toml::*;
pub use backlog_population_toml::*;
pub use confirming_set_toml::*;
pub use hinted_scheduler_toml::*;
pub use node_toml::*;
pub use optimistic_scheduler_toml::*;
use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};
pub use stats_toml::*;
pub use vote_cache_toml::*;

/// Durations are written as millisecond strings
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct Miliseconds(pub u128);

impl Miliseconds {
    pub fn to_duration(self) -> std::time::Duration {
        std::time::Duration::from_millis(self.0 as u64)
    }
}

impl From<std::time::Duration> for Miliseconds {
    fn from(value: std::time::Duration) -> Self {
        Self(value.as_millis())
    }
}

impl Serialize for Miliseconds {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Miliseconds {
    fn deserialize<D>(deserializer: D) -> Result<Miliseconds, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let miliseconds = s.parse::<u128>().map_err(Error::custom)?;
        Ok(Miliseconds(miliseconds))
    }
}

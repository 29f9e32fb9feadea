use super::{
    ActiveElectionsToml, BacklogPopulationToml, ConfirmingSetToml, HintedSchedulerToml,
    Miliseconds, OptimisticSchedulerToml, StatsToml, VoteCacheToml,
};
use crate::config::NodeConfig;
use lattice_core::{Amount, PublicKey};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
pub struct NodeToml {
    pub enable_voting: Option<bool>,
    pub voting_representatives: Option<Vec<PublicKey>>,
    pub online_weight_minimum: Option<Amount>,
    pub online_weight_quorum: Option<u8>,
    pub background_threads: Option<usize>,
    pub vote_generator_delay: Option<Miliseconds>,
    pub vote_generator_threshold: Option<usize>,
    pub max_pruning_age: Option<Miliseconds>,
    pub max_pruning_depth: Option<u64>,
    pub active_elections: Option<ActiveElectionsToml>,
    pub hinted_scheduler: Option<HintedSchedulerToml>,
    pub optimistic_scheduler: Option<OptimisticSchedulerToml>,
    pub backlog_population: Option<BacklogPopulationToml>,
    pub confirming_set: Option<ConfirmingSetToml>,
    pub vote_cache: Option<VoteCacheToml>,
    pub statistics: Option<StatsToml>,
}

impl NodeConfig {
    pub fn merge_toml(&mut self, toml: &NodeToml) {
        if let Some(enable_voting) = toml.enable_voting {
            self.enable_voting = enable_voting;
        }
        if let Some(reps) = &toml.voting_representatives {
            self.voting_representatives = reps.clone();
        }
        if let Some(minimum) = toml.online_weight_minimum {
            self.online_weight_minimum = minimum;
        }
        if let Some(quorum) = toml.online_weight_quorum {
            self.online_weight_quorum = quorum;
        }
        if let Some(threads) = toml.background_threads {
            self.background_threads = threads;
        }
        if let Some(delay) = toml.vote_generator_delay {
            self.vote_generator_delay = delay.to_duration();
        }
        if let Some(threshold) = toml.vote_generator_threshold {
            self.vote_generator_threshold = threshold;
        }
        if let Some(age) = toml.max_pruning_age {
            self.max_pruning_age = age.to_duration();
        }
        if let Some(depth) = toml.max_pruning_depth {
            self.max_pruning_depth = depth;
        }
        if let Some(active) = &toml.active_elections {
            self.active_elections.merge_toml(active);
        }
        if let Some(hinted) = &toml.hinted_scheduler {
            self.hinted_scheduler.merge_toml(hinted);
        }
        if let Some(optimistic) = &toml.optimistic_scheduler {
            self.optimistic_scheduler.merge_toml(optimistic);
        }
        if let Some(backlog) = &toml.backlog_population {
            self.backlog.merge_toml(backlog);
        }
        if let Some(confirming_set) = &toml.confirming_set {
            self.confirming_set.merge_toml(confirming_set);
        }
        if let Some(vote_cache) = &toml.vote_cache {
            self.vote_cache.merge_toml(vote_cache);
        }
        if let Some(stats) = &toml.statistics {
            self.stats.merge_toml(stats);
        }
    }
}

impl From<&NodeConfig> for NodeToml {
    fn from(config: &NodeConfig) -> Self {
        Self {
            enable_voting: Some(config.enable_voting),
            voting_representatives: Some(config.voting_representatives.clone()),
            online_weight_minimum: Some(config.online_weight_minimum),
            online_weight_quorum: Some(config.online_weight_quorum),
            background_threads: Some(config.background_threads),
            vote_generator_delay: Some(config.vote_generator_delay.into()),
            vote_generator_threshold: Some(config.vote_generator_threshold),
            max_pruning_age: Some(config.max_pruning_age.into()),
            max_pruning_depth: Some(config.max_pruning_depth),
            active_elections: Some((&config.active_elections).into()),
            hinted_scheduler: Some((&config.hinted_scheduler).into()),
            optimistic_scheduler: Some((&config.optimistic_scheduler).into()),
            backlog_population: Some((&config.backlog).into()),
            confirming_set: Some((&config.confirming_set).into()),
            vote_cache: Some((&config.vote_cache).into()),
            statistics: Some((&config.stats).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn empty_toml_keeps_defaults() {
        let toml: NodeToml = toml::from_str("").unwrap();
        let mut config = NodeConfig::new_test_instance();
        config.merge_toml(&toml);
        assert_eq!(config, NodeConfig::new_test_instance());
    }

    #[test]
    fn override_nested_values() {
        let toml_str = r#"
            online_weight_quorum = 51

            [active_elections]
            size = 42
            hinted_ttl = "1500"

            [confirming_set]
            batch_time = "250"

            [optimistic_scheduler]
            enable = false
        "#;
        let toml: NodeToml = toml::from_str(toml_str).unwrap();
        let mut config = NodeConfig::new_test_instance();
        config.merge_toml(&toml);

        assert_eq!(config.online_weight_quorum, 51);
        assert_eq!(config.active_elections.size, 42);
        assert_eq!(
            config.active_elections.hinted_ttl,
            Duration::from_millis(1500)
        );
        assert_eq!(config.confirming_set.batch_time, Duration::from_millis(250));
        assert!(!config.optimistic_scheduler.enabled);
        // untouched values keep their defaults
        assert_eq!(
            config.active_elections.optimistic_limit_percentage,
            NodeConfig::new_test_instance()
                .active_elections
                .optimistic_limit_percentage
        );
    }

    #[test]
    fn serialize_and_read_back() {
        let mut config = NodeConfig::new_test_instance();
        config.vote_cache.max_voters = 7;
        config.active_elections.size = 123;
        let toml_str = toml::to_string(&NodeToml::from(&config)).unwrap();
        let toml: NodeToml = toml::from_str(&toml_str).unwrap();

        let mut read_back = NodeConfig::new_test_instance();
        read_back.merge_toml(&toml);
        assert_eq!(read_back, config);
    }
}

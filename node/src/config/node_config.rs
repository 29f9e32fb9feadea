use super::NetworkParams;
use crate::{
    block_processing::{BacklogPopulationConfig, BlockProcessorConfig},
    cementation::ConfirmingSetConfig,
    consensus::{
        ActiveElectionsConfig, HintedSchedulerConfig, OptimisticSchedulerConfig, VoteCacheConfig,
        VoteProcessorConfig,
    },
    representatives::{DEFAULT_ONLINE_WEIGHT_MINIMUM, ONLINE_WEIGHT_QUORUM},
    stats::StatsConfig,
};
use anyhow::Result;
use lattice_core::{utils::get_cpu_count, Amount, PublicKey};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub struct NodeConfig {
    pub enable_voting: bool,
    /// Representatives this node votes for. Votes are only generated when
    /// voting is enabled and this list is not empty.
    pub voting_representatives: Vec<PublicKey>,
    pub online_weight_minimum: Amount,
    /// Percentage of the online weight needed for quorum
    pub online_weight_quorum: u8,
    pub background_threads: usize,
    /// Delay before a partial vote batch is sent
    pub vote_generator_delay: Duration,
    /// Number of queued candidates that triggers an immediate vote batch
    pub vote_generator_threshold: usize,
    pub max_pruning_age: Duration,
    pub max_pruning_depth: u64,
    pub active_elections: ActiveElectionsConfig,
    pub hinted_scheduler: HintedSchedulerConfig,
    pub optimistic_scheduler: OptimisticSchedulerConfig,
    pub backlog: BacklogPopulationConfig,
    pub confirming_set: ConfirmingSetConfig,
    pub vote_cache: VoteCacheConfig,
    pub vote_processor: VoteProcessorConfig,
    pub block_processor: BlockProcessorConfig,
    pub stats: StatsConfig,
}

impl NodeConfig {
    pub fn new(network_params: &NetworkParams) -> Self {
        let dev = network_params.network.is_dev_network();
        Self {
            enable_voting: dev,
            voting_representatives: Vec::new(),
            online_weight_minimum: DEFAULT_ONLINE_WEIGHT_MINIMUM,
            online_weight_quorum: ONLINE_WEIGHT_QUORUM,
            background_threads: get_cpu_count(),
            vote_generator_delay: Duration::from_millis(100),
            vote_generator_threshold: 3,
            max_pruning_age: if dev {
                Duration::from_secs(1)
            } else {
                Duration::from_secs(24 * 60 * 60)
            },
            max_pruning_depth: 0,
            active_elections: ActiveElectionsConfig::default(),
            hinted_scheduler: if dev {
                HintedSchedulerConfig::default_for_dev_network()
            } else {
                HintedSchedulerConfig::default()
            },
            optimistic_scheduler: OptimisticSchedulerConfig::new(),
            backlog: BacklogPopulationConfig::default(),
            confirming_set: ConfirmingSetConfig::default(),
            vote_cache: VoteCacheConfig::default(),
            vote_processor: VoteProcessorConfig::default(),
            block_processor: BlockProcessorConfig::new(&network_params.network),
            stats: StatsConfig::default(),
        }
    }

    pub fn new_test_instance() -> Self {
        Self::new(&NetworkParams::default())
    }

    /// Rejects settings the node cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.online_weight_quorum == 0 || self.online_weight_quorum > 100 {
            bail!(
                "online_weight_quorum must be in range 1..=100 but was {}",
                self.online_weight_quorum
            );
        }
        if self.active_elections.size == 0 {
            bail!("active_elections.size must not be zero");
        }
        if self.confirming_set.batch_time.is_zero() {
            bail!("confirming_set.batch_time must not be zero");
        }
        if self.hinted_scheduler.hinting_threshold_percent > 100 {
            bail!("hinting_threshold must be a percentage");
        }
        Ok(())
    }

    /// Whether this node generates votes
    pub fn is_voting(&self) -> bool {
        self.enable_voting && !self.voting_representatives.is_empty()
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::new_test_instance()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_core::Networks;

    #[test]
    fn default_config_is_valid() {
        assert!(NodeConfig::new_test_instance().validate().is_ok());
        assert!(NodeConfig::new(&NetworkParams::new(Networks::Live))
            .validate()
            .is_ok());
    }

    #[test]
    fn voting_is_enabled_on_dev_network_only() {
        assert!(NodeConfig::new_test_instance().enable_voting);
        assert!(!NodeConfig::new(&NetworkParams::new(Networks::Live)).enable_voting);
    }

    #[test]
    fn invalid_quorum() {
        let mut config = NodeConfig::new_test_instance();
        config.online_weight_quorum = 0;
        assert!(config.validate().is_err());
        config.online_weight_quorum = 101;
        assert!(config.validate().is_err());
        config.online_weight_quorum = 100;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_active_elections_size() {
        let mut config = NodeConfig::new_test_instance();
        config.active_elections.size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_batch_time() {
        let mut config = NodeConfig::new_test_instance();
        config.confirming_set.batch_time = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn not_voting_without_representatives() {
        let mut config = NodeConfig::new_test_instance();
        assert!(!config.is_voting());
        config.voting_representatives.push(PublicKey::from(1));
        assert!(config.is_voting());
    }
}

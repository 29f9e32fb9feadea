use anyhow::Result;
use lattice_core::Networks;
use lattice_ledger::LedgerConstants;
use std::time::Duration;

/// Timing constants that differ between the networks
#[derive(Clone, Debug)]
pub struct NetworkConstants {
    pub current_network: Networks,
    /// Interval of the active elections request loop
    pub aec_loop_interval: Duration,
    /// Time to wait before vote rebroadcasts for active elections
    pub vote_broadcast_interval: Duration,
    /// Time to wait before rebroadcasting the winner of an active election
    pub block_broadcast_interval: Duration,
    /// Minimum time between votes for different hashes of the same root
    pub voting_delay: Duration,
}

impl NetworkConstants {
    pub fn new(network: Networks) -> Self {
        match network {
            Networks::Dev => Self::dev(),
            Networks::Test => Self {
                current_network: Networks::Test,
                ..Self::live()
            },
            Networks::Live | Networks::Invalid => Self::live(),
        }
    }

    fn live() -> Self {
        Self {
            current_network: Networks::Live,
            aec_loop_interval: Duration::from_millis(300),
            vote_broadcast_interval: Duration::from_secs(15),
            block_broadcast_interval: Duration::from_secs(150),
            voting_delay: Duration::from_secs(15),
        }
    }

    fn dev() -> Self {
        Self {
            current_network: Networks::Dev,
            aec_loop_interval: Duration::from_millis(20),
            vote_broadcast_interval: Duration::from_millis(500),
            block_broadcast_interval: Duration::from_millis(500),
            voting_delay: Duration::from_secs(1),
        }
    }

    pub fn from_network_name(network: impl AsRef<str>) -> Result<Self> {
        let net = match network.as_ref() {
            "live" => Networks::Live,
            "dev" => Networks::Dev,
            "test" => Networks::Test,
            _ => bail!("invalid network"),
        };
        Ok(Self::new(net))
    }

    pub fn is_dev_network(&self) -> bool {
        self.current_network == Networks::Dev
    }

    pub fn is_live_network(&self) -> bool {
        self.current_network == Networks::Live
    }

    pub fn is_test_network(&self) -> bool {
        self.current_network == Networks::Test
    }

    /// Minimum time between broadcasts of the current winner of an election
    pub fn base_latency(&self) -> Duration {
        if self.is_dev_network() {
            Duration::from_millis(25)
        } else {
            Duration::from_millis(1000)
        }
    }
}

#[derive(Clone, Debug)]
pub struct NodeConstants {
    /// Retry interval while a confirmed block is not in the ledger yet
    pub process_confirmed_interval: Duration,
    /// Maximum number of online weight samples. Covers two weeks on live.
    pub max_weight_samples: usize,
    pub weight_period: Duration,
    /// Delay before the optimistic scheduler activates an account
    pub optimistic_activation_delay: Duration,
}

impl NodeConstants {
    pub fn new(network: &NetworkConstants) -> Self {
        let dev = network.is_dev_network();
        Self {
            process_confirmed_interval: if dev {
                Duration::from_millis(50)
            } else {
                Duration::from_millis(500)
            },
            max_weight_samples: if network.is_live_network() || network.is_test_network() {
                4032
            } else {
                288
            },
            weight_period: Duration::from_secs(5 * 60),
            optimistic_activation_delay: if dev {
                Duration::from_secs(1)
            } else {
                Duration::from_secs(30)
            },
        }
    }
}

#[derive(Clone)]
pub struct NetworkParams {
    pub network: NetworkConstants,
    pub node: NodeConstants,
    pub ledger: LedgerConstants,
}

impl NetworkParams {
    pub fn new(network: Networks) -> Self {
        let network_constants = NetworkConstants::new(network);
        Self {
            node: NodeConstants::new(&network_constants),
            network: network_constants,
            ledger: LedgerConstants::for_network(network),
        }
    }
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self::new(Networks::Dev)
    }
}

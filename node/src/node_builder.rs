use crate::{
    config::{read_node_config, NetworkParams, NodeConfig, NodeFlags},
    consensus::{AcceptAllVotes, ElectionStatus, VoteVerifier},
    transport::{ChannelId, MessagePublisher, NullMessagePublisher},
    Node, NodeArgs, NodeCallbacks,
};
use lattice_core::{Networks, Vote, VoteCode};
use lattice_ledger::{InMemoryStore, LedgerStore};
use std::{path::PathBuf, sync::Arc};

pub struct NodeCallbacksBuilder(NodeCallbacks);

impl NodeCallbacksBuilder {
    fn new() -> Self {
        Self(NodeCallbacks::default())
    }

    pub fn on_election_end(
        mut self,
        callback: impl Fn(&ElectionStatus) + Send + Sync + 'static,
    ) -> Self {
        self.0.on_election_end = Some(Box::new(callback));
        self
    }

    pub fn on_vote(
        mut self,
        callback: impl Fn(&Arc<Vote>, ChannelId, VoteCode) + Send + Sync + 'static,
    ) -> Self {
        self.0.on_vote = Some(Box::new(callback));
        self
    }

    pub fn finish(self) -> NodeCallbacks {
        self.0
    }
}

impl NodeCallbacks {
    pub fn builder() -> NodeCallbacksBuilder {
        NodeCallbacksBuilder::new()
    }
}

pub struct NodeBuilder {
    network: Networks,
    data_path: Option<PathBuf>,
    config: Option<NodeConfig>,
    network_params: Option<NetworkParams>,
    flags: Option<NodeFlags>,
    store: Option<Arc<dyn LedgerStore>>,
    publisher: Option<Arc<dyn MessagePublisher>>,
    vote_verifier: Option<Box<dyn VoteVerifier>>,
    callbacks: Option<NodeCallbacks>,
}

impl NodeBuilder {
    pub fn new(network: Networks) -> Self {
        Self {
            network,
            data_path: None,
            config: None,
            network_params: None,
            flags: None,
            store: None,
            publisher: None,
            vote_verifier: None,
            callbacks: None,
        }
    }

    /// Directory that contains `config-node.toml`. Only used if no config is set.
    pub fn data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = Some(path.into());
        self
    }

    pub fn config(mut self, config: NodeConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn network_params(mut self, network_params: NetworkParams) -> Self {
        self.network_params = Some(network_params);
        self
    }

    pub fn flags(mut self, flags: NodeFlags) -> Self {
        self.flags = Some(flags);
        self
    }

    pub fn store(mut self, store: Arc<dyn LedgerStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn publisher(mut self, publisher: Arc<dyn MessagePublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn vote_verifier(mut self, verifier: impl VoteVerifier + 'static) -> Self {
        self.vote_verifier = Some(Box::new(verifier));
        self
    }

    pub fn callbacks(mut self, callbacks: NodeCallbacks) -> Self {
        self.callbacks = Some(callbacks);
        self
    }

    pub fn finish(self) -> anyhow::Result<Node> {
        let network_params = self
            .network_params
            .unwrap_or_else(|| NetworkParams::new(self.network));

        let config = match (self.config, &self.data_path) {
            (Some(config), _) => config,
            (None, Some(data_path)) => read_node_config(data_path.clone(), &network_params)?,
            (None, None) => NodeConfig::new(&network_params),
        };

        let args = NodeArgs {
            config,
            flags: self.flags.unwrap_or_default(),
            store: self
                .store
                .unwrap_or_else(|| Arc::new(InMemoryStore::new())),
            publisher: self
                .publisher
                .unwrap_or_else(|| Arc::new(NullMessagePublisher::new())),
            vote_verifier: self
                .vote_verifier
                .unwrap_or_else(|| Box::new(AcceptAllVotes)),
            callbacks: self.callbacks.unwrap_or_default(),
            network_params,
        };

        Node::new(args)
    }
}

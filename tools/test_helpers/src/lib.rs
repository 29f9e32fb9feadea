use lattice_core::{BlockHash, Networks};
use lattice_ledger::{InMemoryStore, LedgerStore};
use lattice_node::{
    config::{NodeConfig, NodeFlags},
    consensus::Election,
    transport::{NullMessagePublisher, PublishedMessage},
    NetworkParams, Node, NodeBuilder, NodeCallbacks,
};
use lattice_output_tracker::OutputTrackerMt;
use std::{
    sync::{Arc, OnceLock},
    thread::sleep,
    time::{Duration, Instant},
};
use tracing_subscriber::EnvFilter;

/// A started node together with the messages it published
pub struct TestNode {
    pub node: Arc<Node>,
    pub store: Arc<InMemoryStore>,
    pub published: Arc<OutputTrackerMt<PublishedMessage>>,
}

impl std::ops::Deref for TestNode {
    type Target = Node;

    fn deref(&self) -> &Self::Target {
        &self.node
    }
}

pub struct System {
    pub network_params: NetworkParams,
    pub nodes: Vec<Arc<Node>>,
}

impl System {
    pub fn new() -> Self {
        init_tracing();
        Self {
            network_params: NetworkParams::new(Networks::Dev),
            nodes: Vec::new(),
        }
    }

    pub fn default_config(&self) -> NodeConfig {
        NodeConfig::new(&self.network_params)
    }

    pub fn build_node(&mut self) -> TestNodeBuilder<'_> {
        TestNodeBuilder {
            system: self,
            config: None,
            flags: None,
            store: None,
            callbacks: None,
        }
    }

    pub fn make_node(&mut self) -> TestNode {
        self.build_node().finish()
    }

    pub fn stop(&mut self) {
        for node in &self.nodes {
            node.stop();
        }
    }
}

impl Default for System {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for System {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct TestNodeBuilder<'a> {
    system: &'a mut System,
    config: Option<NodeConfig>,
    flags: Option<NodeFlags>,
    store: Option<Arc<InMemoryStore>>,
    callbacks: Option<NodeCallbacks>,
}

impl<'a> TestNodeBuilder<'a> {
    pub fn config(mut self, config: NodeConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn flags(mut self, flags: NodeFlags) -> Self {
        self.flags = Some(flags);
        self
    }

    pub fn store(mut self, store: Arc<InMemoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn callbacks(mut self, callbacks: NodeCallbacks) -> Self {
        self.callbacks = Some(callbacks);
        self
    }

    pub fn finish(self) -> TestNode {
        let config = self
            .config
            .unwrap_or_else(|| self.system.default_config());
        let store = self.store.unwrap_or_else(|| Arc::new(InMemoryStore::new()));
        let publisher = Arc::new(NullMessagePublisher::new());
        let published = publisher.track();

        let mut builder = NodeBuilder::new(Networks::Dev)
            .network_params(self.system.network_params.clone())
            .config(config)
            .flags(self.flags.unwrap_or_default())
            .store(store.clone() as Arc<dyn LedgerStore>)
            .publisher(publisher);
        if let Some(callbacks) = self.callbacks {
            builder = builder.callbacks(callbacks);
        }
        let node = builder
            .finish()
            .expect("could not create node");
        let node = Arc::new(node);
        node.start();
        self.system.nodes.push(node.clone());

        TestNode {
            node,
            store,
            published,
        }
    }
}

/// Starts an election for the block via the manual scheduler and waits until it is active
pub fn start_election(node: &Node, hash: &BlockHash) -> Arc<Election> {
    let block = {
        let txn = node.ledger.read_txn();
        node.ledger
            .get_block(&txn, hash)
            .expect("block not found")
            .into_block()
    };
    let root = block.qualified_root();
    node.election_schedulers.add_manual(Arc::new(block));
    assert_timely_msg(
        Duration::from_secs(5),
        || node.active.election(&root).is_some(),
        "election not active",
    );
    node.active.election(&root).expect("election not active")
}

pub fn assert_timely<F>(timeout: Duration, check: F)
where
    F: Fn() -> bool,
{
    assert_timely_msg(timeout, check, "timeout");
}

pub fn assert_timely_msg<F>(timeout: Duration, check: F, error_message: &str)
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    while !check() {
        if start.elapsed() > timeout {
            panic!("{}", error_message);
        }
        sleep(Duration::from_millis(50));
    }
}

pub fn assert_timely_eq<T, F>(timeout: Duration, check: F, expected: T)
where
    T: PartialEq + std::fmt::Debug,
    F: Fn() -> T,
{
    let start = Instant::now();
    let mut actual = check();
    while actual != expected {
        if start.elapsed() > timeout {
            assert_eq!(actual, expected, "timeout");
        }
        sleep(Duration::from_millis(50));
        actual = check();
    }
}

pub fn assert_never<F>(duration: Duration, check: F)
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    while start.elapsed() < duration {
        if check() {
            panic!("never check failed");
        }
        sleep(Duration::from_millis(50));
    }
}

pub fn assert_always_eq<T, F>(duration: Duration, check: F, expected: T)
where
    T: PartialEq + std::fmt::Debug,
    F: Fn() -> T,
{
    let start = Instant::now();
    while start.elapsed() < duration {
        assert_eq!(check(), expected);
        sleep(Duration::from_millis(50));
    }
}

/// Enables log output for tests. Use `RUST_LOG` to choose the level.
pub fn init_tracing() {
    static INITIALIZED: OnceLock<()> = OnceLock::new();
    INITIALIZED.get_or_init(|| {
        let dirs = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or(String::from("off"));
        let filter = EnvFilter::builder().parse_lossy(dirs);
        let _ = tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_ansi(true)
            .try_init();
    });
}

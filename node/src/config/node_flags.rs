/// Switches that turn off background behavior. Mostly used by tests.
#[derive(Clone, Debug, Default)]
pub struct NodeFlags {
    pub disable_activate_successors: bool,
    pub disable_backlog_population: bool,
    /// For testing only
    pub disable_request_loop: bool,
    pub disable_online_weight_sampling: bool,
    pub enable_pruning: bool,
}

impl NodeFlags {
    pub fn new() -> Self {
        Default::default()
    }
}

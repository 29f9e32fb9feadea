mod active_elections;
mod confirmation_solicitor;
mod election;
pub mod election_schedulers;
mod recently_cemented;
mod recently_confirmed;
mod vote_cache;
mod vote_cache_processor;
mod vote_generation;
mod vote_processor;

pub use active_elections::*;
pub use confirmation_solicitor::CONFIRM_REQ_HASHES_MAX;
pub use election::*;
pub use election_schedulers::{
    ElectionSchedulers, HintedScheduler, HintedSchedulerConfig, ManualScheduler,
    OptimisticScheduler, OptimisticSchedulerConfig, PriorityScheduler,
};
pub use recently_cemented::RecentlyCemented;
pub use recently_confirmed::RecentlyConfirmed;
pub use vote_cache::*;
pub use vote_cache_processor::*;
pub use vote_generation::*;
pub use vote_processor::*;

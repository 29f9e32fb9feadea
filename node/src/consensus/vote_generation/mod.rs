mod local_vote_history;
mod vote_generator;
mod vote_generators;
mod vote_spacing;

pub use local_vote_history::*;
pub use vote_generator::VoteGenerator;
pub use vote_generators::*;
pub use vote_spacing::VoteSpacing;

mod backlog_population;
mod block_processor;

pub use backlog_population::*;
pub use block_processor::*;

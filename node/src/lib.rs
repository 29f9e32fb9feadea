#[macro_use]
extern crate num_derive;

#[macro_use]
extern crate anyhow;

pub mod block_processing;
pub mod cementation;
pub mod config;
pub mod consensus;
mod node;
mod node_builder;
pub mod pruning;
pub mod representatives;
pub mod stats;
pub mod transport;
pub mod utils;

pub use config::NetworkParams;
pub use node::*;
pub use node_builder::*;
pub use representatives::{OnlineReps, OnlineWeightSampler};

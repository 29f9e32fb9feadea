mod message;
mod message_publisher;

pub use message::*;
pub use message_publisher::*;

use std::fmt::Display;

/// Identifies a connection to a peer. The network layer itself lives outside of this crate.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Default)]
pub struct ChannelId(usize);

impl ChannelId {
    /// Messages that were created by this node
    pub const LOOPBACK: Self = Self(0);

    pub const fn as_usize(&self) -> usize {
        self.0
    }
}

impl From<usize> for ChannelId {
    fn from(value: usize) -> Self {
        Self(value)
    }
}

impl Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

use crate::{Amount, BlockHash};
use serde::{Deserialize, Serialize};

#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BlockSubType {
    Open,
    Send,
    Receive,
    Change,
}

impl BlockSubType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockSubType::Open => "open",
            BlockSubType::Send => "send",
            BlockSubType::Receive => "receive",
            BlockSubType::Change => "change",
        }
    }
}

/// Contextual data the ledger stores next to a block
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BlockSideband {
    pub height: u64,
    /// Zero while the block is the head of its chain
    pub successor: BlockHash,
    pub timestamp: u64,
    pub subtype: BlockSubType,
    /// Balance difference caused by this block
    pub amount: Amount,
}

impl BlockSideband {
    pub fn new(
        height: u64,
        successor: BlockHash,
        timestamp: u64,
        subtype: BlockSubType,
        amount: Amount,
    ) -> Self {
        Self {
            height,
            successor,
            timestamp,
            subtype,
            amount,
        }
    }
}

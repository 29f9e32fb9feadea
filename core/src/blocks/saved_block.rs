use super::{Block, BlockSideband, BlockSubType};
use crate::{Account, Amount, BlockHash};
use std::ops::Deref;

/// A block as it is stored in the ledger, together with its sideband
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SavedBlock {
    block: Block,
    sideband: BlockSideband,
}

impl SavedBlock {
    pub fn new(block: Block, sideband: BlockSideband) -> Self {
        Self { block, sideband }
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn into_block(self) -> Block {
        self.block
    }

    pub fn sideband(&self) -> &BlockSideband {
        &self.sideband
    }

    pub fn set_successor(&mut self, successor: BlockHash) {
        self.sideband.successor = successor;
    }

    pub fn height(&self) -> u64 {
        self.sideband.height
    }

    pub fn successor(&self) -> Option<BlockHash> {
        if self.sideband.successor.is_zero() {
            None
        } else {
            Some(self.sideband.successor)
        }
    }

    pub fn timestamp(&self) -> u64 {
        self.sideband.timestamp
    }

    pub fn subtype(&self) -> BlockSubType {
        self.sideband.subtype
    }

    pub fn amount(&self) -> Amount {
        self.sideband.amount
    }

    pub fn is_send(&self) -> bool {
        self.sideband.subtype == BlockSubType::Send
    }

    pub fn is_receive(&self) -> bool {
        matches!(
            self.sideband.subtype,
            BlockSubType::Receive | BlockSubType::Open
        ) && !self.block.link.is_zero()
    }

    /// Source block of a receive or open block
    pub fn source(&self) -> Option<BlockHash> {
        if self.is_receive() {
            Some(self.block.link_as_hash())
        } else {
            None
        }
    }

    /// Receiving account of a send block
    pub fn destination(&self) -> Option<Account> {
        if self.is_send() {
            Some(self.block.link_as_account())
        } else {
            None
        }
    }
}

impl Deref for SavedBlock {
    type Target = Block;

    fn deref(&self) -> &Self::Target {
        &self.block
    }
}

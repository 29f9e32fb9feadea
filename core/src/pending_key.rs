use crate::{Account, Amount, Block, BlockHash};

/// Identifies a receivable entry: the receiving account and the hash of the send block
#[derive(Default, PartialEq, Eq, Debug, Clone, Copy, Hash, PartialOrd, Ord)]
pub struct PendingKey {
    pub receiving_account: Account,
    pub send_block_hash: BlockHash,
}

impl PendingKey {
    pub fn new(receiving_account: Account, send_block_hash: BlockHash) -> Self {
        Self {
            receiving_account,
            send_block_hash,
        }
    }

    pub fn for_send_block(block: &Block) -> Self {
        Self::new(block.link.into(), block.hash())
    }

    pub fn for_receive_block(block: &Block) -> Self {
        Self::new(block.account, block.link.into())
    }

    pub fn new_test_instance() -> Self {
        Self::new(Account::from(1), BlockHash::from(2))
    }
}

/// Information about an unreceived send
#[derive(PartialEq, Eq, Debug, Clone, Copy, Default)]
pub struct PendingInfo {
    pub source: Account,
    pub amount: Amount,
}

impl PendingInfo {
    pub fn new(source: Account, amount: Amount) -> Self {
        Self { source, amount }
    }
}

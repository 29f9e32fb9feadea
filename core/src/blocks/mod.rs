mod block_sideband;
pub use block_sideband::{BlockSideband, BlockSubType};

mod builder;
pub use builder::BlockBuilder;

mod saved_block;
pub use saved_block::SavedBlock;

use crate::{
    Account, Amount, BlockHash, BlockHashBuilder, Link, PublicKey, QualifiedRoot, Root,
};

/// A block of an account chain. Every block carries the full account state:
/// the balance after the block and the representative the balance is delegated to.
/// The meaning of `link` depends on the balance change: the destination account
/// for a send, the source block hash for a receive and zero for a change.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Block {
    pub account: Account,
    pub previous: BlockHash,
    pub representative: PublicKey,
    pub balance: Amount,
    pub link: Link,
}

impl Block {
    pub fn new(
        account: Account,
        previous: BlockHash,
        representative: PublicKey,
        balance: Amount,
        link: Link,
    ) -> Self {
        Self {
            account,
            previous,
            representative,
            balance,
            link,
        }
    }

    pub fn new_test_instance() -> Self {
        Self::new(
            Account::from(42),
            BlockHash::from(1),
            PublicKey::from(3),
            Amount::raw(420),
            Link::from(111),
        )
    }

    pub fn hash(&self) -> BlockHash {
        BlockHashBuilder::new()
            .update(self.account.as_bytes())
            .update(self.previous.as_bytes())
            .update(self.representative.as_bytes())
            .update(self.balance.to_be_bytes())
            .update(self.link.as_bytes())
            .build()
    }

    pub fn is_open(&self) -> bool {
        self.previous.is_zero()
    }

    /// The previous block, or the account itself for the first block of a chain
    pub fn root(&self) -> Root {
        if self.is_open() {
            self.account.into()
        } else {
            self.previous.into()
        }
    }

    pub fn qualified_root(&self) -> QualifiedRoot {
        QualifiedRoot::new(self.root(), self.previous)
    }

    /// Link interpreted as a source block hash
    pub fn link_as_hash(&self) -> BlockHash {
        self.link.into()
    }

    /// Link interpreted as a destination account
    pub fn link_as_account(&self) -> Account {
        self.link.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_depends_on_all_fields() {
        let block = Block::new_test_instance();
        let mut other = BlockBuilder::from_block(&block).balance(Amount::raw(1)).build();
        assert_ne!(block.hash(), other.hash());
        other = BlockBuilder::from_block(&block).build();
        assert_eq!(block.hash(), other.hash());
    }

    #[test]
    fn open_block_root_is_account() {
        let block = BlockBuilder::new()
            .account(Account::from(5))
            .previous(BlockHash::zero())
            .build();
        assert!(block.is_open());
        assert_eq!(block.root(), Root::from(5));
        assert_eq!(block.qualified_root(), QualifiedRoot::new(Root::from(5), BlockHash::zero()));
    }

    #[test]
    fn root_is_previous() {
        let block = Block::new_test_instance();
        assert_eq!(block.root(), Root::from(1));
        assert_eq!(
            block.qualified_root(),
            QualifiedRoot::new(Root::from(1), BlockHash::from(1))
        );
    }
}

use super::Block;
use crate::{Account, Amount, BlockHash, Link, PublicKey};

pub struct BlockBuilder {
    account: Account,
    previous: BlockHash,
    representative: PublicKey,
    balance: Amount,
    link: Link,
}

impl BlockBuilder {
    pub fn new() -> Self {
        Self {
            account: Account::from(1),
            previous: BlockHash::from(2),
            representative: PublicKey::from(3),
            balance: Amount::raw(4),
            link: Link::zero(),
        }
    }

    pub fn from_block(block: &Block) -> Self {
        Self {
            account: block.account,
            previous: block.previous,
            representative: block.representative,
            balance: block.balance,
            link: block.link,
        }
    }

    pub fn account(mut self, account: impl Into<Account>) -> Self {
        self.account = account.into();
        self
    }

    pub fn previous(mut self, previous: impl Into<BlockHash>) -> Self {
        self.previous = previous.into();
        self
    }

    pub fn representative(mut self, representative: impl Into<PublicKey>) -> Self {
        self.representative = representative.into();
        self
    }

    pub fn balance(mut self, balance: impl Into<Amount>) -> Self {
        self.balance = balance.into();
        self
    }

    pub fn link(mut self, link: impl Into<Link>) -> Self {
        self.link = link.into();
        self
    }

    pub fn build(self) -> Block {
        Block::new(
            self.account,
            self.previous,
            self.representative,
            self.balance,
            self.link,
        )
    }
}

impl Default for BlockBuilder {
    fn default() -> Self {
        Self::new()
    }
}

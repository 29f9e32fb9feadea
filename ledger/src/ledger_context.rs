use crate::{BlockStatus, Ledger, Transaction, DEV_GENESIS_KEY};
use lattice_core::{
    Account, AccountInfo, Amount, Block, BlockBuilder, BlockHash, PublicKey, SavedBlock,
};
use std::sync::Arc;

/// An in memory ledger with helpers for building account chains in tests
pub struct LedgerContext {
    pub ledger: Arc<Ledger>,
}

impl LedgerContext {
    pub fn empty() -> Self {
        Self {
            ledger: Arc::new(Ledger::new_null()),
        }
    }

    pub fn genesis_block_factory(&self) -> AccountBlockFactory {
        AccountBlockFactory::genesis(&self.ledger)
    }

    pub fn block_factory(&self, account: impl Into<Account>) -> AccountBlockFactory {
        AccountBlockFactory::new(&self.ledger, account.into())
    }

    /// Processes and commits a single block
    pub fn process(&self, block: &Block) -> Result<SavedBlock, BlockStatus> {
        let mut txn = self.ledger.rw_txn();
        let saved = self.ledger.process(&mut txn, block)?;
        txn.commit().unwrap();
        Ok(saved)
    }

    /// Cements the block and its dependencies
    pub fn confirm(&self, hash: BlockHash) -> Vec<SavedBlock> {
        let mut txn = self.ledger.rw_txn();
        let cemented = self.ledger.confirm(&mut txn, hash);
        txn.commit().unwrap();
        cemented
    }
}

/// Creates blocks for a single account based on the current ledger state
pub struct AccountBlockFactory<'a> {
    account: Account,
    ledger: &'a Ledger,
}

impl<'a> AccountBlockFactory<'a> {
    pub fn new(ledger: &'a Ledger, account: Account) -> Self {
        Self { account, ledger }
    }

    pub fn genesis(ledger: &'a Ledger) -> Self {
        Self::new(ledger, (*DEV_GENESIS_KEY).into())
    }

    pub fn account(&self) -> Account {
        self.account
    }

    pub fn info(&self, txn: &dyn Transaction) -> Option<AccountInfo> {
        self.ledger.account_info(txn, &self.account)
    }

    fn current(&self, txn: &dyn Transaction) -> AccountInfo {
        self.info(txn)
            .unwrap_or_else(|| panic!("account {} is not open", self.account))
    }

    pub fn send(
        &self,
        txn: &dyn Transaction,
        destination: impl Into<Account>,
        amount: Amount,
    ) -> Block {
        let info = self.current(txn);
        let destination: Account = destination.into();
        BlockBuilder::new()
            .account(self.account)
            .previous(info.head)
            .representative(info.representative)
            .balance(info.balance - amount)
            .link(destination)
            .build()
    }

    /// Receives the send. Creates an open block if the account is not opened yet.
    pub fn receive(&self, txn: &dyn Transaction, send_hash: BlockHash) -> Block {
        let amount = self
            .ledger
            .get_block(txn, &send_hash)
            .map(|b| b.amount())
            .unwrap_or_default();
        match self.info(txn) {
            Some(info) => BlockBuilder::new()
                .account(self.account)
                .previous(info.head)
                .representative(info.representative)
                .balance(info.balance + amount)
                .link(send_hash)
                .build(),
            None => BlockBuilder::new()
                .account(self.account)
                .previous(BlockHash::zero())
                .representative(PublicKey::from(self.account))
                .balance(amount)
                .link(send_hash)
                .build(),
        }
    }

    pub fn change(&self, txn: &dyn Transaction, representative: impl Into<PublicKey>) -> Block {
        let info = self.current(txn);
        BlockBuilder::new()
            .account(self.account)
            .previous(info.head)
            .representative(representative.into())
            .balance(info.balance)
            .link(Account::zero())
            .build()
    }
}

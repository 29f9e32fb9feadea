#[macro_use]
extern crate anyhow;

#[macro_use]
extern crate num_derive;

mod block_cementer;
mod block_insertion;
mod block_rollback;

mod ledger;
pub use ledger::{BlockStatus, Ledger, LedgerObserver, NullLedgerObserver};

mod ledger_cache;
pub use ledger_cache::LedgerCache;

mod ledger_constants;
pub use ledger_constants::{
    LedgerConstants, DEV_GENESIS_ACCOUNT, DEV_GENESIS_BLOCK, DEV_GENESIS_HASH, DEV_GENESIS_KEY,
    LEDGER_CONSTANTS_STUB,
};

mod ledger_context;
pub use ledger_context::{AccountBlockFactory, LedgerContext};

mod rep_weight_cache;
pub use rep_weight_cache::{RepWeightCache, RepWeightDelta};

mod store;
pub use store::{InMemoryStore, LedgerStore, Table, WriteBatch};

mod transactions;
pub use transactions::{ReadTransaction, Transaction, WriteTransaction};

mod write_queue;
pub use write_queue::{WriteGuard, WriteQueue, Writer};

#[cfg(test)]
mod ledger_tests;

use crate::{
    BlockStatus, InMemoryStore, Ledger, LedgerConstants, LedgerContext, Table, Transaction,
    DEV_GENESIS_ACCOUNT, DEV_GENESIS_HASH, DEV_GENESIS_KEY,
};
use lattice_core::{
    Account, Amount, BlockBuilder, BlockHash, BlockSubType, PublicKey, QualifiedRoot,
};
use std::sync::Arc;

#[test]
fn empty_ledger_contains_genesis() {
    let ctx = LedgerContext::empty();
    let ledger = &ctx.ledger;
    let txn = ledger.read_txn();

    assert_eq!(ledger.block_count(), 1);
    assert_eq!(ledger.cemented_count(), 1);
    assert_eq!(ledger.account_count(), 1);
    assert_eq!(ledger.pruned_count(), 0);
    assert!(ledger.block_confirmed(&txn, &DEV_GENESIS_HASH));
    assert_eq!(ledger.weight(&DEV_GENESIS_KEY), Amount::MAX);

    let info = ledger.account_info(&txn, &DEV_GENESIS_ACCOUNT).unwrap();
    assert_eq!(info.head, *DEV_GENESIS_HASH);
    assert_eq!(info.block_count, 1);
    assert!(ledger.first_unconfirmed(&txn, &DEV_GENESIS_ACCOUNT).is_none());
}

#[test]
fn process_send() {
    let ctx = LedgerContext::empty();
    let genesis = ctx.genesis_block_factory();
    let send = genesis.send(&ctx.ledger.read_txn(), Account::from(1000), Amount::raw(100));

    let saved = ctx.process(&send).unwrap();

    assert_eq!(saved.subtype(), BlockSubType::Send);
    assert_eq!(saved.amount(), Amount::raw(100));
    assert_eq!(saved.height(), 2);
    assert_eq!(ctx.ledger.block_count(), 2);
    assert_eq!(ctx.ledger.weight(&DEV_GENESIS_KEY), Amount::MAX - Amount::raw(100));

    let txn = ctx.ledger.read_txn();
    let genesis_block = ctx.ledger.get_block(&txn, &DEV_GENESIS_HASH).unwrap();
    assert_eq!(genesis_block.successor(), Some(send.hash()));
    assert!(!ctx.ledger.block_confirmed(&txn, &send.hash()));
    assert_eq!(
        ctx.ledger
            .first_unconfirmed(&txn, &DEV_GENESIS_ACCOUNT)
            .map(|b| b.hash()),
        Some(send.hash())
    );
}

#[test]
fn process_open_and_receive() {
    let ctx = LedgerContext::empty();
    let genesis = ctx.genesis_block_factory();
    let destination = ctx.block_factory(Account::from(1000));

    let send1 = genesis.send(&ctx.ledger.read_txn(), destination.account(), Amount::raw(100));
    ctx.process(&send1).unwrap();
    let send2 = genesis.send(&ctx.ledger.read_txn(), destination.account(), Amount::raw(50));
    ctx.process(&send2).unwrap();

    let open = destination.receive(&ctx.ledger.read_txn(), send1.hash());
    let saved_open = ctx.process(&open).unwrap();
    assert_eq!(saved_open.subtype(), BlockSubType::Open);
    assert_eq!(saved_open.source(), Some(send1.hash()));

    let receive = destination.receive(&ctx.ledger.read_txn(), send2.hash());
    let saved_receive = ctx.process(&receive).unwrap();
    assert_eq!(saved_receive.subtype(), BlockSubType::Receive);

    let txn = ctx.ledger.read_txn();
    assert_eq!(ctx.ledger.account_count(), 2);
    assert_eq!(ctx.ledger.block_count(), 5);
    assert_eq!(
        ctx.ledger.account_balance(&txn, &destination.account()),
        Amount::raw(150)
    );
    assert_eq!(
        ctx.ledger.weight(&PublicKey::from(destination.account())),
        Amount::raw(150)
    );
    assert!(txn.pending_for_account(&destination.account()).is_empty());
}

#[test]
fn old_block() {
    let ctx = LedgerContext::empty();
    let send = ctx
        .genesis_block_factory()
        .send(&ctx.ledger.read_txn(), Account::from(1000), Amount::raw(1));
    ctx.process(&send).unwrap();
    assert_eq!(ctx.process(&send), Err(BlockStatus::Old));
}

#[test]
fn fork() {
    let ctx = LedgerContext::empty();
    let genesis = ctx.genesis_block_factory();
    let txn = ctx.ledger.read_txn();
    let send1 = genesis.send(&txn, Account::from(1000), Amount::raw(1));
    let send2 = genesis.send(&txn, Account::from(2000), Amount::raw(1));
    drop(txn);

    ctx.process(&send1).unwrap();
    assert_eq!(ctx.process(&send2), Err(BlockStatus::Fork));
    assert_eq!(send1.qualified_root(), send2.qualified_root());
}

#[test]
fn gap_previous() {
    let ctx = LedgerContext::empty();
    let block = BlockBuilder::new()
        .account(*DEV_GENESIS_ACCOUNT)
        .previous(BlockHash::from(12345))
        .build();
    assert_eq!(ctx.process(&block), Err(BlockStatus::GapPrevious));
}

#[test]
fn gap_source() {
    let ctx = LedgerContext::empty();
    let open = BlockBuilder::new()
        .account(Account::from(1000))
        .previous(BlockHash::zero())
        .balance(Amount::raw(10))
        .link(BlockHash::from(999))
        .build();
    assert_eq!(ctx.process(&open), Err(BlockStatus::GapSource));
}

#[test]
fn unreceivable_when_received_twice() {
    let ctx = LedgerContext::empty();
    let genesis = ctx.genesis_block_factory();
    let destination = ctx.block_factory(Account::from(1000));
    let send = genesis.send(&ctx.ledger.read_txn(), destination.account(), Amount::raw(10));
    ctx.process(&send).unwrap();
    let open = destination.receive(&ctx.ledger.read_txn(), send.hash());
    ctx.process(&open).unwrap();

    let receive_again = BlockBuilder::new()
        .account(destination.account())
        .previous(open.hash())
        .representative(open.representative)
        .balance(Amount::raw(20))
        .link(send.hash())
        .build();
    assert_eq!(ctx.process(&receive_again), Err(BlockStatus::Unreceivable));
}

#[test]
fn balance_mismatch() {
    let ctx = LedgerContext::empty();
    let genesis = ctx.genesis_block_factory();
    let send = genesis.send(&ctx.ledger.read_txn(), Account::from(1000), Amount::raw(10));
    ctx.process(&send).unwrap();

    let open = BlockBuilder::new()
        .account(Account::from(1000))
        .previous(BlockHash::zero())
        .balance(Amount::raw(11))
        .link(send.hash())
        .build();
    assert_eq!(ctx.process(&open), Err(BlockStatus::BalanceMismatch));
}

#[test]
fn block_position() {
    let ctx = LedgerContext::empty();
    let block = BlockBuilder::new()
        .account(Account::from(1000))
        .previous(*DEV_GENESIS_HASH)
        .build();
    assert_eq!(ctx.process(&block), Err(BlockStatus::BlockPosition));
}

#[test]
fn confirm_cements_dependencies_first() {
    let ctx = LedgerContext::empty();
    let genesis = ctx.genesis_block_factory();
    let destination = ctx.block_factory(Account::from(1000));
    let send = genesis.send(&ctx.ledger.read_txn(), destination.account(), Amount::raw(10));
    ctx.process(&send).unwrap();
    let open = destination.receive(&ctx.ledger.read_txn(), send.hash());
    ctx.process(&open).unwrap();

    let cemented = ctx.confirm(open.hash());

    let hashes: Vec<_> = cemented.iter().map(|b| b.hash()).collect();
    assert_eq!(hashes, vec![send.hash(), open.hash()]);
    assert_eq!(ctx.ledger.cemented_count(), 3);
    let txn = ctx.ledger.read_txn();
    assert!(ctx.ledger.block_confirmed(&txn, &send.hash()));
    assert!(ctx.ledger.block_confirmed(&txn, &open.hash()));
    assert_eq!(
        ctx.ledger
            .confirmation_height(&txn, &destination.account())
            .height,
        1
    );
}

#[test]
fn confirm_already_cemented_block_does_nothing() {
    let ctx = LedgerContext::empty();
    assert!(ctx.confirm(*DEV_GENESIS_HASH).is_empty());
    assert_eq!(ctx.ledger.cemented_count(), 1);
}

#[test]
fn confirm_max_limits_result() {
    let ctx = LedgerContext::empty();
    let genesis = ctx.genesis_block_factory();
    let mut last = BlockHash::zero();
    for _ in 0..5 {
        let send = genesis.send(&ctx.ledger.read_txn(), Account::from(1000), Amount::raw(1));
        ctx.process(&send).unwrap();
        last = send.hash();
    }

    let mut txn = ctx.ledger.rw_txn_for(&[Table::ConfirmationHeight]);
    let cemented = ctx.ledger.confirm_max(&mut txn, last, 2);
    txn.commit().unwrap();

    assert_eq!(cemented.len(), 2);
    assert_eq!(ctx.ledger.cemented_count(), 3);
}

#[test]
fn uncommitted_confirmation_is_discarded() {
    let ctx = LedgerContext::empty();
    let send = ctx
        .genesis_block_factory()
        .send(&ctx.ledger.read_txn(), Account::from(1000), Amount::raw(1));
    ctx.process(&send).unwrap();

    {
        let mut txn = ctx.ledger.rw_txn();
        let cemented = ctx.ledger.confirm(&mut txn, send.hash());
        assert_eq!(cemented.len(), 1);
        assert!(ctx.ledger.block_confirmed(&txn, &send.hash()));
    }

    assert_eq!(ctx.ledger.cemented_count(), 1);
    assert!(!ctx
        .ledger
        .block_confirmed(&ctx.ledger.read_txn(), &send.hash()));
}

#[test]
fn failed_commit_leaves_ledger_unchanged() {
    let store = Arc::new(InMemoryStore::new());
    let ledger = Ledger::new(store.clone(), LedgerConstants::dev()).unwrap();
    let ctx = LedgerContext {
        ledger: Arc::new(ledger),
    };
    let send = ctx
        .genesis_block_factory()
        .send(&ctx.ledger.read_txn(), Account::from(1000), Amount::raw(1));
    ctx.process(&send).unwrap();

    let mut txn = ctx.ledger.rw_txn();
    ctx.ledger.confirm(&mut txn, send.hash());
    store.fail_next_commit();
    assert!(txn.commit().is_err());

    assert_eq!(ctx.ledger.cemented_count(), 1);
    assert!(!ctx
        .ledger
        .block_confirmed(&ctx.ledger.read_txn(), &send.hash()));
}

#[test]
fn rollback_send() {
    let ctx = LedgerContext::empty();
    let send = ctx
        .genesis_block_factory()
        .send(&ctx.ledger.read_txn(), Account::from(1000), Amount::raw(100));
    ctx.process(&send).unwrap();

    let mut txn = ctx.ledger.rw_txn();
    let rolled_back = ctx.ledger.rollback(&mut txn, &send.hash()).unwrap();
    txn.commit().unwrap();

    assert_eq!(rolled_back.len(), 1);
    assert_eq!(ctx.ledger.block_count(), 1);
    assert_eq!(ctx.ledger.weight(&DEV_GENESIS_KEY), Amount::MAX);
    let txn = ctx.ledger.read_txn();
    assert!(!ctx.ledger.block_exists(&txn, &send.hash()));
    assert!(txn.pending_for_account(&Account::from(1000)).is_empty());
    let genesis = ctx.ledger.get_block(&txn, &DEV_GENESIS_HASH).unwrap();
    assert_eq!(genesis.successor(), None);
}

#[test]
fn rollback_received_send_rolls_back_receiver() {
    let ctx = LedgerContext::empty();
    let genesis = ctx.genesis_block_factory();
    let destination = ctx.block_factory(Account::from(1000));
    let send = genesis.send(&ctx.ledger.read_txn(), destination.account(), Amount::raw(100));
    ctx.process(&send).unwrap();
    let open = destination.receive(&ctx.ledger.read_txn(), send.hash());
    ctx.process(&open).unwrap();

    let mut txn = ctx.ledger.rw_txn();
    let rolled_back = ctx.ledger.rollback(&mut txn, &send.hash()).unwrap();
    txn.commit().unwrap();

    let hashes: Vec<_> = rolled_back.iter().map(|b| b.hash()).collect();
    assert_eq!(hashes, vec![open.hash(), send.hash()]);
    assert_eq!(ctx.ledger.account_count(), 1);
    assert_eq!(ctx.ledger.block_count(), 1);
    assert_eq!(
        ctx.ledger.weight(&PublicKey::from(destination.account())),
        Amount::zero()
    );
}

#[test]
fn rollback_receive_restores_pending() {
    let ctx = LedgerContext::empty();
    let genesis = ctx.genesis_block_factory();
    let destination = ctx.block_factory(Account::from(1000));
    let send = genesis.send(&ctx.ledger.read_txn(), destination.account(), Amount::raw(100));
    ctx.process(&send).unwrap();
    let open = destination.receive(&ctx.ledger.read_txn(), send.hash());
    ctx.process(&open).unwrap();

    let mut txn = ctx.ledger.rw_txn();
    ctx.ledger.rollback(&mut txn, &open.hash()).unwrap();
    txn.commit().unwrap();

    let txn = ctx.ledger.read_txn();
    let pending = txn.pending_for_account(&destination.account());
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].1.amount, Amount::raw(100));
    assert_eq!(pending[0].1.source, *DEV_GENESIS_ACCOUNT);
    assert!(ctx.ledger.account_info(&txn, &destination.account()).is_none());
}

#[test]
fn cemented_block_cannot_be_rolled_back() {
    let ctx = LedgerContext::empty();
    let send = ctx
        .genesis_block_factory()
        .send(&ctx.ledger.read_txn(), Account::from(1000), Amount::raw(100));
    ctx.process(&send).unwrap();
    ctx.confirm(send.hash());

    let mut txn = ctx.ledger.rw_txn();
    assert!(ctx.ledger.rollback(&mut txn, &send.hash()).is_err());
}

#[test]
fn dependents_confirmed() {
    let ctx = LedgerContext::empty();
    let genesis = ctx.genesis_block_factory();
    let destination = ctx.block_factory(Account::from(1000));
    let send = genesis.send(&ctx.ledger.read_txn(), destination.account(), Amount::raw(100));
    ctx.process(&send).unwrap();
    let open = destination.receive(&ctx.ledger.read_txn(), send.hash());

    let txn = ctx.ledger.read_txn();
    assert!(ctx.ledger.dependents_confirmed(&txn, &send));
    assert!(!ctx.ledger.dependents_confirmed(&txn, &open));
    assert_eq!(
        ctx.ledger.dependent_blocks(&txn, &open),
        [BlockHash::zero(), send.hash()]
    );
    drop(txn);

    ctx.confirm(send.hash());
    assert!(ctx
        .ledger
        .dependents_confirmed(&ctx.ledger.read_txn(), &open));
}

#[test]
fn final_vote_is_irrevocable() {
    let ctx = LedgerContext::empty();
    let root = QualifiedRoot::new_test_instance();

    let mut txn = ctx.ledger.rw_txn_for(&[Table::FinalVotes]);
    assert!(ctx.ledger.final_vote_put(&mut txn, &root, &BlockHash::from(1)));
    assert!(ctx.ledger.final_vote_put(&mut txn, &root, &BlockHash::from(1)));
    assert!(!ctx.ledger.final_vote_put(&mut txn, &root, &BlockHash::from(2)));
    txn.commit().unwrap();

    let txn = ctx.ledger.read_txn();
    assert_eq!(ctx.ledger.final_vote(&txn, &root), Some(BlockHash::from(1)));
}

#[test]
fn pruning_action() {
    let ctx = LedgerContext::empty();
    let genesis = ctx.genesis_block_factory();
    let send1 = genesis.send(&ctx.ledger.read_txn(), Account::from(1000), Amount::raw(1));
    ctx.process(&send1).unwrap();
    let send2 = genesis.send(&ctx.ledger.read_txn(), Account::from(1000), Amount::raw(1));
    ctx.process(&send2).unwrap();
    ctx.confirm(send2.hash());

    let mut txn = ctx.ledger.rw_txn();
    let pruned = ctx.ledger.pruning_action(&mut txn, &send1.hash());
    txn.commit().unwrap();

    assert_eq!(pruned, 1);
    assert_eq!(ctx.ledger.pruned_count(), 1);
    let txn = ctx.ledger.read_txn();
    assert!(!ctx.ledger.block_exists(&txn, &send1.hash()));
    assert!(ctx.ledger.block_exists_or_pruned(&txn, &send1.hash()));
    assert!(ctx.ledger.block_confirmed(&txn, &send1.hash()));
    assert!(ctx.ledger.block_exists(&txn, &DEV_GENESIS_HASH));
}

#[test]
fn reopening_store_restores_counters() {
    let store = Arc::new(InMemoryStore::new());
    let ctx = LedgerContext {
        ledger: Arc::new(Ledger::new(store.clone(), LedgerConstants::dev()).unwrap()),
    };
    let genesis = ctx.genesis_block_factory();
    let destination = ctx.block_factory(Account::from(1000));
    let send = genesis.send(&ctx.ledger.read_txn(), destination.account(), Amount::raw(7));
    ctx.process(&send).unwrap();
    let open = destination.receive(&ctx.ledger.read_txn(), send.hash());
    ctx.process(&open).unwrap();
    ctx.confirm(send.hash());

    let reopened = Ledger::new(store, LedgerConstants::dev()).unwrap();
    assert_eq!(reopened.block_count(), 3);
    assert_eq!(reopened.cemented_count(), 2);
    assert_eq!(reopened.account_count(), 2);
    assert_eq!(
        reopened.weight(&PublicKey::from(destination.account())),
        Amount::raw(7)
    );
}

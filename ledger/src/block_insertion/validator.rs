use super::BlockInsertInstructions;
use crate::BlockStatus;
use lattice_core::{
    Account, AccountInfo, Amount, Block, BlockSideband, BlockSubType, PendingInfo, PendingKey,
    SavedBlock,
};

/// Validates a single block before it gets inserted into the ledger.
/// All ledger lookups are done up front so the rules below are pure.
pub(crate) struct BlockValidator<'a> {
    pub block: &'a Block,
    pub block_exists: bool,
    pub previous_block: Option<SavedBlock>,
    pub old_account_info: Option<AccountInfo>,
    pub pending_receive_info: Option<PendingInfo>,
    pub source_block_exists: bool,
    pub burn_account: Account,
    pub seconds_since_epoch: u64,
}

impl<'a> BlockValidator<'a> {
    pub(crate) fn validate(&self) -> Result<BlockInsertInstructions, BlockStatus> {
        self.ensure_block_does_not_exist_yet()?;
        self.ensure_block_is_not_for_burn_account()?;
        self.ensure_previous_block_exists()?;
        self.ensure_valid_predecessor()?;
        self.ensure_no_double_account_open()?;
        self.ensure_previous_block_is_head()?;
        self.ensure_open_block_has_link()?;
        self.ensure_no_balance_change_without_link()?;
        self.ensure_pending_receive_is_correct()?;
        Ok(self.create_instructions())
    }

    fn ensure_block_does_not_exist_yet(&self) -> Result<(), BlockStatus> {
        if self.block_exists {
            Err(BlockStatus::Old)
        } else {
            Ok(())
        }
    }

    fn ensure_block_is_not_for_burn_account(&self) -> Result<(), BlockStatus> {
        if self.block.account == self.burn_account {
            Err(BlockStatus::OpenedBurnAccount)
        } else {
            Ok(())
        }
    }

    fn ensure_previous_block_exists(&self) -> Result<(), BlockStatus> {
        if !self.block.is_open() && self.previous_block.is_none() {
            Err(BlockStatus::GapPrevious)
        } else {
            Ok(())
        }
    }

    fn ensure_valid_predecessor(&self) -> Result<(), BlockStatus> {
        match &self.previous_block {
            Some(previous) if previous.account != self.block.account => {
                Err(BlockStatus::BlockPosition)
            }
            _ => Ok(()),
        }
    }

    fn ensure_no_double_account_open(&self) -> Result<(), BlockStatus> {
        if self.block.is_open() && self.old_account_info.is_some() {
            Err(BlockStatus::Fork)
        } else {
            Ok(())
        }
    }

    fn ensure_previous_block_is_head(&self) -> Result<(), BlockStatus> {
        if let Some(info) = &self.old_account_info {
            if self.block.previous != info.head {
                return Err(BlockStatus::Fork);
            }
        }
        Ok(())
    }

    fn ensure_open_block_has_link(&self) -> Result<(), BlockStatus> {
        if self.block.is_open() && self.block.link.is_zero() {
            Err(BlockStatus::GapSource)
        } else {
            Ok(())
        }
    }

    fn ensure_no_balance_change_without_link(&self) -> Result<(), BlockStatus> {
        if self.block.link.is_zero() && self.amount_received() > Amount::zero() {
            Err(BlockStatus::BalanceMismatch)
        } else if self.subtype() == BlockSubType::Change && !self.block.link.is_zero() {
            Err(BlockStatus::BalanceMismatch)
        } else {
            Ok(())
        }
    }

    fn ensure_pending_receive_is_correct(&self) -> Result<(), BlockStatus> {
        if !self.is_receive() {
            return Ok(());
        }

        match &self.pending_receive_info {
            Some(pending) => {
                if pending.amount != self.amount_received() {
                    Err(BlockStatus::BalanceMismatch)
                } else {
                    Ok(())
                }
            }
            None if self.source_block_exists => Err(BlockStatus::Unreceivable),
            None => Err(BlockStatus::GapSource),
        }
    }

    fn previous_balance(&self) -> Amount {
        self.previous_block
            .as_ref()
            .map(|b| b.balance)
            .unwrap_or_default()
    }

    fn amount_received(&self) -> Amount {
        self.block.balance.saturating_sub(self.previous_balance())
    }

    fn is_receive(&self) -> bool {
        matches!(self.subtype(), BlockSubType::Open | BlockSubType::Receive)
    }

    fn subtype(&self) -> BlockSubType {
        let previous_balance = self.previous_balance();
        if self.block.is_open() {
            BlockSubType::Open
        } else if self.block.balance < previous_balance {
            BlockSubType::Send
        } else if self.block.balance > previous_balance {
            BlockSubType::Receive
        } else {
            BlockSubType::Change
        }
    }

    fn amount(&self) -> Amount {
        let previous_balance = self.previous_balance();
        if self.block.balance >= previous_balance {
            self.block.balance - previous_balance
        } else {
            previous_balance - self.block.balance
        }
    }

    fn create_instructions(&self) -> BlockInsertInstructions {
        let subtype = self.subtype();
        let old_info = self.old_account_info.clone().unwrap_or_default();
        BlockInsertInstructions {
            account: self.block.account,
            old_account_info: self.old_account_info.clone(),
            set_account_info: AccountInfo {
                head: self.block.hash(),
                representative: self.block.representative,
                open_block: if self.block.is_open() {
                    self.block.hash()
                } else {
                    old_info.open_block
                },
                balance: self.block.balance,
                modified: self.seconds_since_epoch,
                block_count: old_info.block_count + 1,
            },
            delete_pending: if self.is_receive() {
                Some(PendingKey::for_receive_block(self.block))
            } else {
                None
            },
            insert_pending: if subtype == BlockSubType::Send {
                Some((
                    PendingKey::for_send_block(self.block),
                    PendingInfo::new(self.block.account, self.amount()),
                ))
            } else {
                None
            },
            set_sideband: BlockSideband::new(
                self.previous_block
                    .as_ref()
                    .map(|b| b.height() + 1)
                    .unwrap_or(1),
                Default::default(),
                self.seconds_since_epoch,
                subtype,
                self.amount(),
            ),
        }
    }
}

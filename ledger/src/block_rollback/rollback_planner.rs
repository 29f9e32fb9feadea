use lattice_core::{
    Account, AccountInfo, Amount, BlockHash, BlockSubType, ConfirmationHeightInfo, PendingInfo,
    PendingKey, PublicKey, SavedBlock,
};

pub(crate) enum RollbackStep {
    RollBackBlock(RollbackInstructions),
    /// the given dependent block has to be rolled back first
    RequestDependencyRollback(BlockHash),
}

/// Describes how to roll back the head block of an account
pub(crate) struct RollbackInstructions {
    pub block: SavedBlock,
    pub account: Account,
    pub remove_pending: Option<PendingKey>,
    pub add_pending: Option<(PendingKey, PendingInfo)>,
    /// None if the account gets unopened
    pub set_account_info: Option<AccountInfo>,
    pub old_account_info: AccountInfo,
    pub clear_successor: Option<BlockHash>,
    pub new_balance: Amount,
    pub new_representative: PublicKey,
}

/// Creates RollbackInstructions for the head block of an account
pub(crate) struct RollbackPlanner {
    pub head_block: SavedBlock,
    pub current_account_info: AccountInfo,
    pub previous: Option<SavedBlock>,
    /// Account of the source block for receives
    pub linked_account: Account,
    /// Pending entry created by the head block if it is a send
    pub pending_receive: Option<PendingInfo>,
    pub latest_block_for_destination: Option<BlockHash>,
    pub confirmation_height: ConfirmationHeightInfo,
    pub seconds_since_epoch: u64,
}

impl RollbackPlanner {
    pub(crate) fn roll_back_head_block(&self) -> anyhow::Result<RollbackStep> {
        self.ensure_block_is_not_confirmed()?;

        if self.head_block.subtype() == BlockSubType::Send {
            if let Some(step) = self.roll_back_destination_account_if_send_block_is_received()? {
                return Ok(step);
            }
        }

        let instructions = RollbackInstructions {
            block: self.head_block.clone(),
            account: self.head_block.account,
            remove_pending: self.remove_pending(),
            add_pending: self.add_pending(),
            set_account_info: self.previous_account_info(),
            old_account_info: self.current_account_info.clone(),
            clear_successor: self.previous.as_ref().map(|b| b.hash()),
            new_balance: self.previous_balance(),
            new_representative: self.previous_representative(),
        };

        Ok(RollbackStep::RollBackBlock(instructions))
    }

    fn ensure_block_is_not_confirmed(&self) -> anyhow::Result<()> {
        if self.head_block.height() <= self.confirmation_height.height {
            bail!("Only unconfirmed blocks can be rolled back")
        }
        Ok(())
    }

    fn roll_back_destination_account_if_send_block_is_received(
        &self,
    ) -> anyhow::Result<Option<RollbackStep>> {
        if self.pending_receive.is_some() {
            return Ok(None);
        }

        let latest_destination_block = self
            .latest_block_for_destination
            .ok_or_else(|| anyhow!("no latest block for destination"))?;

        Ok(Some(RollbackStep::RequestDependencyRollback(
            latest_destination_block,
        )))
    }

    fn add_pending(&self) -> Option<(PendingKey, PendingInfo)> {
        let source = self.head_block.source()?;
        Some((
            PendingKey::new(self.head_block.account, source),
            PendingInfo::new(self.linked_account, self.head_block.amount()),
        ))
    }

    fn remove_pending(&self) -> Option<PendingKey> {
        let destination = self.head_block.destination()?;
        Some(PendingKey::new(destination, self.head_block.hash()))
    }

    fn previous_account_info(&self) -> Option<AccountInfo> {
        let previous = self.previous.as_ref()?;
        Some(AccountInfo {
            head: previous.hash(),
            representative: previous.representative,
            open_block: self.current_account_info.open_block,
            balance: previous.balance,
            modified: self.seconds_since_epoch,
            block_count: self.current_account_info.block_count - 1,
        })
    }

    fn previous_representative(&self) -> PublicKey {
        match &self.previous {
            Some(previous) => previous.representative,
            None => self.current_account_info.representative,
        }
    }

    fn previous_balance(&self) -> Amount {
        match &self.previous {
            Some(previous) => previous.balance,
            None => Amount::zero(),
        }
    }
}

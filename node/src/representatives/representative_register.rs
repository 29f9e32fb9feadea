use crate::transport::ChannelId;
use lattice_core::{utils::ContainerInfo, Amount, PublicKey};
use lattice_ledger::RepWeightCache;
use std::{collections::HashMap, mem::size_of, sync::Arc};

/// A representative to which we have a direct connection
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeeredRep {
    pub account: PublicKey,
    pub channel_id: ChannelId,
}

impl PeeredRep {
    pub fn new(account: PublicKey, channel_id: ChannelId) -> Self {
        Self {
            account,
            channel_id,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RegisterResult {
    Inserted,
    Updated,
    ChannelChanged(ChannelId),
}

/// Remembers the channel on which each representative was last heard
pub struct RepresentativeRegister {
    rep_weights: Arc<RepWeightCache>,
    reps: HashMap<PublicKey, PeeredRep>,
}

impl RepresentativeRegister {
    pub fn new(rep_weights: Arc<RepWeightCache>) -> Self {
        Self {
            rep_weights,
            reps: HashMap::new(),
        }
    }

    pub fn update_or_insert(&mut self, account: PublicKey, channel_id: ChannelId) -> RegisterResult {
        match self.reps.get_mut(&account) {
            Some(rep) if rep.channel_id == channel_id => RegisterResult::Updated,
            Some(rep) => {
                let old = rep.channel_id;
                rep.channel_id = channel_id;
                RegisterResult::ChannelChanged(old)
            }
            None => {
                self.reps
                    .insert(account, PeeredRep::new(account, channel_id));
                RegisterResult::Inserted
            }
        }
    }

    /// Removes all representatives that were reached through the channel
    pub fn remove_channel(&mut self, channel_id: ChannelId) -> Vec<PublicKey> {
        let removed: Vec<_> = self
            .reps
            .values()
            .filter(|r| r.channel_id == channel_id)
            .map(|r| r.account)
            .collect();
        for account in &removed {
            self.reps.remove(account);
        }
        removed
    }

    pub fn channel(&self, account: &PublicKey) -> Option<ChannelId> {
        self.reps.get(account).map(|r| r.channel_id)
    }

    /// Representatives with at least `min_weight`, highest weight first
    pub fn representatives(&self, min_weight: Amount) -> Vec<PeeredRep> {
        let weights = self.rep_weights.read();
        let mut result: Vec<_> = self
            .reps
            .values()
            .map(|rep| (rep, weights.get(&rep.account).cloned().unwrap_or_default()))
            .filter(|(_, weight)| !weight.is_zero() && *weight >= min_weight)
            .collect();
        result.sort_by(|a, b| b.1.cmp(&a.1));
        result.into_iter().map(|(rep, _)| rep.clone()).collect()
    }

    pub fn principal_representatives(&self, minimum_principal_weight: Amount) -> Vec<PeeredRep> {
        self.representatives(minimum_principal_weight)
    }

    /// Weight of all peered representatives
    pub fn total_weight(&self) -> Amount {
        let weights = self.rep_weights.read();
        self.reps
            .keys()
            .map(|account| weights.get(account).cloned().unwrap_or_default())
            .sum()
    }

    pub fn len(&self) -> usize {
        self.reps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reps.is_empty()
    }

    pub fn container_info(&self) -> ContainerInfo {
        [("reps", self.reps.len(), size_of::<PeeredRep>())].into()
    }
}

use lattice_core::{utils::ContainerInfo, Amount, PublicKey};
use std::{
    collections::HashMap,
    mem::size_of,
    sync::{RwLock, RwLockReadGuard},
};

/// Weight changes recorded by an open write transaction.
/// They are only applied to the cache once the transaction commits.
#[derive(Default, Clone)]
pub struct RepWeightDelta {
    changes: HashMap<PublicKey, (Amount, Amount)>,
}

impl RepWeightDelta {
    pub fn add(&mut self, rep: PublicKey, amount: Amount) {
        let entry = self.changes.entry(rep).or_default();
        entry.0 = entry.0.wrapping_add(amount);
    }

    pub fn sub(&mut self, rep: PublicKey, amount: Amount) {
        let entry = self.changes.entry(rep).or_default();
        entry.1 = entry.1.wrapping_add(amount);
    }

    /// Moves `old_balance` away from `old_rep` and adds `new_balance` to `new_rep`
    pub fn move_weight(
        &mut self,
        old_rep: PublicKey,
        old_balance: Amount,
        new_rep: PublicKey,
        new_balance: Amount,
    ) {
        self.sub(old_rep, old_balance);
        self.add(new_rep, new_balance);
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Vote weight per representative, derived from the account balances in the ledger
#[derive(Default)]
pub struct RepWeightCache {
    weights: RwLock<HashMap<PublicKey, Amount>>,
}

impl RepWeightCache {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn read(&self) -> RwLockReadGuard<HashMap<PublicKey, Amount>> {
        self.weights.read().unwrap()
    }

    pub fn weight(&self, rep: &PublicKey) -> Amount {
        self.weights
            .read()
            .unwrap()
            .get(rep)
            .cloned()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.weights.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set(&self, rep: PublicKey, weight: Amount) {
        let mut weights = self.weights.write().unwrap();
        if weight.is_zero() {
            weights.remove(&rep);
        } else {
            weights.insert(rep, weight);
        }
    }

    pub(crate) fn apply(&self, delta: RepWeightDelta) {
        let mut weights = self.weights.write().unwrap();
        for (rep, (added, removed)) in delta.changes {
            let current = weights.get(&rep).cloned().unwrap_or_default();
            // intermediate wrap around is fine, the final weight is never negative
            let new_weight = current.wrapping_add(added).wrapping_sub(removed);
            if new_weight.is_zero() {
                weights.remove(&rep);
            } else {
                weights.insert(rep, new_weight);
            }
        }
    }

    pub fn container_info(&self) -> ContainerInfo {
        [("rep_weights", self.len(), size_of::<(PublicKey, Amount)>())].into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty() {
        let cache = RepWeightCache::new();
        assert_eq!(cache.weight(&PublicKey::from(1)), Amount::zero());
        assert!(cache.is_empty());
    }

    #[test]
    fn apply_delta() {
        let cache = RepWeightCache::new();
        cache.set(PublicKey::from(1), Amount::raw(100));

        let mut delta = RepWeightDelta::default();
        delta.move_weight(
            PublicKey::from(1),
            Amount::raw(100),
            PublicKey::from(2),
            Amount::raw(70),
        );
        cache.apply(delta);

        assert_eq!(cache.weight(&PublicKey::from(1)), Amount::zero());
        assert_eq!(cache.weight(&PublicKey::from(2)), Amount::raw(70));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn add_before_sub_does_not_overflow() {
        let cache = RepWeightCache::new();
        cache.set(PublicKey::from(1), Amount::MAX);

        let mut delta = RepWeightDelta::default();
        delta.add(PublicKey::from(1), Amount::raw(5));
        delta.sub(PublicKey::from(1), Amount::raw(10));
        cache.apply(delta);

        assert_eq!(
            cache.weight(&PublicKey::from(1)),
            Amount::MAX - Amount::raw(5)
        );
    }
}

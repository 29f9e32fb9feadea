use bounded_vec_deque::BoundedVecDeque;
use lattice_core::{utils::ContainerInfo, Amount, PublicKey};
use lattice_ledger::RepWeightCache;
#[cfg(test)]
use mock_instant::thread_local::Instant;
#[cfg(not(test))]
use std::time::Instant;
use std::{
    collections::{HashMap, HashSet},
    mem::size_of,
    sync::Arc,
    time::Duration,
};

pub const ONLINE_WEIGHT_QUORUM: u8 = 67;
pub static DEFAULT_ONLINE_WEIGHT_MINIMUM: Amount = Amount::nano(60_000_000);

/// Tracks online representatives and trends the online voting weight.
/// The trended weight is the maximum of the samples in the trailing window.
pub struct OnlineReps {
    rep_weights: Arc<RepWeightCache>,
    /// Last time each representative was seen voting
    last_seen: HashMap<PublicKey, Instant>,
    /// Representatives already accounted for in the current sampling period
    period_reps: HashSet<PublicKey>,
    period_weight: Amount,
    samples: BoundedVecDeque<Amount>,
    trended: Amount,
    online: Amount,
    weight_period: Duration,
    online_weight_minimum: Amount,
    quorum_percent: u8,
}

impl OnlineReps {
    pub fn new(rep_weights: Arc<RepWeightCache>) -> Self {
        Self::builder(rep_weights).finish()
    }

    pub fn builder(rep_weights: Arc<RepWeightCache>) -> OnlineRepsBuilder {
        OnlineRepsBuilder::new(rep_weights)
    }

    /// Adds the voting representative to the set of online representatives.
    /// Returns true if the representative wasn't online before.
    pub fn observe(&mut self, rep: PublicKey) -> bool {
        let weight = self.rep_weights.weight(&rep);
        if weight.is_zero() {
            return false;
        }

        let now = Instant::now();
        let new_insert = self.last_seen.insert(rep, now).is_none();
        if self.period_reps.insert(rep) {
            self.period_weight += weight;
        }
        let trimmed = self.trim(now);

        if new_insert || trimmed {
            self.calculate_online();
        }
        new_insert
    }

    fn trim(&mut self, now: Instant) -> bool {
        let before = self.last_seen.len();
        let period = self.weight_period;
        self.last_seen
            .retain(|_, seen| now.duration_since(*seen) <= period);
        self.last_seen.len() != before
    }

    fn calculate_online(&mut self) {
        let weights = self.rep_weights.read();
        self.online = self
            .last_seen
            .keys()
            .map(|rep| weights.get(rep).cloned().unwrap_or_default())
            .sum();
    }

    /// Closes the current sampling period. Pushes the weight observed during
    /// the period into the trailing window and recalculates the trend.
    pub fn sample(&mut self) -> Amount {
        let period_weight = std::mem::take(&mut self.period_weight);
        self.period_reps.clear();
        self.samples.push_back(period_weight);
        self.trended = self.samples.iter().cloned().max().unwrap_or_default();
        self.trim(Instant::now());
        self.calculate_online();
        self.trended
    }

    /// Returns the trended online stake
    pub fn trended(&self) -> Amount {
        self.trended
    }

    pub fn set_trended(&mut self, trended: Amount) {
        self.trended = trended;
    }

    /// Weight of the representatives seen within the weight period
    pub fn online_weight(&self) -> Amount {
        self.online
    }

    pub fn online_weight_minimum(&self) -> Amount {
        self.online_weight_minimum
    }

    pub fn quorum_percent(&self) -> u8 {
        self.quorum_percent
    }

    /// 0.1% of trended online weight
    pub fn minimum_principal_weight(&self) -> Amount {
        self.trended / 1000
    }

    /// Weight needed for confirmation
    pub fn delta(&self) -> Amount {
        let weight = std::cmp::max(self.trended, self.online_weight_minimum);
        weight.percent(self.quorum_percent as u128)
    }

    pub fn list(&self) -> Vec<PublicKey> {
        self.last_seen.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.last_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn clear(&mut self) {
        self.last_seen.clear();
        self.online = Amount::zero();
    }

    pub fn container_info(&self) -> ContainerInfo {
        [
            (
                "reps",
                self.last_seen.len(),
                size_of::<PublicKey>() + size_of::<Instant>(),
            ),
            ("samples", self.samples.len(), size_of::<Amount>()),
        ]
        .into()
    }
}

pub struct OnlineRepsBuilder {
    rep_weights: Arc<RepWeightCache>,
    weight_period: Duration,
    online_weight_minimum: Amount,
    max_samples: usize,
    quorum_percent: u8,
}

impl OnlineRepsBuilder {
    fn new(rep_weights: Arc<RepWeightCache>) -> Self {
        Self {
            rep_weights,
            weight_period: Duration::from_secs(5 * 60),
            online_weight_minimum: DEFAULT_ONLINE_WEIGHT_MINIMUM,
            max_samples: 4032,
            quorum_percent: ONLINE_WEIGHT_QUORUM,
        }
    }

    pub fn weight_period(mut self, period: Duration) -> Self {
        self.weight_period = period;
        self
    }

    pub fn online_weight_minimum(mut self, minimum: Amount) -> Self {
        self.online_weight_minimum = minimum;
        self
    }

    pub fn max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    pub fn quorum_percent(mut self, percent: u8) -> Self {
        self.quorum_percent = percent;
        self
    }

    pub fn finish(self) -> OnlineReps {
        OnlineReps {
            rep_weights: self.rep_weights,
            last_seen: HashMap::new(),
            period_reps: HashSet::new(),
            period_weight: Amount::zero(),
            samples: BoundedVecDeque::new(self.max_samples.max(1)),
            trended: Amount::zero(),
            online: Amount::zero(),
            weight_period: self.weight_period,
            online_weight_minimum: self.online_weight_minimum,
            quorum_percent: self.quorum_percent,
        }
    }
}

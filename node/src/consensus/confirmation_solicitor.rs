use super::{Election, ElectionData};
use crate::{
    representatives::PeeredRep,
    transport::{ChannelId, Message, MessagePublisher},
};
use lattice_core::{BlockHash, Root};
use std::{
    cmp::max,
    collections::BTreeMap,
    sync::atomic::Ordering,
};

/// Maximum number of (hash, root) pairs in a single confirm request
pub const CONFIRM_REQ_HASHES_MAX: usize = 255;

/// Accepts elections that need further votes before they can be confirmed
/// and bundles them into confirm requests per channel
pub struct ConfirmationSolicitor<'a> {
    publisher: &'a dyn MessagePublisher,
    /// Global maximum amount of block broadcasts
    max_block_broadcasts: usize,
    /// Maximum amount of requests to be sent per election, bypassed if an existing vote is for a different hash
    max_election_requests: usize,
    /// Maximum amount of directed broadcasts to be sent per election
    max_election_broadcasts: usize,
    representative_requests: Vec<PeeredRep>,
    representative_broadcasts: Vec<PeeredRep>,
    requests: BTreeMap<ChannelId, Vec<(BlockHash, Root)>>,
    prepared: bool,
    rebroadcasted: usize,
}

impl<'a> ConfirmationSolicitor<'a> {
    pub fn new(publisher: &'a dyn MessagePublisher, max_block_broadcasts: usize) -> Self {
        Self {
            publisher,
            max_block_broadcasts,
            max_election_requests: 50,
            max_election_broadcasts: 1,
            representative_requests: Vec::new(),
            representative_broadcasts: Vec::new(),
            requests: BTreeMap::new(),
            prepared: false,
            rebroadcasted: 0,
        }
    }

    /// Prepare object for batching election confirmation requests
    pub fn prepare(&mut self, representatives: &[PeeredRep]) {
        debug_assert!(!self.prepared);
        self.requests.clear();
        self.rebroadcasted = 0;
        self.max_election_broadcasts = max(representatives.len() / 2, 1);
        self.representative_requests = representatives.to_vec();
        self.representative_broadcasts = representatives.to_vec();
        self.prepared = true;
    }

    /// Broadcast the winner of an election if the broadcast limit has not been reached
    pub fn broadcast(&mut self, guard: &ElectionData) -> Result<(), ()> {
        debug_assert!(self.prepared);
        self.rebroadcasted += 1;
        if self.rebroadcasted > self.max_block_broadcasts {
            return Err(());
        }

        let hash = guard.winner_hash();
        let winner = Message::Publish((*guard.winner).clone());
        let mut count = 0;
        // Directed broadcasting to principal representatives
        for rep in &self.representative_broadcasts {
            if count >= self.max_election_broadcasts {
                break;
            }
            let should_broadcast = match guard.last_votes.get(&rep.account) {
                Some(existing) => existing.hash != hash,
                None => {
                    count += 1;
                    true
                }
            };
            if should_broadcast {
                self.publisher.send(rep.channel_id, &winner);
            }
        }
        // Random flood for block propagation
        self.publisher.flood(&winner, 0.5);
        Ok(())
    }

    /// Add an election that needs to be confirmed. Returns false if no request could be queued.
    pub fn add(&mut self, election: &Election, guard: &ElectionData) -> bool {
        debug_assert!(self.prepared);
        let mut added = false;
        let mut count = 0;
        let hash = guard.winner_hash();
        let root = guard.winner.root();
        let is_quorum = election.is_quorum.load(Ordering::SeqCst);
        for rep in &self.representative_requests {
            if count >= self.max_election_requests {
                break;
            }
            let existing = guard.last_votes.get(&rep.account);
            let different = existing.map(|i| i.hash != hash).unwrap_or(false);
            let needs_final = existing
                .map(|i| is_quorum && !i.is_final())
                .unwrap_or(false);
            if existing.is_none() || needs_final || different {
                self.requests
                    .entry(rep.channel_id)
                    .or_default()
                    .push((hash, root));
                if !different {
                    count += 1;
                }
                added = true;
            }
        }
        added
    }

    /// Dispatch bundled requests to each channel
    pub fn flush(&mut self) {
        debug_assert!(self.prepared);
        for (channel_id, requests) in &self.requests {
            for chunk in requests.chunks(CONFIRM_REQ_HASHES_MAX) {
                let req = Message::ConfirmReq(chunk.to_vec());
                if !self.publisher.send(*channel_id, &req) {
                    // channel is saturated
                    break;
                }
            }
        }
        self.requests.clear();
        self.prepared = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        consensus::{ElectionBehavior, VoteInfo},
        transport::NullMessagePublisher,
    };
    use lattice_core::{Block, PublicKey};
    use std::{sync::Arc, time::Duration};

    fn create_election() -> Election {
        Election::new(
            1,
            Arc::new(Block::new_test_instance()),
            ElectionBehavior::Priority,
            Duration::from_secs(30),
        )
    }

    fn reps(count: u64) -> Vec<PeeredRep> {
        (1..=count)
            .map(|i| PeeredRep::new(PublicKey::from(i), ChannelId::from(i as usize)))
            .collect()
    }

    #[test]
    fn batches_requests_per_channel() {
        let publisher = NullMessagePublisher::new();
        let tracker = publisher.track();
        let election = create_election();
        let mut solicitor = ConfirmationSolicitor::new(&publisher, 4);
        solicitor.prepare(&reps(2));

        let guard = election.mutex.lock().unwrap();
        assert!(solicitor.add(&election, &guard));
        solicitor.flush();

        let output = tracker.output();
        assert_eq!(output.len(), 2);
        let block = Block::new_test_instance();
        assert_eq!(
            output[0].message,
            Message::ConfirmReq(vec![(block.hash(), block.root())])
        );
    }

    #[test]
    fn skips_reps_that_already_voted() {
        let publisher = NullMessagePublisher::new();
        let tracker = publisher.track();
        let election = create_election();
        let mut solicitor = ConfirmationSolicitor::new(&publisher, 4);
        solicitor.prepare(&reps(1));

        let mut guard = election.mutex.lock().unwrap();
        let hash = guard.winner_hash();
        guard
            .last_votes
            .insert(PublicKey::from(1), VoteInfo::new(1, hash));
        assert!(!solicitor.add(&election, &guard));
        solicitor.flush();

        assert_eq!(tracker.output().len(), 0);
    }

    #[test]
    fn broadcast_limit() {
        let publisher = NullMessagePublisher::new();
        let election = create_election();
        let mut solicitor = ConfirmationSolicitor::new(&publisher, 1);
        solicitor.prepare(&reps(1));
        let guard = election.mutex.lock().unwrap();
        assert!(solicitor.broadcast(&guard).is_ok());
        assert!(solicitor.broadcast(&guard).is_err());
    }
}

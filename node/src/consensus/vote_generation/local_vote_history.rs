use lattice_core::{utils::ContainerInfo, BlockHash, Root, Vote};
use std::{
    collections::{BTreeMap, HashMap},
    mem::size_of,
    sync::{Arc, Mutex},
};

/// Votes this node generated, kept so that confirm requests can be answered
/// without generating a new vote
pub struct LocalVoteHistory {
    data: Mutex<HistoryData>,
    max_cache: usize,
}

#[derive(Default)]
struct HistoryData {
    /// insertion order
    history: BTreeMap<u64, LocalVote>,
    by_root: HashMap<Root, Vec<u64>>,
    next_id: u64,
}

struct LocalVote {
    root: Root,
    hash: BlockHash,
    vote: Arc<Vote>,
}

impl HistoryData {
    fn remove(&mut self, id: u64) {
        if let Some(entry) = self.history.remove(&id) {
            if let Some(ids) = self.by_root.get_mut(&entry.root) {
                ids.retain(|i| *i != id);
                if ids.is_empty() {
                    self.by_root.remove(&entry.root);
                }
            }
        }
    }

    fn trim(&mut self, max_cache: usize) {
        while self.history.len() > max_cache {
            let Some((&oldest, _)) = self.history.first_key_value() else {
                break;
            };
            self.remove(oldest);
        }
    }
}

impl LocalVoteHistory {
    pub fn new(max_cache: usize) -> Self {
        debug_assert!(max_cache > 0);
        Self {
            data: Mutex::new(HistoryData::default()),
            max_cache,
        }
    }

    pub fn add(&self, root: &Root, hash: &BlockHash, vote: &Arc<Vote>) {
        let mut data = self.data.lock().unwrap();

        let mut add_vote = true;
        let mut to_remove = Vec::new();
        if let Some(ids) = data.by_root.get(root) {
            for id in ids {
                let current = &data.history[id];
                let same_rep = current.vote.voting_account == vote.voting_account;
                if current.hash != *hash || (same_rep && current.vote.timestamp <= vote.timestamp)
                {
                    to_remove.push(*id);
                } else if same_rep {
                    // the existing vote is newer
                    add_vote = false;
                }
            }
        }
        for id in to_remove {
            data.remove(id);
        }

        if add_vote {
            let id = data.next_id;
            data.next_id += 1;
            data.history.insert(
                id,
                LocalVote {
                    root: *root,
                    hash: *hash,
                    vote: vote.clone(),
                },
            );
            data.by_root.entry(*root).or_default().push(id);
        }
        data.trim(self.max_cache);
    }

    pub fn erase(&self, root: &Root) {
        let mut data = self.data.lock().unwrap();
        if let Some(ids) = data.by_root.remove(root) {
            for id in ids {
                data.history.remove(&id);
            }
        }
    }

    pub fn votes(&self, root: &Root, hash: &BlockHash, is_final: bool) -> Vec<Arc<Vote>> {
        let data = self.data.lock().unwrap();
        let Some(ids) = data.by_root.get(root) else {
            return Vec::new();
        };
        ids.iter()
            .map(|id| &data.history[id])
            .filter(|i| i.hash == *hash && (!is_final || i.vote.is_final()))
            .map(|i| i.vote.clone())
            .collect()
    }

    pub fn exists(&self, root: &Root) -> bool {
        self.data.lock().unwrap().by_root.contains_key(root)
    }

    pub fn len(&self) -> usize {
        self.data.lock().unwrap().history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn container_info(&self) -> ContainerInfo {
        [("history", self.len(), size_of::<LocalVote>())].into()
    }
}

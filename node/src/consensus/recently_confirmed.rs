use lattice_core::{utils::ContainerInfo, BlockHash, QualifiedRoot};
use std::{
    collections::{HashMap, VecDeque},
    mem::size_of,
    sync::Mutex,
};

/// Roots and winners of the most recently confirmed elections
pub struct RecentlyConfirmed {
    data: Mutex<RecentlyConfirmedData>,
    max_len: usize,
}

#[derive(Default)]
struct RecentlyConfirmedData {
    sequential: VecDeque<(QualifiedRoot, BlockHash)>,
    by_root: HashMap<QualifiedRoot, BlockHash>,
    by_hash: HashMap<BlockHash, QualifiedRoot>,
}

impl RecentlyConfirmed {
    pub fn new(max_len: usize) -> Self {
        Self {
            data: Mutex::new(Default::default()),
            max_len,
        }
    }

    /// Returns false if the root is already in the container
    pub fn put(&self, root: QualifiedRoot, hash: BlockHash) -> bool {
        let mut guard = self.data.lock().unwrap();
        if guard.by_root.contains_key(&root) || guard.by_hash.contains_key(&hash) {
            return false;
        }
        guard.sequential.push_back((root.clone(), hash));
        guard.by_root.insert(root.clone(), hash);
        guard.by_hash.insert(hash, root);
        if guard.sequential.len() > self.max_len {
            if let Some((old_root, old_hash)) = guard.sequential.pop_front() {
                guard.by_root.remove(&old_root);
                guard.by_hash.remove(&old_hash);
            }
        }
        true
    }

    pub fn erase(&self, hash: &BlockHash) {
        let mut guard = self.data.lock().unwrap();
        if let Some(root) = guard.by_hash.remove(hash) {
            guard.by_root.remove(&root);
            guard.sequential.retain(|(_, h)| h != hash);
        }
    }

    pub fn clear(&self) {
        let mut guard = self.data.lock().unwrap();
        guard.sequential.clear();
        guard.by_root.clear();
        guard.by_hash.clear();
    }

    pub fn root_exists(&self, root: &QualifiedRoot) -> bool {
        self.data.lock().unwrap().by_root.contains_key(root)
    }

    pub fn hash_exists(&self, hash: &BlockHash) -> bool {
        self.data.lock().unwrap().by_hash.contains_key(hash)
    }

    pub fn back(&self) -> Option<(QualifiedRoot, BlockHash)> {
        self.data.lock().unwrap().sequential.back().cloned()
    }

    pub fn len(&self) -> usize {
        self.data.lock().unwrap().sequential.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn container_info(&self) -> ContainerInfo {
        [(
            "confirmed",
            self.len(),
            size_of::<BlockHash>() + size_of::<QualifiedRoot>(),
        )]
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_core::Root;

    fn root(i: u64) -> QualifiedRoot {
        QualifiedRoot::new(Root::from(i), BlockHash::from(i))
    }

    #[test]
    fn put_and_lookup() {
        let confirmed = RecentlyConfirmed::new(10);
        assert!(confirmed.put(root(1), BlockHash::from(100)));
        assert!(confirmed.root_exists(&root(1)));
        assert!(confirmed.hash_exists(&BlockHash::from(100)));
        assert!(!confirmed.hash_exists(&BlockHash::from(101)));
        assert_eq!(confirmed.back(), Some((root(1), BlockHash::from(100))));
    }

    #[test]
    fn duplicate_root_is_rejected() {
        let confirmed = RecentlyConfirmed::new(10);
        confirmed.put(root(1), BlockHash::from(100));
        assert!(!confirmed.put(root(1), BlockHash::from(101)));
        assert_eq!(confirmed.len(), 1);
    }

    #[test]
    fn oldest_entry_is_dropped() {
        let confirmed = RecentlyConfirmed::new(2);
        confirmed.put(root(1), BlockHash::from(100));
        confirmed.put(root(2), BlockHash::from(200));
        confirmed.put(root(3), BlockHash::from(300));
        assert_eq!(confirmed.len(), 2);
        assert!(!confirmed.root_exists(&root(1)));
        assert!(!confirmed.hash_exists(&BlockHash::from(100)));
        assert!(confirmed.root_exists(&root(3)));
    }

    #[test]
    fn erase() {
        let confirmed = RecentlyConfirmed::new(10);
        confirmed.put(root(1), BlockHash::from(100));
        confirmed.erase(&BlockHash::from(100));
        assert!(confirmed.is_empty());
        assert!(!confirmed.root_exists(&root(1)));
    }
}

use super::ElectionStatus;
use bounded_vec_deque::BoundedVecDeque;
use lattice_core::utils::ContainerInfo;
use std::{mem::size_of, sync::Mutex};

/// History of the last cemented election results
pub struct RecentlyCemented {
    cemented: Mutex<BoundedVecDeque<ElectionStatus>>,
}

impl RecentlyCemented {
    pub fn new(max_len: usize) -> Self {
        Self {
            cemented: Mutex::new(BoundedVecDeque::new(max_len)),
        }
    }

    pub fn put(&self, status: ElectionStatus) {
        self.cemented.lock().unwrap().push_back(status);
    }

    pub fn list(&self) -> Vec<ElectionStatus> {
        self.cemented.lock().unwrap().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.cemented.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn container_info(&self) -> ContainerInfo {
        [("cemented", self.len(), size_of::<ElectionStatus>())].into()
    }
}

//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{backend::Backend, LoadBalancer};

/// Round-robin selector.
/// Stores the shared rotation counter used to rotate through backends.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the rotation counter and map it onto the pool.
    fn next_index(&self, len: usize) -> usize {
        self.counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1) % len
    }
}

impl LoadBalancer for RoundRobin {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        if backends.is_empty() {
            return None;
        }

        let len = backends.len();
        let next = self.next_index(len);

        // One full cycle starting at `next`, skipping dead backends.
        for i in next..next + len {
            let index = i % len;
            let backend = &backends[index];
            if backend.is_alive() {
                if i != next {
                    // Resume rotation from the live slot instead of re-scanning dead ones.
                    self.counter.store(index, Ordering::Relaxed);
                }
                return Some(backend.clone());
            }
        }
        None
    }
}

use std::{collections::HashSet, sync::Mutex};

use crate::transport::EventId;

/// Rejects redelivery of already-seen inbound events.
///
/// The upstream transport delivers at least once, so every event id is
/// checked-then-marked atomically before any side effect runs. Two
/// rotating generations bound the memory footprint: once the current
/// generation fills up it becomes the previous one, so the guard holds at
/// most `2 * capacity` ids while still remembering the most recent ones.
pub(crate) struct DedupGuard {
    inner: Mutex<Generations>,
}

struct Generations {
    current: HashSet<EventId>,
    previous: HashSet<EventId>,
    capacity: usize,
}

impl DedupGuard {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Generations {
                current: HashSet::new(),
                previous: HashSet::new(),
                capacity: capacity.max(1),
            }),
        }
    }

    /// `true` when this is the first sighting of the id.
    pub(crate) fn check_and_mark(&self, id: &EventId) -> bool {
        let mut inner = self.inner.lock().expect("dedup lock poisoned");

        if inner.current.contains(id) || inner.previous.contains(id) {
            metrics::counter!(crate::init_metrics::DUPLICATE_EVENT).increment(1);

            return false;
        }

        if inner.current.len() >= inner.capacity {
            inner.previous = std::mem::take(&mut inner.current);
        }

        inner.current.insert(id.clone());

        true
    }
}

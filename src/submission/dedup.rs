use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::TranslationJobHandle;

#[derive(Debug)]
struct Remembered {
    handle: TranslationJobHandle,
    at: Instant,
}

type Slot = Arc<Mutex<Option<Remembered>>>;

/// Per-target-blob locks with a short memory of submitted jobs.
///
/// Holding a [`SubmissionSlot`] serialises the exists/upload/submit sequence
/// for one derived blob name across concurrent requests.
pub struct SubmissionGuard {
    ttl: Duration,
    slots: DashMap<String, Slot>,
}

pub struct SubmissionSlot {
    guard: OwnedMutexGuard<Option<Remembered>>,
    ttl: Duration,
}

impl SubmissionGuard {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: DashMap::new(),
        }
    }

    pub async fn acquire(&self, key: &str) -> SubmissionSlot {
        self.prune();
        let slot = self.slots.entry(key.to_string()).or_default().clone();
        SubmissionSlot {
            guard: slot.lock_owned().await,
            ttl: self.ttl,
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    // Slots referenced outside the map are in use and must survive.
    fn prune(&self) {
        let ttl = self.ttl;
        self.slots.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(entry) => entry.as_ref().is_some_and(|r| r.at.elapsed() < ttl),
                Err(_) => true,
            }
        });
    }
}

impl SubmissionSlot {
    /// Handle of a job submitted for this key within the TTL.
    pub fn recent(&self) -> Option<TranslationJobHandle> {
        self.guard
            .as_ref()
            .filter(|r| r.at.elapsed() < self.ttl)
            .map(|r| r.handle.clone())
    }

    pub fn remember(&mut self, handle: TranslationJobHandle) {
        if self.ttl.is_zero() {
            return;
        }
        *self.guard = Some(Remembered {
            handle,
            at: Instant::now(),
        });
    }
}

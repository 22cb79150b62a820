use super::WakeScheduler;
use crate::core::{CullError, LifecycleId, Location, Millis, Result};
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

/// Ordering: (wake ASC, location ASC, id ASC).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct WakeSlot {
    wake: Millis,
    location: Location,
    id: LifecycleId,
}

#[derive(Debug, Default)]
struct QueueInner {
    slots: BTreeSet<WakeSlot>,
    index: HashMap<LifecycleId, WakeSlot>,
}

impl QueueInner {
    fn upsert(&mut self, id: LifecycleId, location: &Location, wake: Millis) {
        if let Some(existing) = self.index.get(&id) {
            if existing.wake == wake && &existing.location == location {
                return;
            }
        }
        if let Some(old) = self.index.remove(&id) {
            self.slots.remove(&old);
        }
        let slot = WakeSlot {
            wake,
            location: location.clone(),
            id,
        };
        self.slots.insert(slot.clone());
        self.index.insert(id, slot);
    }
}

/// Priority queue of lifecycle entities keyed by next wake time.
///
/// Reading due entities does not remove them: an entity whose reconcile
/// fails keeps its elapsed wake and is picked up again on the next pass.
#[derive(Debug, Default)]
pub struct WakeQueue {
    inner: Mutex<QueueInner>,
}

impl WakeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entities whose wake is at or before `now`, in processing order.
    pub fn due(&self, now: Millis) -> Result<Vec<LifecycleId>> {
        let inner = self.inner.lock()?;
        Ok(inner
            .slots
            .iter()
            .take_while(|slot| slot.wake <= now)
            .map(|slot| slot.id)
            .collect())
    }

    /// Earliest wake in the queue.
    pub fn next_wake(&self) -> Result<Option<Millis>> {
        Ok(self.inner.lock()?.slots.first().map(|slot| slot.wake))
    }

    pub fn wake_of(&self, id: LifecycleId) -> Result<Option<Millis>> {
        Ok(self.inner.lock()?.index.get(&id).map(|slot| slot.wake))
    }

    pub fn contains(&self, id: LifecycleId) -> Result<bool> {
        Ok(self.inner.lock()?.index.contains_key(&id))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.inner.lock()?.index.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.inner.lock()?.index.is_empty())
    }
}

impl WakeScheduler for WakeQueue {
    fn register(&self, id: LifecycleId, location: &Location, wake: Millis) -> Result<()> {
        self.inner.lock()?.upsert(id, location, wake);
        Ok(())
    }

    fn reschedule(&self, id: LifecycleId, location: &Location, wake: Millis) -> Result<()> {
        let mut inner = self.inner.lock()?;
        if !inner.index.contains_key(&id) {
            return Err(CullError::Scheduler(format!(
                "cannot reschedule unregistered lifecycle {}",
                id
            )));
        }
        inner.upsert(id, location, wake);
        Ok(())
    }

    fn deregister(&self, id: LifecycleId) -> Result<()> {
        let mut inner = self.inner.lock()?;
        if let Some(old) = inner.index.remove(&id) {
            inner.slots.remove(&old);
        }
        Ok(())
    }
}

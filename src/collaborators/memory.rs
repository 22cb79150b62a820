use super::ActivityStore;
use crate::core::{Millis, ResourceId, Result};
use std::collections::HashMap;
use std::sync::RwLock;

/// Last-activity store kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryActivityStore {
    timers: RwLock<HashMap<ResourceId, Millis>>,
}

impl MemoryActivityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with previously recorded timestamps
    pub fn with_entries(entries: impl IntoIterator<Item = (ResourceId, Millis)>) -> Self {
        Self {
            timers: RwLock::new(entries.into_iter().collect()),
        }
    }

    pub fn get(&self, id: ResourceId) -> Result<Option<Millis>> {
        Ok(self.timers.read()?.get(&id).copied())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.timers.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.timers.read()?.is_empty())
    }
}

impl ActivityStore for MemoryActivityStore {
    fn load_last_activity(&self, id: ResourceId) -> Result<Option<Millis>> {
        self.get(id)
    }

    fn save_last_activity(&self, id: ResourceId, last_activity: Millis) -> Result<()> {
        self.timers.write()?.insert(id, last_activity);
        Ok(())
    }
}

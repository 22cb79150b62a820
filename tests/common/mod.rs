#![allow(dead_code)]

use dormancy::simulation::{RecordingHost, SimResource};
use dormancy::{
    ActivityStore, CullError, CullingConfig, LifecycleContext, Location, MemoryActivityStore,
    Millis, Resource, ResourceId, Result, WakeQueue,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Memory store whose reads and writes can be made to fail.
#[derive(Debug, Default)]
pub struct FlakyStore {
    pub inner: MemoryActivityStore,
    pub fail_load: AtomicBool,
    pub fail_save: AtomicBool,
    pub saves: AtomicUsize,
}

impl FlakyStore {
    pub fn seeded(entries: impl IntoIterator<Item = (ResourceId, Millis)>) -> Self {
        Self {
            inner: MemoryActivityStore::with_entries(entries),
            ..Self::default()
        }
    }
}

impl ActivityStore for FlakyStore {
    fn load_last_activity(&self, id: ResourceId) -> Result<Option<Millis>> {
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(CullError::Persistence("store offline".to_string()));
        }
        self.inner.load_last_activity(id)
    }

    fn save_last_activity(&self, id: ResourceId, last_activity: Millis) -> Result<()> {
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(CullError::Persistence("store offline".to_string()));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save_last_activity(id, last_activity)
    }
}

pub struct Harness {
    pub queue: Arc<WakeQueue>,
    pub host: Arc<RecordingHost>,
    pub store: Arc<FlakyStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(FlakyStore::default())
    }

    pub fn with_store(store: FlakyStore) -> Self {
        let host = Arc::new(RecordingHost::new());
        host.grant("alice").unwrap();
        Self {
            queue: Arc::new(WakeQueue::new()),
            host,
            store: Arc::new(store),
        }
    }

    pub fn ctx(&self) -> LifecycleContext {
        LifecycleContext::new(
            self.store.clone(),
            self.host.clone(),
            self.host.clone(),
            self.host.clone(),
            self.queue.clone(),
        )
    }

    /// Creates a resource the host tracks, returning the concrete and trait handles.
    pub fn resource(&self, sim: SimResource) -> (Arc<SimResource>, Arc<dyn Resource>) {
        let sim = Arc::new(sim);
        self.host.track(sim.clone()).unwrap();
        let resource: Arc<dyn Resource> = sim.clone();
        (sim, resource)
    }
}

pub fn config() -> CullingConfig {
    CullingConfig::new(1_000, 5_000, 2_000)
}

pub fn loc(x: i32) -> Location {
    Location::new("world", x, 64, 0)
}

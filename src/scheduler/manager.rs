use super::{WakeQueue, WakeScheduler};
use crate::collaborators::{
    ActivityStore, LifecycleContext, PermissionCheck, Resource, ResourceActivator,
    ResourceDestroyer,
};
use crate::config::{CullingConfig, CullingPolicy};
use crate::core::{Clock, CullError, LifecycleId, Location, Millis, ResourceId, Result};
use crate::lifecycle::{ActivityStatus, DormantCulling, PersistOutcome, ResourceEvent, Transition};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, warn};

/// Outcome of one scheduler pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    pub now: Millis,
    /// Entities whose wake had elapsed.
    pub due: usize,
    pub deactivated: usize,
    pub reactivated: usize,
    pub culled: usize,
    /// Reconciles that returned an error; they stay due.
    pub failed: usize,
    /// Due entities whose registration had not finished yet.
    #[serde(default)]
    pub skipped: usize,
}

impl TickReport {
    fn record(&mut self, transition: Transition) {
        match transition {
            Transition::Deactivated => self.deactivated += 1,
            Transition::Reactivated => self.reactivated += 1,
            Transition::Culled => self.culled += 1,
        }
    }
}

/// Outcome of persisting every dirty entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushReport {
    pub saved: usize,
    pub failed: usize,
    pub transient: usize,
}

/// Running totals across the manager's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CullTotals {
    pub ticks: u64,
    pub deactivated: u64,
    pub reactivated: u64,
    pub culled: u64,
    pub failed: u64,
}

/// Read-only view of one tracked entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleSnapshot {
    pub id: LifecycleId,
    pub resource_id: Option<ResourceId>,
    pub location: Location,
    pub last_activity: Millis,
    pub committed_status: ActivityStatus,
    pub computed_status: ActivityStatus,
    pub next_wake: Millis,
    pub dirty: bool,
}

impl LifecycleSnapshot {
    fn capture(machine: &DormantCulling, now: Millis) -> Self {
        Self {
            id: machine.id(),
            resource_id: machine.resource().map(|resource| resource.id()),
            location: machine.location().clone(),
            last_activity: machine.last_activity(),
            committed_status: machine.committed_status(),
            computed_status: machine.status_at(now),
            next_wake: machine.next_wake(),
            dirty: machine.is_dirty(),
        }
    }
}

type SharedLifecycle = Arc<Mutex<DormantCulling>>;

/// Tracks the lifecycle of every registered resource and wakes them on time.
///
/// Each entity's state machine sits behind its own lock, so distinct
/// entities never contend. The registry lock is never held across a call
/// into a collaborator.
pub struct CullManager {
    queue: Arc<WakeQueue>,
    ctx: LifecycleContext,
    clock: Arc<dyn Clock>,
    policy: CullingPolicy,
    entries: RwLock<HashMap<LifecycleId, SharedLifecycle>>,
    totals: Mutex<CullTotals>,
}

impl CullManager {
    pub fn new(
        store: Arc<dyn ActivityStore>,
        activator: Arc<dyn ResourceActivator>,
        destroyer: Arc<dyn ResourceDestroyer>,
        permissions: Arc<dyn PermissionCheck>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let queue = Arc::new(WakeQueue::new());
        let scheduler: Arc<dyn WakeScheduler> = queue.clone();
        Self {
            queue,
            ctx: LifecycleContext::new(store, activator, destroyer, permissions, scheduler),
            clock,
            policy: CullingPolicy::default(),
            entries: RwLock::new(HashMap::new()),
            totals: Mutex::new(CullTotals::default()),
        }
    }

    /// Use `policy` for class lookups and default registrations.
    pub fn with_policy(mut self, policy: CullingPolicy) -> Result<Self> {
        policy.validate()?;
        self.policy = policy;
        Ok(self)
    }

    pub fn policy(&self) -> &CullingPolicy {
        &self.policy
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn queue(&self) -> &Arc<WakeQueue> {
        &self.queue
    }

    /// Track `resource` with the policy's default thresholds.
    pub fn register(&self, resource: &Arc<dyn Resource>) -> Result<LifecycleId> {
        let config = self.policy.default.clone();
        self.register_with(resource, config)
    }

    /// Track `resource` with the thresholds of `class`.
    pub fn register_class(&self, resource: &Arc<dyn Resource>, class: &str) -> Result<LifecycleId> {
        let config = self.policy.for_class(class).clone();
        self.register_with(resource, config)
    }

    pub fn register_with(
        &self,
        resource: &Arc<dyn Resource>,
        config: CullingConfig,
    ) -> Result<LifecycleId> {
        let now = self.clock.now_ms();
        let machine = DormantCulling::register(resource, config, self.ctx.clone(), now)?;
        let id = machine.id();
        if machine.is_registered() {
            self.entries
                .write()?
                .insert(id, Arc::new(Mutex::new(machine)));
        } else {
            debug!(lifecycle_id = %id, "resource culled during registration");
        }
        Ok(id)
    }

    fn entry(&self, id: LifecycleId) -> Result<SharedLifecycle> {
        self.entries
            .read()?
            .get(&id)
            .cloned()
            .ok_or_else(|| CullError::UnknownEntity(id.to_string()))
    }

    fn forget(&self, id: LifecycleId) -> Result<()> {
        self.entries.write()?.remove(&id);
        Ok(())
    }

    /// Feed a host notification to the entity's state machine.
    pub fn handle_event(&self, id: LifecycleId, event: &ResourceEvent) -> Result<Option<Transition>> {
        let now = self.clock.now_ms();
        let entry = self.entry(id)?;
        let (outcome, still_registered) = {
            let mut machine = entry.lock()?;
            let outcome = machine.accept_event(event, now);
            (outcome, machine.is_registered())
        };
        if !still_registered {
            self.forget(id)?;
        }
        let transition = outcome?;
        if let Some(transition) = transition {
            self.count(transition)?;
        }
        Ok(transition)
    }

    /// Record activity that the host has already vetted.
    pub fn record_activity(&self, id: LifecycleId) -> Result<Option<Transition>> {
        let now = self.clock.now_ms();
        let entry = self.entry(id)?;
        let (outcome, still_registered) = {
            let mut machine = entry.lock()?;
            let outcome = machine.record_activity(now);
            (outcome, machine.is_registered())
        };
        if !still_registered {
            self.forget(id)?;
        }
        let transition = outcome?;
        if let Some(transition) = transition {
            self.count(transition)?;
        }
        Ok(transition)
    }

    /// Reconcile every entity whose wake has elapsed, once, in queue order.
    ///
    /// Failures are counted and logged, not returned; the failed entity
    /// keeps its elapsed wake and is retried on the next tick.
    pub fn tick(&self, now: Millis) -> Result<TickReport> {
        let due = self.queue.due(now)?;
        let mut report = TickReport {
            now,
            due: due.len(),
            ..TickReport::default()
        };

        for id in due {
            let entry = self.entries.read()?.get(&id).cloned();
            let Some(entry) = entry else {
                // Scheduled but not yet in the registry: a registration is
                // still in flight. The entry stays due for the next tick.
                debug!(lifecycle_id = %id, "due entity not registered yet, skipping");
                report.skipped += 1;
                continue;
            };

            let (outcome, still_registered) = {
                let mut machine = entry.lock()?;
                let outcome = machine.reconcile(now);
                (outcome, machine.is_registered())
            };

            match outcome {
                Ok(Some(transition)) => report.record(transition),
                Ok(None) => {}
                Err(err) => {
                    report.failed += 1;
                    warn!(lifecycle_id = %id, error = %err, "reconcile failed, will retry");
                }
            }
            if !still_registered {
                self.forget(id)?;
            }
        }

        let mut totals = self.totals.lock()?;
        totals.ticks += 1;
        totals.deactivated += report.deactivated as u64;
        totals.reactivated += report.reactivated as u64;
        totals.culled += report.culled as u64;
        totals.failed += report.failed as u64;
        Ok(report)
    }

    /// Tick at the manager clock's current time.
    pub fn tick_now(&self) -> Result<TickReport> {
        self.tick(self.clock.now_ms())
    }

    /// Persist every entity with unsaved activity.
    pub fn flush(&self) -> Result<FlushReport> {
        let entries = self.entries.read()?.values().cloned().collect::<Vec<_>>();
        let mut report = FlushReport::default();
        for entry in entries {
            match entry.lock()?.persist() {
                PersistOutcome::Saved => report.saved += 1,
                PersistOutcome::Failed => report.failed += 1,
                PersistOutcome::Transient => report.transient += 1,
                PersistOutcome::Clean | PersistOutcome::Detached => {}
            }
        }
        Ok(report)
    }

    pub fn snapshot(&self, id: LifecycleId) -> Result<LifecycleSnapshot> {
        let now = self.clock.now_ms();
        let entry = self.entry(id)?;
        let machine = entry.lock()?;
        Ok(LifecycleSnapshot::capture(&machine, now))
    }

    /// Snapshots of every tracked entity, ordered by location.
    pub fn snapshots(&self) -> Result<Vec<LifecycleSnapshot>> {
        let now = self.clock.now_ms();
        let entries = self.entries.read()?.values().cloned().collect::<Vec<_>>();
        let mut snapshots = Vec::with_capacity(entries.len());
        for entry in entries {
            snapshots.push(LifecycleSnapshot::capture(&*entry.lock()?, now));
        }
        snapshots.sort_by(|a, b| a.location.cmp(&b.location).then(a.id.cmp(&b.id)));
        Ok(snapshots)
    }

    pub fn contains(&self, id: LifecycleId) -> Result<bool> {
        Ok(self.entries.read()?.contains_key(&id))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.entries.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.entries.read()?.is_empty())
    }

    pub fn next_wake(&self) -> Result<Option<Millis>> {
        self.queue.next_wake()
    }

    pub fn totals(&self) -> Result<CullTotals> {
        Ok(self.totals.lock()?.clone())
    }

    fn count(&self, transition: Transition) -> Result<()> {
        let mut totals = self.totals.lock()?;
        match transition {
            Transition::Deactivated => totals.deactivated += 1,
            Transition::Reactivated => totals.reactivated += 1,
            Transition::Culled => totals.culled += 1,
        }
        Ok(())
    }
}

impl std::fmt::Debug for CullManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CullManager")
            .field("queue", &self.queue)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

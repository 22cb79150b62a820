// ============================================================================
// Dormant Culling State Machine
// ============================================================================
//
// Status is never stored. It is recomputed from `last_activity` on every
// query and compared against `committed_status`, the status whose side
// effects have actually been applied. Only a mismatch fires a side effect,
// and only the one for the freshly computed status:
//
//   Active ──lifetime──> Dormant ──total_lifetime──> Culled
//     ^                    │
//     └────activity────────┘
//
// An entity that jumps straight from Active to Culled fires only the cull.
// `committed_status` moves only after the side effect succeeds, so a failed
// call is retried on the next wake.
//
// ============================================================================

use super::event::{ResourceEvent, Transition};
use super::state::LifecycleState;
use super::status::{ActivityStatus, compute_next_wake, compute_status};
use crate::collaborators::{ActivityStore, LifecycleContext, Resource};
use crate::config::CullingConfig;
use crate::core::{DestroyCause, LifecycleId, Location, Millis, ResourceId, Result};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use tracing::{Level, debug, event, info, info_span, warn};

/// Result of writing the last-activity timestamp back to storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistOutcome {
    /// Nothing changed since the last save.
    Clean,
    /// The resource has no storage id yet; stays dirty until it gets one.
    Transient,
    /// The resource is gone; nothing left to save for.
    Detached,
    Saved,
    /// The store rejected the write; stays dirty for the next flush.
    Failed,
}

/// Lifecycle tracker of exactly one resource.
pub struct DormantCulling {
    id: LifecycleId,
    resource: Weak<dyn Resource>,
    location: Location,
    config: CullingConfig,
    state: LifecycleState,
    ctx: LifecycleContext,
    dirty: bool,
    registered: bool,
}

impl DormantCulling {
    /// Starts tracking `resource` and registers it with the context's scheduler.
    ///
    /// The committed status is seeded from the resource's active flag and
    /// reconciled once right away, so a resource loaded long after its
    /// thresholds passed is deactivated or culled immediately. A failure of
    /// that first reconcile is logged and left scheduled for retry.
    pub fn register(
        resource: &Arc<dyn Resource>,
        config: CullingConfig,
        ctx: LifecycleContext,
        now: Millis,
    ) -> Result<Self> {
        config.validate()?;

        let resource_id = resource.id();
        let (last_activity, dirty) = initial_last_activity(ctx.store.as_ref(), resource_id, now);
        let committed = if resource.is_active() {
            ActivityStatus::Active
        } else {
            ActivityStatus::Dormant
        };
        let next_wake = compute_next_wake(committed, last_activity, &config, now);

        let mut machine = Self {
            id: LifecycleId::new(),
            resource: Arc::downgrade(resource),
            location: resource.location(),
            config,
            state: LifecycleState::new(last_activity, committed, next_wake),
            ctx,
            dirty,
            registered: false,
        };

        machine
            .ctx
            .scheduler
            .register(machine.id, &machine.location, next_wake)?;
        machine.registered = true;

        debug!(
            lifecycle_id = %machine.id,
            resource_id = %resource_id,
            last_activity,
            status = %committed,
            "lifecycle registered"
        );

        if let Err(err) = machine.reconcile(now) {
            warn!(
                lifecycle_id = %machine.id,
                resource_id = %resource_id,
                error = %err,
                "initial reconcile failed, will retry on next wake"
            );
        }

        Ok(machine)
    }

    /// Records qualifying activity at `now` and reconciles immediately, so a
    /// dormant resource comes back without waiting for its next wake.
    pub fn record_activity(&mut self, now: Millis) -> Result<Option<Transition>> {
        if !self.registered || self.state.is_terminal() {
            return Ok(None);
        }
        if self.state.touch(now) {
            self.dirty = true;
        }
        self.reconcile(now)
    }

    /// Brings the committed status in line with the status computed for `now`.
    ///
    /// Safe to call early, late, repeatedly, or after deregistration.
    pub fn reconcile(&mut self, now: Millis) -> Result<Option<Transition>> {
        if !self.registered || self.state.is_terminal() {
            return Ok(None);
        }
        let Some(resource) = self.resource.upgrade() else {
            debug!(lifecycle_id = %self.id, "resource dropped, deregistering lifecycle");
            self.deregister()?;
            return Ok(None);
        };

        let span = info_span!(
            "lifecycle.reconcile",
            lifecycle_id = %self.id,
            resource_id = %resource.id(),
            now
        );
        let _enter = span.enter();

        let computed = self.status_at(now);
        let committed = self.state.committed_status;
        if computed == committed {
            self.schedule_next(computed, now)?;
            return Ok(None);
        }

        let transition = match computed {
            ActivityStatus::Culled => {
                if let Err(err) = self
                    .ctx
                    .destroyer
                    .destroy(resource.as_ref(), DestroyCause::LifecycleCull)
                {
                    event!(Level::ERROR, error = %err, from = %committed, "cull failed");
                    return Err(err);
                }
                self.state.terminate();
                if let Err(err) = self.deregister() {
                    warn!(error = %err, "culled resource could not be deregistered");
                }
                info!(location = %self.location, "culling resource for exceeding its total lifetime");
                return Ok(Some(Transition::Culled));
            }
            ActivityStatus::Dormant => {
                if let Err(err) = self.ctx.activator.set_active(resource.as_ref(), false) {
                    event!(Level::ERROR, error = %err, "deactivation failed");
                    return Err(err);
                }
                self.state.committed_status = ActivityStatus::Dormant;
                info!(location = %self.location, "deactivating resource for exceeding its lifetime");
                Transition::Deactivated
            }
            ActivityStatus::Active => {
                if let Err(err) = self.ctx.activator.set_active(resource.as_ref(), true) {
                    event!(Level::ERROR, error = %err, "reactivation failed");
                    return Err(err);
                }
                self.state.committed_status = ActivityStatus::Active;
                info!(location = %self.location, "re-activating resource");
                Transition::Reactivated
            }
        };

        self.schedule_next(computed, now)?;
        Ok(Some(transition))
    }

    /// Routes a host notification into the state machine.
    pub fn accept_event(&mut self, event: &ResourceEvent, now: Millis) -> Result<Option<Transition>> {
        match event {
            ResourceEvent::Destroyed { cause } => {
                debug!(lifecycle_id = %self.id, %cause, "resource destroyed, dropping lifecycle");
                self.deregister()?;
                Ok(None)
            }
            ResourceEvent::Lifecycle => Ok(None),
            ResourceEvent::Activity { actor: None } => Ok(None),
            ResourceEvent::Activity { actor: Some(actor) } => {
                let Some(resource) = self.resource.upgrade() else {
                    return Ok(None);
                };
                let permitted = self.ctx.permissions.has_permission(
                    resource.as_ref(),
                    actor,
                    &self.config.refresh_capability,
                );
                if !permitted {
                    return Ok(None);
                }
                self.record_activity(now)
            }
        }
    }

    /// Removes the entity from its scheduler. Later wakes become no-ops.
    pub fn deregister(&mut self) -> Result<()> {
        if !self.registered {
            return Ok(());
        }
        self.registered = false;
        self.ctx.scheduler.deregister(self.id)
    }

    /// Writes `last_activity` to the store if it changed since the last save.
    pub fn persist(&mut self) -> PersistOutcome {
        if !self.dirty {
            return PersistOutcome::Clean;
        }
        let Some(resource) = self.resource.upgrade() else {
            return PersistOutcome::Detached;
        };
        let resource_id = resource.id();
        if !resource_id.is_persisted() {
            return PersistOutcome::Transient;
        }

        match self
            .ctx
            .store
            .save_last_activity(resource_id, self.state.last_activity)
        {
            Ok(()) => {
                self.dirty = false;
                PersistOutcome::Saved
            }
            Err(err) => {
                warn!(
                    lifecycle_id = %self.id,
                    resource_id = %resource_id,
                    error = %err,
                    "saving last activity failed, will retry on next flush"
                );
                PersistOutcome::Failed
            }
        }
    }

    fn schedule_next(&mut self, status: ActivityStatus, now: Millis) -> Result<()> {
        let wake = compute_next_wake(status, self.state.last_activity, &self.config, now);
        self.state.next_wake = wake;
        self.ctx.scheduler.reschedule(self.id, &self.location, wake)
    }

    pub fn id(&self) -> LifecycleId {
        self.id
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn config(&self) -> &CullingConfig {
        &self.config
    }

    pub fn state(&self) -> &LifecycleState {
        &self.state
    }

    /// The tracked resource, if the host still holds it.
    pub fn resource(&self) -> Option<Arc<dyn Resource>> {
        self.resource.upgrade()
    }

    pub fn last_activity(&self) -> Millis {
        self.state.last_activity
    }

    /// Status whose side effects have been applied.
    pub fn committed_status(&self) -> ActivityStatus {
        self.state.committed_status
    }

    pub fn next_wake(&self) -> Millis {
        self.state.next_wake
    }

    /// Status implied by elapsed time, regardless of what has been applied.
    pub fn status_at(&self, now: Millis) -> ActivityStatus {
        compute_status(now, self.state.last_activity, &self.config)
    }

    pub fn time_since_last_activity(&self, now: Millis) -> Millis {
        now.saturating_sub(self.state.last_activity)
    }

    /// Negative once the resource is past its dormancy threshold.
    pub fn time_until_dormant(&self, now: Millis) -> Millis {
        self.config
            .lifetime_ms
            .saturating_sub(self.time_since_last_activity(now))
    }

    /// Negative once the resource is past its cull threshold.
    pub fn time_until_cull(&self, now: Millis) -> Millis {
        self.config
            .total_lifetime_ms
            .saturating_sub(self.time_since_last_activity(now))
    }

    pub fn is_active_at(&self, now: Millis) -> bool {
        self.status_at(now) == ActivityStatus::Active
    }

    pub fn is_dormant_at(&self, now: Millis) -> bool {
        self.status_at(now) == ActivityStatus::Dormant
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }
}

impl std::fmt::Debug for DormantCulling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DormantCulling")
            .field("id", &self.id)
            .field("location", &self.location)
            .field("config", &self.config)
            .field("state", &self.state)
            .field("dirty", &self.dirty)
            .field("registered", &self.registered)
            .finish()
    }
}

/// Last activity to start from, and whether it still needs saving.
///
/// Missing or unreadable history starts the clock at `now`; it never culls
/// a resource just because its record is gone.
fn initial_last_activity(store: &dyn ActivityStore, id: ResourceId, now: Millis) -> (Millis, bool) {
    if !id.is_persisted() {
        return (now, true);
    }
    match store.load_last_activity(id) {
        Ok(Some(last_activity)) => (last_activity, false),
        Ok(None) => (now, true),
        Err(err) => {
            warn!(resource_id = %id, error = %err, "loading last activity failed, starting from now");
            (now, false)
        }
    }
}

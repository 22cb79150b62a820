// ============================================================================
// Dormancy Library
// ============================================================================
//
// Tracks resources that decay from active to dormant to culled as time
// passes without activity. Status is derived lazily from a timestamp; an
// external wake-time scheduler makes sure each resource is reconciled no
// later than the moment its status can next change.
//
// ============================================================================

pub mod collaborators;
pub mod config;
pub mod core;
pub mod lifecycle;
pub mod scheduler;
pub mod simulation;

use std::sync::Arc;

// Re-export main types for convenience
pub use collaborators::{
    ActivityStore, LifecycleContext, MemoryActivityStore, PermissionCheck, Resource,
    ResourceActivator, ResourceDestroyer,
};
pub use config::{CullingConfig, CullingPolicy, parse_duration_ms};
pub use crate::core::{
    Actor, Capability, Clock, CullError, DestroyCause, LifecycleId, Location, ManualClock, Millis,
    NEVER, ResourceId, Result, SystemClock,
};
pub use lifecycle::{
    ActivityStatus, DormantCulling, LifecycleState, PersistOutcome, ResourceEvent, Transition,
    compute_next_wake, compute_status,
};
pub use scheduler::{
    CullManager, CullTotals, CullWorker, FlushReport, LifecycleSnapshot, TickReport, WakeQueue,
    WakeScheduler, spawn_cull_worker,
};

// ============================================================================
// Quick start
// ============================================================================

/// Builds a [`CullManager`] wired to in-memory collaborators.
///
/// Handy for tests and tools; production hosts construct [`CullManager::new`]
/// with their own storage, activation, destruction and permission services.
///
/// # Examples
///
/// ```
/// use dormancy::simulation::{RecordingHost, SimResource};
/// use dormancy::{ActivityStatus, CullingConfig, CullingPolicy, Location, ManualClock, Resource};
/// use std::sync::Arc;
///
/// # fn main() -> dormancy::Result<()> {
/// let clock = Arc::new(ManualClock::new(0));
/// let host = Arc::new(RecordingHost::new());
/// let policy = CullingPolicy::new(CullingConfig::new(1_000, 5_000, 2_000));
/// let manager = dormancy::in_memory_manager(host.clone(), clock.clone(), policy)?;
///
/// let resource: Arc<dyn Resource> =
///     Arc::new(SimResource::transient(Location::new("world", 0, 64, 0)));
/// let id = manager.register(&resource)?;
///
/// clock.set(1_500);
/// let report = manager.tick_now()?;
/// assert_eq!(report.deactivated, 1);
/// assert_eq!(manager.snapshot(id)?.committed_status, ActivityStatus::Dormant);
/// # Ok(())
/// # }
/// ```
pub fn in_memory_manager<H>(
    host: Arc<H>,
    clock: Arc<dyn Clock>,
    policy: CullingPolicy,
) -> Result<CullManager>
where
    H: ResourceActivator + ResourceDestroyer + PermissionCheck + 'static,
{
    CullManager::new(
        Arc::new(MemoryActivityStore::new()),
        host.clone(),
        host.clone(),
        host,
        clock,
    )
    .with_policy(policy)
}

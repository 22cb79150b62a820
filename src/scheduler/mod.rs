//! Wake-time scheduling of lifecycle state machines.
//!
//! A state machine only promises that its status will not change before
//! its next wake. The scheduler's job is to call `reconcile` on every entity
//! whose wake has passed, in a deterministic order.

pub mod manager;
pub mod queue;
pub mod worker;

use crate::core::{LifecycleId, Location, Millis, Result};

pub use manager::{CullManager, CullTotals, FlushReport, LifecycleSnapshot, TickReport};
pub use queue::WakeQueue;
pub use worker::{CullWorker, spawn_cull_worker};

/// What a state machine needs from whoever wakes it up.
///
/// Entities sharing a wake time are ordered by location.
pub trait WakeScheduler: Send + Sync {
    fn register(&self, id: LifecycleId, location: &Location, wake: Millis) -> Result<()>;

    /// Moves an already registered entity. Rescheduling to the same wake is a no-op.
    fn reschedule(&self, id: LifecycleId, location: &Location, wake: Millis) -> Result<()>;

    /// Forgets the entity. Unknown ids are ignored.
    fn deregister(&self, id: LifecycleId) -> Result<()>;
}

//! Interfaces of everything the lifecycle core calls out to.
//!
//! The core never owns a resource, never stores data itself and never
//! decides permissions. Hosts implement these traits and hand them to
//! each state machine through a [`LifecycleContext`].

pub mod memory;

use crate::core::{Actor, Capability, DestroyCause, Location, Millis, ResourceId, Result};
use crate::scheduler::WakeScheduler;
use std::sync::Arc;

pub use memory::MemoryActivityStore;

/// A monitored resource owned by the host.
pub trait Resource: Send + Sync {
    /// Storage identity, [`ResourceId::TRANSIENT`] until first saved.
    fn id(&self) -> ResourceId;

    fn location(&self) -> Location;

    /// Current value of the host-side active flag.
    fn is_active(&self) -> bool;
}

/// Durable storage of last-activity timestamps.
pub trait ActivityStore: Send + Sync {
    /// `Ok(None)` means no activity was ever recorded for `id`.
    fn load_last_activity(&self, id: ResourceId) -> Result<Option<Millis>>;

    fn save_last_activity(&self, id: ResourceId, last_activity: Millis) -> Result<()>;
}

/// Flips the host-side active flag of a resource.
pub trait ResourceActivator: Send + Sync {
    fn set_active(&self, resource: &dyn Resource, active: bool) -> Result<()>;
}

/// Removes a resource from the world.
///
/// Implementations must not synchronously feed a destruction event for the
/// same resource back into the lifecycle that is culling it.
pub trait ResourceDestroyer: Send + Sync {
    fn destroy(&self, resource: &dyn Resource, cause: DestroyCause) -> Result<()>;
}

/// Decides whether an actor's activity counts for a resource.
pub trait PermissionCheck: Send + Sync {
    fn has_permission(&self, resource: &dyn Resource, actor: &Actor, capability: &Capability)
    -> bool;
}

/// Everything a state machine needs from its host, injected at construction.
#[derive(Clone)]
pub struct LifecycleContext {
    pub store: Arc<dyn ActivityStore>,
    pub activator: Arc<dyn ResourceActivator>,
    pub destroyer: Arc<dyn ResourceDestroyer>,
    pub permissions: Arc<dyn PermissionCheck>,
    pub scheduler: Arc<dyn WakeScheduler>,
}

impl LifecycleContext {
    pub fn new(
        store: Arc<dyn ActivityStore>,
        activator: Arc<dyn ResourceActivator>,
        destroyer: Arc<dyn ResourceDestroyer>,
        permissions: Arc<dyn PermissionCheck>,
        scheduler: Arc<dyn WakeScheduler>,
    ) -> Self {
        Self {
            store,
            activator,
            destroyer,
            permissions,
            scheduler,
        }
    }
}

impl std::fmt::Debug for LifecycleContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleContext").finish_non_exhaustive()
    }
}

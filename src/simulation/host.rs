use crate::collaborators::{PermissionCheck, Resource, ResourceActivator, ResourceDestroyer};
use crate::core::{Actor, Capability, CullError, DestroyCause, Location, ResourceId, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory resource with mutable id and flags.
#[derive(Debug)]
pub struct SimResource {
    id: AtomicI64,
    location: Location,
    active: AtomicBool,
    destroyed: AtomicBool,
}

impl SimResource {
    pub fn new(id: ResourceId, location: Location) -> Self {
        Self {
            id: AtomicI64::new(id.as_i64()),
            location,
            active: AtomicBool::new(true),
            destroyed: AtomicBool::new(false),
        }
    }

    /// A resource that has not been written to storage yet.
    pub fn transient(location: Location) -> Self {
        Self::new(ResourceId::TRANSIENT, location)
    }

    pub fn inactive(self) -> Self {
        self.active.store(false, Ordering::SeqCst);
        self
    }

    /// Simulates the host saving the resource for the first time.
    pub fn assign_id(&self, id: ResourceId) {
        self.id.store(id.as_i64(), Ordering::SeqCst);
    }

    pub fn set_active_flag(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    fn mark_destroyed(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }
}

impl Resource for SimResource {
    fn id(&self) -> ResourceId {
        ResourceId(self.id.load(Ordering::SeqCst))
    }

    fn location(&self) -> Location {
        self.location.clone()
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// A call the lifecycle made into the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum HostCall {
    SetActive {
        resource_id: ResourceId,
        location: Location,
        active: bool,
    },
    Destroy {
        resource_id: ResourceId,
        location: Location,
        cause: DestroyCause,
    },
}

/// Host that records every call and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingHost {
    calls: Mutex<Vec<HostCall>>,
    resources: Mutex<HashMap<Location, Arc<SimResource>>>,
    granted: Mutex<HashSet<Actor>>,
    fail_destroy: AtomicBool,
    fail_activation: AtomicBool,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let the host update flags of `resource` when asked to.
    pub fn track(&self, resource: Arc<SimResource>) -> Result<()> {
        self.resources
            .lock()?
            .insert(resource.location.clone(), resource);
        Ok(())
    }

    /// Grants `actor` every capability on every resource.
    pub fn grant(&self, actor: impl Into<String>) -> Result<()> {
        self.granted.lock()?.insert(Actor::new(actor));
        Ok(())
    }

    pub fn fail_destroy(&self, fail: bool) {
        self.fail_destroy.store(fail, Ordering::SeqCst);
    }

    pub fn fail_activation(&self, fail: bool) {
        self.fail_activation.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Result<Vec<HostCall>> {
        Ok(self.calls.lock()?.clone())
    }

    pub fn destroy_count(&self) -> Result<usize> {
        Ok(self
            .calls
            .lock()?
            .iter()
            .filter(|call| matches!(call, HostCall::Destroy { .. }))
            .count())
    }

    /// Number of `set_active(active)` calls with the given flag.
    pub fn activation_count(&self, active: bool) -> Result<usize> {
        Ok(self
            .calls
            .lock()?
            .iter()
            .filter(|call| matches!(call, HostCall::SetActive { active: a, .. } if *a == active))
            .count())
    }
}

impl ResourceActivator for RecordingHost {
    fn set_active(&self, resource: &dyn Resource, active: bool) -> Result<()> {
        if self.fail_activation.load(Ordering::SeqCst) {
            return Err(CullError::Activation(format!(
                "host refused to set {} active={}",
                resource.location(),
                active
            )));
        }
        let location = resource.location();
        if let Some(tracked) = self.resources.lock()?.get(&location) {
            tracked.set_active_flag(active);
        }
        self.calls.lock()?.push(HostCall::SetActive {
            resource_id: resource.id(),
            location,
            active,
        });
        Ok(())
    }
}

impl ResourceDestroyer for RecordingHost {
    fn destroy(&self, resource: &dyn Resource, cause: DestroyCause) -> Result<()> {
        if self.fail_destroy.load(Ordering::SeqCst) {
            return Err(CullError::Destruction(format!(
                "host refused to destroy {}",
                resource.location()
            )));
        }
        let location = resource.location();
        if let Some(tracked) = self.resources.lock()?.get(&location) {
            tracked.mark_destroyed();
        }
        self.calls.lock()?.push(HostCall::Destroy {
            resource_id: resource.id(),
            location,
            cause,
        });
        Ok(())
    }
}

impl PermissionCheck for RecordingHost {
    fn has_permission(&self, _resource: &dyn Resource, actor: &Actor, _capability: &Capability) -> bool {
        self.granted
            .lock()
            .map(|granted| granted.contains(actor))
            .unwrap_or(false)
    }
}

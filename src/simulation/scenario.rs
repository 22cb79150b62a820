use super::host::{HostCall, RecordingHost, SimResource};
use crate::collaborators::{MemoryActivityStore, Resource};
use crate::config::CullingPolicy;
use crate::core::{CullError, LifecycleId, Location, ManualClock, Millis, ResourceId, Result};
use crate::lifecycle::{ResourceEvent, Transition};
use crate::scheduler::{CullManager, CullTotals, FlushReport, LifecycleSnapshot, TickReport};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

fn default_true() -> bool {
    true
}

/// A resource present when the scenario starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResource {
    pub name: String,
    /// Storage id; omitted for resources that were never saved.
    #[serde(default)]
    pub id: Option<i64>,
    pub location: Location,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    /// Previously stored last activity.
    #[serde(default)]
    pub last_activity: Option<Millis>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScenarioAction {
    Tick,
    Flush,
    Event { resource: String, event: ResourceEvent },
    FailDestroy { fail: bool },
    FailActivation { fail: bool },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioStep {
    pub at: Millis,
    #[serde(flatten)]
    pub action: ScenarioAction,
}

/// A timed script replayed against a manual clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub policy: CullingPolicy,
    #[serde(default)]
    pub start: Millis,
    /// Actors whose activity counts.
    #[serde(default)]
    pub grants: Vec<String>,
    pub resources: Vec<ScenarioResource>,
    pub steps: Vec<ScenarioStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Tick(TickReport),
    Flush(FlushReport),
    Event {
        resource: String,
        transition: Option<Transition>,
    },
    Failed {
        error: String,
    },
    Configured,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedOutcome {
    pub at: Millis,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub steps: Vec<TimedOutcome>,
    pub calls: Vec<HostCall>,
    pub remaining: Vec<LifecycleSnapshot>,
    pub totals: CullTotals,
}

impl Scenario {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|err| CullError::Scenario(format!("scenario json: {}", err)))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|err| CullError::Scenario(format!("read {}: {}", path.display(), err)))?;
        Self::from_json_str(&text)
    }

    /// Rejects duplicate resource names and steps that go back in time.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for declared in &self.resources {
            if !names.insert(declared.name.as_str()) {
                return Err(CullError::Scenario(format!(
                    "duplicate resource name '{}'",
                    declared.name
                )));
            }
        }

        let mut last_at = self.start;
        for step in &self.steps {
            if step.at < last_at {
                return Err(CullError::Scenario(format!(
                    "step at {} goes back in time (previous {})",
                    step.at, last_at
                )));
            }
            last_at = step.at;
        }
        Ok(())
    }

    /// Validates, then replays the steps in order.
    pub fn run(&self) -> Result<ScenarioReport> {
        self.validate()?;

        let clock = Arc::new(ManualClock::new(self.start));
        let host = Arc::new(RecordingHost::new());
        for actor in &self.grants {
            host.grant(actor.clone())?;
        }

        let store = Arc::new(MemoryActivityStore::with_entries(
            self.resources.iter().filter_map(|resource| {
                match (resource.id, resource.last_activity) {
                    (Some(id), Some(last)) => Some((ResourceId(id), last)),
                    _ => None,
                }
            }),
        ));

        let manager = CullManager::new(store, host.clone(), host.clone(), host.clone(), clock.clone())
            .with_policy(self.policy.clone())?;

        let mut handles: HashMap<String, (LifecycleId, Arc<SimResource>)> = HashMap::new();
        for declared in &self.resources {
            let id = declared.id.map(ResourceId).unwrap_or(ResourceId::TRANSIENT);
            let sim = SimResource::new(id, declared.location.clone());
            sim.set_active_flag(declared.active);
            let sim = Arc::new(sim);
            host.track(sim.clone())?;

            let resource: Arc<dyn Resource> = sim.clone();
            let lifecycle_id = match &declared.class {
                Some(class) => manager.register_class(&resource, class)?,
                None => manager.register(&resource)?,
            };
            handles.insert(declared.name.clone(), (lifecycle_id, sim));
        }

        let mut steps = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            clock.set(step.at);

            let outcome = match &step.action {
                ScenarioAction::Tick => StepOutcome::Tick(manager.tick(step.at)?),
                ScenarioAction::Flush => StepOutcome::Flush(manager.flush()?),
                ScenarioAction::FailDestroy { fail } => {
                    host.fail_destroy(*fail);
                    StepOutcome::Configured
                }
                ScenarioAction::FailActivation { fail } => {
                    host.fail_activation(*fail);
                    StepOutcome::Configured
                }
                ScenarioAction::Event { resource, event } => {
                    let (lifecycle_id, _) = handles.get(resource).ok_or_else(|| {
                        CullError::Scenario(format!("unknown resource '{}'", resource))
                    })?;
                    match manager.handle_event(*lifecycle_id, event) {
                        Ok(transition) => StepOutcome::Event {
                            resource: resource.clone(),
                            transition,
                        },
                        Err(err) => StepOutcome::Failed {
                            error: err.to_string(),
                        },
                    }
                }
            };
            steps.push(TimedOutcome {
                at: step.at,
                outcome,
            });
        }

        Ok(ScenarioReport {
            steps,
            calls: host.calls()?,
            remaining: manager.snapshots()?,
            totals: manager.totals()?,
        })
    }
}

//! Self-contained host for exercising the lifecycle without a real world:
//! resources, collaborators that record their calls, and scripted scenarios.

pub mod host;
pub mod scenario;

pub use host::{HostCall, RecordingHost, SimResource};
pub use scenario::{Scenario, ScenarioAction, ScenarioReport, ScenarioResource, ScenarioStep, StepOutcome};

//! Orchestrator: turns a validated configuration into running capability
//! servers and runtime objects for the coordinating runtime.
//!
//! Startup sequence:
//! 1. resolve and instantiate a provider for every unit with a capability type
//! 2. launch the providers' servers through the supervisor and wait for readiness
//! 3. apply the [`StartupPolicy`]
//! 4. compose a [`ComposedSet`] and attach it to the [`CoordinatingRuntime`]

mod compose;
mod error;
mod orchestrator;
mod runtime;

pub use compose::{ComposedSet, RuntimeGroup, RuntimeMember, RuntimeUnit};
pub use error::{AttachError, FailedUnit, OrchestratorError};
pub use orchestrator::{Orchestrator, RunHandle, ShutdownTrigger, StartupPolicy};
pub use runtime::CoordinatingRuntime;

use std::fmt;

use hub_registry::RegistryError;
use hub_supervisor::SupervisorError;
use thiserror::Error;

/// A unit that could not be brought up, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedUnit {
    pub unit: String,
    pub reason: String,
}

impl FailedUnit {
    pub(crate) fn new(unit: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self {
            unit: unit.into(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for FailedUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.unit, self.reason)
    }
}

/// The coordinating runtime refused a composed set.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct AttachError(pub String);

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("startup failed for {} unit{}:{}", .failed_units.len(), plural(.failed_units.len()), bullet_list(.failed_units))]
    StartupFailed { failed_units: Vec<FailedUnit> },

    #[error("startup cancelled by shutdown request")]
    Cancelled,

    #[error("coordinating runtime rejected the composition: {0}")]
    Attach(#[from] AttachError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("supervisor error: {0}")]
    Supervisor(#[from] SupervisorError),
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

fn bullet_list(failed: &[FailedUnit]) -> String {
    failed.iter().map(|f| format!("\n  - {f}")).collect()
}

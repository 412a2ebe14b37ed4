//! Process supervisor: launches capability servers, confirms readiness,
//! detects crashes and stops everything on request.

mod error;
mod readiness;
mod record;
mod runtime;
mod signal;

pub use error::{ProcessError, SupervisorError};
pub use record::{ProcessEvent, ProcessRecord, ProcessState, StartOutcome};
pub use runtime::{Supervisor, SupervisorConfig};

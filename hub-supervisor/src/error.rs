use std::time::Duration;

use thiserror::Error;

/// Misuse of the supervisor itself.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("unit '{0}' is already supervised")]
    AlreadySupervised(String),

    #[error("supervisor is shutting down; refusing to start '{0}'")]
    ShuttingDown(String),
}

/// Why a supervised process ended up `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    #[error("launch failed: {0}")]
    LaunchFailed(String),

    #[error("not ready after {}ms", .after.as_millis())]
    ReadinessTimeout { after: Duration },

    #[error("exited during startup ({})", exit_label(.code))]
    ExitedDuringStartup { code: Option<i32> },

    #[error("exited unexpectedly ({})", exit_label(.code))]
    Exited { code: Option<i32> },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "killed by signal".to_string(),
    }
}

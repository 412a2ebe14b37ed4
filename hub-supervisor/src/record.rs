//! Process records and the events emitted when they change.

use chrono::{DateTime, Utc};

use crate::error::ProcessError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessState {
    Pending,
    Starting,
    Ready,
    Failed(ProcessError),
    Stopped,
}

impl ProcessState {
    /// `Ready`, `Failed` or `Stopped`: startup has concluded.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            ProcessState::Ready | ProcessState::Failed(_) | ProcessState::Stopped
        )
    }

    /// A child may still be running.
    pub fn is_live(&self) -> bool {
        matches!(self, ProcessState::Starting | ProcessState::Ready)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProcessState::Pending => "pending",
            ProcessState::Starting => "starting",
            ProcessState::Ready => "ready",
            ProcessState::Failed(_) => "failed",
            ProcessState::Stopped => "stopped",
        }
    }
}

/// One supervised child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    pub unit_name: String,
    pub launch_command: String,
    pub pid: Option<u32>,
    pub state: ProcessState,
    pub started_at: Option<DateTime<Utc>>,
}

impl ProcessRecord {
    pub(crate) fn pending(unit_name: impl Into<String>, launch_command: String) -> Self {
        Self {
            unit_name: unit_name.into(),
            launch_command,
            pid: None,
            state: ProcessState::Pending,
            started_at: None,
        }
    }

    pub fn last_error(&self) -> Option<&ProcessError> {
        match &self.state {
            ProcessState::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Result of one record's startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOutcome {
    pub unit_name: String,
    pub state: ProcessState,
}

impl StartOutcome {
    pub fn is_ready(&self) -> bool {
        self.state == ProcessState::Ready
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Ready { unit: String },
    Failed { unit: String, error: ProcessError },
    Stopped { unit: String },
}

impl ProcessEvent {
    pub fn unit(&self) -> &str {
        match self {
            ProcessEvent::Ready { unit }
            | ProcessEvent::Failed { unit, .. }
            | ProcessEvent::Stopped { unit } => unit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settled_and_live_states() {
        assert!(!ProcessState::Pending.is_settled());
        assert!(!ProcessState::Starting.is_settled());
        assert!(ProcessState::Ready.is_settled());
        assert!(ProcessState::Stopped.is_settled());
        assert!(ProcessState::Failed(ProcessError::LaunchFailed("x".into())).is_settled());

        assert!(ProcessState::Starting.is_live());
        assert!(ProcessState::Ready.is_live());
        assert!(!ProcessState::Stopped.is_live());
    }

    #[test]
    fn last_error_only_when_failed() {
        let mut record = ProcessRecord::pending("a", "sh".into());
        assert!(record.last_error().is_none());
        record.state = ProcessState::Failed(ProcessError::Exited { code: Some(1) });
        assert_eq!(
            record.last_error(),
            Some(&ProcessError::Exited { code: Some(1) })
        );
    }
}

//! Error types for hub-core.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::SourcePosition;

/// One violated configuration invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationIssue {
    /// The description declares no units and no groups.
    #[error("at least one unit or group must be defined")]
    EmptyConfiguration,

    #[error("{position} has an empty name")]
    EmptyName { position: SourcePosition },

    /// Two entries share a name; units and groups share one namespace.
    #[error("duplicate name '{name}' at {first} and {second}")]
    DuplicateName {
        name: String,
        first: SourcePosition,
        second: SourcePosition,
    },

    /// Two capability units would bind the same endpoint.
    #[error("endpoint {host}:{port} is claimed by several units: {}", .units.join(", "))]
    EndpointConflict {
        host: String,
        port: u16,
        units: Vec<String>,
    },

    #[error("unit '{unit}' declares a capability type but no port")]
    MissingEndpoint { unit: String },

    #[error("unit '{unit}' declares an endpoint but no capability type")]
    UnexpectedEndpoint { unit: String },

    #[error("group '{group}' must have at least one member")]
    EmptyGroup { group: String },

    #[error("group '{group}' references unknown member '{member}'")]
    UnresolvedReference { group: String, member: String },

    /// Full cycle path, first element repeated at the end.
    #[error("cyclic group reference: {}", .cycle.join(" -> "))]
    CyclicGroup { cycle: Vec<String> },

    #[error("setting {name}={value:?} is not valid")]
    InvalidSetting { name: String, value: String },
}

/// Aggregate report of every invariant a description violates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub(crate) fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn into_issues(self) -> Vec<ValidationIssue> {
        self.issues
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid configuration ({} issue", self.issues.len())?;
        if self.issues.len() != 1 {
            write!(f, "s")?;
        }
        write!(f, ")")?;
        for issue in &self.issues {
            write!(f, "\n  - {issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Errors from reading a configuration file or resolving settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error, with file path and serde_yaml's line context.
    #[error("failed to parse configuration at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("configuration file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("configuration file is empty: {path}")]
    Empty { path: PathBuf },

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("no model API key configured; set one of: {}", .checked.join(", "))]
    NoModelCredential { checked: Vec<String> },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_lists_every_issue() {
        let err = ValidationError::new(vec![
            ValidationIssue::EmptyGroup {
                group: "team".into(),
            },
            ValidationIssue::CyclicGroup {
                cycle: vec!["a".into(), "b".into(), "a".into()],
            },
        ]);
        let msg = err.to_string();
        assert!(msg.starts_with("invalid configuration (2 issues)"), "{msg}");
        assert!(msg.contains("group 'team' must have at least one member"));
        assert!(msg.contains("a -> b -> a"));
    }

    #[test]
    fn endpoint_conflict_names_units() {
        let issue = ValidationIssue::EndpointConflict {
            host: "localhost".into(),
            port: 8001,
            units: vec!["a".into(), "c".into()],
        };
        assert_eq!(
            issue.to_string(),
            "endpoint localhost:8001 is claimed by several units: a, c"
        );
    }

    #[test]
    fn home_not_found_error_message() {
        assert!(ConfigError::HomeNotFound.to_string().contains("home directory"));
    }
}

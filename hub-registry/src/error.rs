//! Error types for hub-registry.

use std::path::PathBuf;

use thiserror::Error;

/// Failures while resolving a capability type to a factory.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No installed package advertises this capability type.
    #[error("capability type '{capability_type}' not found (available: {})", available_list(.available))]
    NotFound {
        capability_type: String,
        available: Vec<String>,
    },

    /// The advertising package failed to produce a factory.
    #[error("provider package '{package}' failed to load '{capability_type}': {source}")]
    Load {
        package: String,
        capability_type: String,
        #[source]
        source: ProviderError,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Provider manifest parse error, with path + serde_yaml line context.
    #[error("failed to parse provider manifest at {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Failures inside a provider: instantiation, invocation or teardown.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// Credentials or other settings the provider needs are unset.
    #[error("unit '{unit}' ({capability_type}) is missing settings: {}", .missing.join(", "))]
    MissingSettings {
        unit: String,
        capability_type: String,
        missing: Vec<String>,
    },

    #[error("invalid provider definition for '{capability_type}': {message}")]
    InvalidDefinition {
        capability_type: String,
        message: String,
    },

    #[error("unit '{unit}' has no endpoint; capability servers need one")]
    MissingEndpoint { unit: String },

    #[error("unit '{unit}' does not support operation '{operation}'")]
    UnsupportedOperation { unit: String, operation: String },

    /// Operations of process-backed units are reached over the network by
    /// the coordinating runtime, not in-process.
    #[error("unit '{unit}' is served at {endpoint}; invoke it through the coordinating runtime")]
    Remote { unit: String, endpoint: String },

    #[error("operation '{operation}' on unit '{unit}' failed: {message}")]
    Operation {
        unit: String,
        operation: String,
        message: String,
    },

    #[error("teardown of unit '{unit}' failed: {message}")]
    Teardown { unit: String, message: String },
}

fn available_list(available: &[String]) -> String {
    if available.is_empty() {
        "none".to_string()
    } else {
        available.join(", ")
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RegistryError {
    RegistryError::Io {
        path: path.into(),
        source,
    }
}

//! Raw, already-decoded configuration description.
//!
//! This is what an external loader hands to [`crate::config::load`]. Field
//! names follow the hub's own vocabulary; the legacy `agents`/`teams` spelling
//! is accepted through serde aliases so existing `agents.yaml` files load
//! unchanged.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::{HistorySettings, ModelOverride};

/// Root of a configuration description.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawDescription {
    #[serde(alias = "agents")]
    pub units: Vec<RawUnit>,
    #[serde(alias = "teams")]
    pub groups: Vec<RawGroup>,
    pub defaults: RawDefaults,
}

/// One unit entry, as written.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawUnit {
    pub name: String,
    pub description: String,
    #[serde(alias = "plugin_type", skip_serializing_if = "Option::is_none")]
    pub capability_type: Option<String>,
    #[serde(alias = "mcp_host", skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(alias = "mcp_port", skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(alias = "instructions")]
    pub directives: Vec<String>,
    #[serde(alias = "model_override", skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelOverride>,
    #[serde(alias = "timeout", skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<HistorySettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_mode: Option<bool>,
}

/// One group entry, as written.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawGroup {
    pub name: String,
    pub description: String,
    #[serde(alias = "members")]
    pub member_refs: Vec<String>,
    #[serde(alias = "instructions")]
    pub directives: Vec<String>,
    #[serde(alias = "model_override", skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelOverride>,
}

/// Explicit process-wide defaults; anything left out falls back to settings,
/// then to built-ins.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawDefaults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(alias = "db_file", skip_serializing_if = "Option::is_none")]
    pub state_path: Option<PathBuf>,
    #[serde(alias = "agentos_port", skip_serializing_if = "Option::is_none")]
    pub runtime_port: Option<u16>,
}

impl RawUnit {
    /// Shorthand used by tests and embedders: a capability unit on `port`.
    pub fn capability(name: &str, capability_type: &str, port: u16) -> Self {
        Self {
            name: name.to_string(),
            capability_type: Some(capability_type.to_string()),
            port: Some(port),
            ..Self::default()
        }
    }

    /// A unit with no dedicated process.
    pub fn generic(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

impl RawGroup {
    pub fn new(name: &str, members: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            member_refs: members.iter().map(|m| m.to_string()).collect(),
            ..Self::default()
        }
    }
}

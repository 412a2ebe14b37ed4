//! Domain types for the hub configuration model.
//!
//! Everything here is immutable once [`crate::config::load`] has produced a
//! [`crate::Configuration`]; the raw, user-facing shape lives in [`crate::raw`].

use std::borrow::Borrow;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A name in the global unit/group namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityName(pub String);

impl EntityName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for EntityName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EntityName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl Borrow<str> for EntityName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Network address a capability server binds to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which half of the namespace an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Unit,
    Group,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Unit => write!(f, "unit"),
            EntityKind::Group => write!(f, "group"),
        }
    }
}

/// Where an entry sits in the source description (`units[2]`, `groups[0]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SourcePosition {
    pub kind: EntityKind,
    pub index: usize,
}

impl SourcePosition {
    pub fn unit(index: usize) -> Self {
        Self {
            kind: EntityKind::Unit,
            index,
        }
    }

    pub fn group(index: usize) -> Self {
        Self {
            kind: EntityKind::Group,
            index,
        }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EntityKind::Unit => write!(f, "units[{}]", self.index),
            EntityKind::Group => write!(f, "groups[{}]", self.index),
        }
    }
}

/// Model override: either a bare model name (keeps the default provider) or
/// an explicit provider/model pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelOverride {
    Name(String),
    Explicit { provider: String, model: String },
}

// ---------------------------------------------------------------------------
// Per-entity settings
// ---------------------------------------------------------------------------

/// Conversation-history tuning, carried per unit instead of process-wide.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HistorySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_runs: Option<u32>,
    #[serde(default)]
    pub add_to_context: bool,
}

/// Settings that supersede process-wide defaults for one unit or group.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Overrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelOverride>,
    /// Provider call timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<HistorySettings>,
}

/// Boolean toggles with defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFlags {
    pub markdown: bool,
    pub debug_mode: bool,
}

impl Default for UnitFlags {
    fn default() -> Self {
        Self {
            markdown: true,
            debug_mode: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// A named, independently addressable capability consumer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Unit {
    pub name: EntityName,
    pub description: String,
    /// `None` means no dedicated child process.
    pub capability_type: Option<String>,
    /// Present exactly when `capability_type` is.
    pub endpoint: Option<Endpoint>,
    /// Order-significant.
    pub directives: Vec<String>,
    pub overrides: Overrides,
    pub flags: UnitFlags,
}

impl Unit {
    /// Whether this unit needs a dedicated capability server.
    pub fn requires_process(&self) -> bool {
        self.capability_type.is_some()
    }
}

/// A named, ordered collection of units and/or groups.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    pub name: EntityName,
    pub description: String,
    pub member_refs: Vec<EntityName>,
    pub directives: Vec<String>,
    pub overrides: Overrides,
}

/// Process-wide defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Defaults {
    /// Host used by capability units that omit one.
    pub host: String,
    /// Where the coordinating runtime persists its state.
    pub state_path: PathBuf,
    /// Port the coordinating runtime listens on.
    pub runtime_port: u16,
}

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_STATE_PATH: &str = "agent_hub.db";
pub const DEFAULT_RUNTIME_PORT: u16 = 8000;

impl Default for Defaults {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            state_path: PathBuf::from(DEFAULT_STATE_PATH),
            runtime_port: DEFAULT_RUNTIME_PORT,
        }
    }
}

/// A resolved group member.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Member<'a> {
    Unit(&'a Unit),
    Group(&'a Group),
}

impl<'a> Member<'a> {
    pub fn name(&self) -> &'a EntityName {
        match self {
            Member::Unit(unit) => &unit.name,
            Member::Group(group) => &group.name,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Member::Unit(_) => EntityKind::Unit,
            Member::Group(_) => EntityKind::Group,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtype_display() {
        assert_eq!(EntityName::from("team").to_string(), "team");
        assert_eq!(Endpoint::new("localhost", 8001).to_string(), "localhost:8001");
    }

    #[test]
    fn entity_name_borrows_as_str() {
        let mut map = std::collections::HashMap::new();
        map.insert(EntityName::from("a"), 1);
        assert_eq!(map.get("a"), Some(&1));
    }

    #[test]
    fn source_position_display() {
        assert_eq!(SourcePosition::unit(2).to_string(), "units[2]");
        assert_eq!(SourcePosition::group(0).to_string(), "groups[0]");
    }

    #[test]
    fn flags_default_to_markdown_on() {
        let flags = UnitFlags::default();
        assert!(flags.markdown);
        assert!(!flags.debug_mode);
    }

    #[test]
    fn model_override_accepts_bare_name_and_pair() {
        let bare: ModelOverride = serde_yaml::from_str("gpt-4o").expect("bare");
        assert_eq!(bare, ModelOverride::Name("gpt-4o".into()));

        let pair: ModelOverride =
            serde_yaml::from_str("provider: xai\nmodel: grok-4").expect("pair");
        assert_eq!(
            pair,
            ModelOverride::Explicit {
                provider: "xai".into(),
                model: "grok-4".into()
            }
        );
    }
}

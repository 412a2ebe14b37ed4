//! Hub core library: configuration model, validation, settings.
//!
//! Public API surface:
//! - [`types`]: units, groups, endpoints, defaults
//! - [`raw`]: the undecorated description handed to [`load`]
//! - [`config`]: [`load`] / [`load_with_settings`] and [`Configuration`]
//! - [`settings`]: opaque settings, env-derived defaults, model selection
//! - [`launch`]: launch specs shared by providers and the supervisor
//! - [`source`]: YAML file reader
//! - [`error`]: [`ValidationError`], [`ConfigError`]

pub mod config;
pub mod error;
pub mod launch;
pub mod paths;
pub mod raw;
pub mod settings;
pub mod source;
pub mod types;

pub use config::{load, load_with_settings, Configuration};
pub use error::{ConfigError, ValidationError, ValidationIssue};
pub use launch::{LaunchSpec, ReadinessProbe};
pub use raw::{RawDefaults, RawDescription, RawGroup, RawUnit};
pub use settings::{default_model, ModelSelection, Settings};
pub use types::{
    Defaults, Endpoint, EntityKind, EntityName, Group, HistorySettings, Member, ModelOverride,
    Overrides, SourcePosition, Unit, UnitFlags,
};

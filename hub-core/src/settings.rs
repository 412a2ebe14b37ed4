//! Environment-style settings and the defaults derived from them.
//!
//! The hub never inspects credential values; it only checks presence and
//! passes the map through to providers.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::{ConfigError, ValidationIssue};
use crate::raw::RawDefaults;
use crate::types::{Defaults, ModelOverride, DEFAULT_HOST, DEFAULT_RUNTIME_PORT, DEFAULT_STATE_PATH};

pub const HOST_SETTING: &str = "MCP_HOST";
pub const STATE_PATH_SETTING: &str = "DB_FILE";
pub const RUNTIME_PORT_SETTING: &str = "AGENTOS_PORT";

/// Opaque name → value settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Settings(BTreeMap<String, String>);

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current process environment.
    /// Variables that are not valid UTF-8 are skipped.
    pub fn from_env() -> Self {
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Value of `name`; empty strings count as unset.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Names from `required` that are unset, in the order given.
    pub fn missing<S: AsRef<str>>(&self, required: &[S]) -> Vec<String> {
        required
            .iter()
            .map(AsRef::as_ref)
            .filter(|name| !self.contains(name))
            .map(str::to_string)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Settings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl Defaults {
    /// Explicit description values win, then settings, then built-ins.
    pub(crate) fn resolve(
        raw: &RawDefaults,
        settings: &Settings,
        issues: &mut Vec<ValidationIssue>,
    ) -> Self {
        let host = raw
            .host
            .clone()
            .or_else(|| settings.get(HOST_SETTING).map(str::to_string))
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let state_path = raw
            .state_path
            .clone()
            .or_else(|| settings.get(STATE_PATH_SETTING).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_PATH));

        let runtime_port = match raw.runtime_port {
            Some(port) => port,
            None => match settings.get(RUNTIME_PORT_SETTING) {
                Some(value) => value.parse().unwrap_or_else(|_| {
                    issues.push(ValidationIssue::InvalidSetting {
                        name: RUNTIME_PORT_SETTING.to_string(),
                        value: value.to_string(),
                    });
                    DEFAULT_RUNTIME_PORT
                }),
                None => DEFAULT_RUNTIME_PORT,
            },
        };

        Self {
            host,
            state_path,
            runtime_port,
        }
    }
}

// ---------------------------------------------------------------------------
// Model selection
// ---------------------------------------------------------------------------

/// Provider + model pair handed to the coordinating runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSelection {
    pub provider: String,
    pub model: String,
}

impl ModelSelection {
    /// Apply a unit or group override on top of this default.
    pub fn with_override(&self, model_override: Option<&ModelOverride>) -> ModelSelection {
        match model_override {
            None => self.clone(),
            Some(ModelOverride::Name(model)) => ModelSelection {
                provider: self.provider.clone(),
                model: model.clone(),
            },
            Some(ModelOverride::Explicit { provider, model }) => ModelSelection {
                provider: provider.clone(),
                model: model.clone(),
            },
        }
    }
}

/// (provider, credential setting, model setting, fallback model), in priority order.
const MODEL_PROVIDERS: &[(&str, &str, &str, &str)] = &[
    ("mistral", "MISTRAL_API_KEY", "MISTRAL_MODEL", "mistral-large-2512"),
    ("xai", "XAI_API_KEY", "XAI_MODEL", "grok-4-1-fast-reasoning"),
    ("openai", "OPENAI_API_KEY", "OPENAI_MODEL", "gpt-4o-mini"),
];

/// Pick the default reasoning model from whichever credential is present.
pub fn default_model(settings: &Settings) -> Result<ModelSelection, ConfigError> {
    for &(provider, key, model_setting, fallback) in MODEL_PROVIDERS {
        if settings.contains(key) {
            return Ok(ModelSelection {
                provider: provider.to_string(),
                model: settings.get(model_setting).unwrap_or(fallback).to_string(),
            });
        }
    }
    Err(ConfigError::NoModelCredential {
        checked: MODEL_PROVIDERS.iter().map(|(_, key, _, _)| key.to_string()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn empty_values_count_as_missing() {
        let settings = Settings::new().with("A", "").with("B", "x");
        assert_eq!(settings.missing(&["A", "B", "C"]), vec!["A", "C"]);
    }

    #[rstest]
    #[case(&[("OPENAI_API_KEY", "k")], "openai", "gpt-4o-mini")]
    #[case(&[("OPENAI_API_KEY", "k"), ("XAI_API_KEY", "k")], "xai", "grok-4-1-fast-reasoning")]
    #[case(&[("XAI_API_KEY", "k"), ("MISTRAL_API_KEY", "k"), ("MISTRAL_MODEL", "mistral-small")], "mistral", "mistral-small")]
    fn default_model_follows_priority(
        #[case] vars: &[(&str, &str)],
        #[case] provider: &str,
        #[case] model: &str,
    ) {
        let settings: Settings = vars.iter().copied().collect();
        let selection = default_model(&settings).expect("selection");
        assert_eq!(selection.provider, provider);
        assert_eq!(selection.model, model);
    }

    #[test]
    fn default_model_without_credentials_names_all_keys() {
        let err = default_model(&Settings::new()).unwrap_err();
        let msg = err.to_string();
        for key in ["MISTRAL_API_KEY", "XAI_API_KEY", "OPENAI_API_KEY"] {
            assert!(msg.contains(key), "{msg}");
        }
    }

    #[test]
    fn override_by_name_keeps_provider() {
        let base = ModelSelection {
            provider: "mistral".into(),
            model: "mistral-large-2512".into(),
        };
        let picked = base.with_override(Some(&ModelOverride::Name("mistral-small".into())));
        assert_eq!(picked.provider, "mistral");
        assert_eq!(picked.model, "mistral-small");
    }

    #[test]
    fn defaults_prefer_description_then_settings() {
        let settings = Settings::new()
            .with(HOST_SETTING, "10.0.0.5")
            .with(RUNTIME_PORT_SETTING, "9000");
        let raw = RawDefaults {
            host: Some("0.0.0.0".into()),
            ..RawDefaults::default()
        };
        let mut issues = Vec::new();
        let defaults = Defaults::resolve(&raw, &settings, &mut issues);
        assert!(issues.is_empty());
        assert_eq!(defaults.host, "0.0.0.0");
        assert_eq!(defaults.runtime_port, 9000);
        assert_eq!(defaults.state_path, PathBuf::from(DEFAULT_STATE_PATH));
    }

    #[test]
    fn unparsable_port_setting_is_an_issue() {
        let settings = Settings::new().with(RUNTIME_PORT_SETTING, "eighty");
        let mut issues = Vec::new();
        let defaults = Defaults::resolve(&RawDefaults::default(), &settings, &mut issues);
        assert_eq!(defaults.runtime_port, DEFAULT_RUNTIME_PORT);
        assert!(matches!(
            issues.as_slice(),
            [ValidationIssue::InvalidSetting { .. }]
        ));
    }
}

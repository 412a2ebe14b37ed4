//! Provider seams: packages advertise capability types, factories build
//! per-unit providers, providers describe their process and surface.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hub_core::{Endpoint, LaunchSpec, Settings, Unit};

use crate::error::{ProviderError, RegistryError};
use crate::surface::CapabilitySurface;

/// Per-call timeout when a unit does not override it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Immutable inputs handed to one factory call. Each provider gets its own
/// value; nothing is shared or mutated between units.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    unit: Unit,
    settings: Arc<Settings>,
}

impl ProviderSettings {
    pub fn new(unit: Unit, settings: Arc<Settings>) -> Self {
        Self { unit, settings }
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    pub fn unit_name(&self) -> &str {
        self.unit.name.as_str()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.unit.endpoint.as_ref()
    }

    /// The unit's timeout override, or [`DEFAULT_TIMEOUT`]. Non-positive
    /// or unrepresentable overrides fall back to the default.
    pub fn timeout(&self) -> Duration {
        self.unit
            .overrides
            .timeout_secs
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Fail with [`ProviderError::MissingSettings`] unless every name is set.
    pub fn require<S: AsRef<str>>(
        &self,
        capability_type: &str,
        names: &[S],
    ) -> Result<(), ProviderError> {
        let missing = self.settings.missing(names);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ProviderError::MissingSettings {
                unit: self.unit_name().to_string(),
                capability_type: capability_type.to_string(),
                missing,
            })
        }
    }
}

/// Builds providers for one capability type.
pub trait ProviderFactory: Send + Sync {
    fn capability_type(&self) -> &str;

    fn instantiate(&self, settings: ProviderSettings) -> Result<Box<dyn Provider>, ProviderError>;
}

impl fmt::Debug for dyn ProviderFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderFactory")
            .field("capability_type", &self.capability_type())
            .finish()
    }
}

/// One instantiated capability backing a unit.
#[async_trait]
pub trait Provider: Send + Sync {
    /// How to start the capability server; `None` for in-process providers.
    fn launch_spec(&self) -> Option<LaunchSpec>;

    fn surface(&self) -> Arc<dyn CapabilitySurface>;

    async fn teardown(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// An installed provider package.
pub trait ProviderPackage: Send + Sync {
    fn name(&self) -> &str;

    /// Capability types this package can serve. Must be cheap: the registry
    /// calls it during enumeration, before anything is loaded.
    fn advertised(&self) -> Vec<String>;

    fn load(&self, capability_type: &str) -> Result<Arc<dyn ProviderFactory>, ProviderError>;
}

/// Enumerates installed provider packages.
pub trait ProviderDiscovery: Send + Sync {
    fn discover(&self) -> Result<Vec<Arc<dyn ProviderPackage>>, RegistryError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_core::{Overrides, UnitFlags};

    fn unit(timeout_secs: Option<f64>) -> Unit {
        Unit {
            name: "scout".into(),
            description: String::new(),
            capability_type: Some("search".into()),
            endpoint: Some(Endpoint::new("localhost", 8001)),
            directives: vec![],
            overrides: Overrides {
                timeout_secs,
                ..Overrides::default()
            },
            flags: UnitFlags::default(),
        }
    }

    #[test]
    fn timeout_prefers_positive_override() {
        let settings = Arc::new(Settings::new());
        assert_eq!(
            ProviderSettings::new(unit(None), settings.clone()).timeout(),
            DEFAULT_TIMEOUT
        );
        assert_eq!(
            ProviderSettings::new(unit(Some(2.5)), settings.clone()).timeout(),
            Duration::from_millis(2500)
        );
        assert_eq!(
            ProviderSettings::new(unit(Some(-1.0)), settings).timeout(),
            DEFAULT_TIMEOUT
        );
    }

    #[test]
    fn require_names_every_missing_setting() {
        let settings = Arc::new(Settings::new().with("SERPAPI_KEY", "k"));
        let ctx = ProviderSettings::new(unit(None), settings);
        assert!(ctx.require("search", &["SERPAPI_KEY"]).is_ok());

        let err = ctx
            .require("search", &["SERPAPI_KEY", "X_TOKEN", "X_SECRET"])
            .unwrap_err();
        assert_eq!(
            err,
            ProviderError::MissingSettings {
                unit: "scout".into(),
                capability_type: "search".into(),
                missing: vec!["X_TOKEN".into(), "X_SECRET".into()],
            }
        );
    }
}

//! Provider packages compiled into the host binary.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use hub_core::LaunchSpec;

use crate::error::{ProviderError, RegistryError};
use crate::provider::{Provider, ProviderDiscovery, ProviderFactory, ProviderPackage, ProviderSettings};
use crate::surface::{CapabilitySurface, FnSurface};

/// Discovery over a fixed list of packages.
#[derive(Default, Clone)]
pub struct StaticDiscovery {
    packages: Vec<Arc<dyn ProviderPackage>>,
}

impl StaticDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, package: impl ProviderPackage + 'static) -> Self {
        self.packages.push(Arc::new(package));
        self
    }
}

impl ProviderDiscovery for StaticDiscovery {
    fn discover(&self) -> Result<Vec<Arc<dyn ProviderPackage>>, RegistryError> {
        Ok(self.packages.clone())
    }
}

/// Chains several discoveries; earlier ones take precedence on duplicate
/// capability types.
#[derive(Default)]
pub struct ChainedDiscovery {
    sources: Vec<Box<dyn ProviderDiscovery>>,
}

impl ChainedDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: impl ProviderDiscovery + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }
}

impl ProviderDiscovery for ChainedDiscovery {
    fn discover(&self) -> Result<Vec<Arc<dyn ProviderPackage>>, RegistryError> {
        let mut packages = Vec::new();
        for source in &self.sources {
            packages.extend(source.discover()?);
        }
        Ok(packages)
    }
}

// ---------------------------------------------------------------------------
// In-process package
// ---------------------------------------------------------------------------

type SurfaceBuilder = Arc<dyn Fn(&ProviderSettings) -> FnSurface + Send + Sync>;

/// Package whose providers run inside the hub process.
#[derive(Clone)]
pub struct InProcessPackage {
    name: String,
    builders: BTreeMap<String, SurfaceBuilder>,
}

impl InProcessPackage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            builders: BTreeMap::new(),
        }
    }

    /// Serve `capability_type` with surfaces built by `build`.
    pub fn capability<F>(mut self, capability_type: impl Into<String>, build: F) -> Self
    where
        F: Fn(&ProviderSettings) -> FnSurface + Send + Sync + 'static,
    {
        self.builders.insert(capability_type.into(), Arc::new(build));
        self
    }
}

impl ProviderPackage for InProcessPackage {
    fn name(&self) -> &str {
        &self.name
    }

    fn advertised(&self) -> Vec<String> {
        self.builders.keys().cloned().collect()
    }

    fn load(&self, capability_type: &str) -> Result<Arc<dyn ProviderFactory>, ProviderError> {
        let build = self
            .builders
            .get(capability_type)
            .ok_or_else(|| ProviderError::InvalidDefinition {
                capability_type: capability_type.to_string(),
                message: format!("package '{}' does not serve it", self.name),
            })?;
        Ok(Arc::new(InProcessFactory {
            capability_type: capability_type.to_string(),
            build: Arc::clone(build),
        }))
    }
}

struct InProcessFactory {
    capability_type: String,
    build: SurfaceBuilder,
}

impl ProviderFactory for InProcessFactory {
    fn capability_type(&self) -> &str {
        &self.capability_type
    }

    fn instantiate(&self, settings: ProviderSettings) -> Result<Box<dyn Provider>, ProviderError> {
        Ok(Box::new(InProcessProvider {
            surface: Arc::new((self.build)(&settings)),
        }))
    }
}

struct InProcessProvider {
    surface: Arc<FnSurface>,
}

#[async_trait]
impl Provider for InProcessProvider {
    fn launch_spec(&self) -> Option<LaunchSpec> {
        None
    }

    fn surface(&self) -> Arc<dyn CapabilitySurface> {
        self.surface.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_core::{Settings, Unit, UnitFlags};
    use serde_json::{json, Value};

    fn settings_for(name: &str) -> ProviderSettings {
        let unit = Unit {
            name: name.into(),
            description: String::new(),
            capability_type: Some("clock".into()),
            endpoint: None,
            directives: vec![],
            overrides: Default::default(),
            flags: UnitFlags::default(),
        };
        ProviderSettings::new(unit, Arc::new(Settings::new()))
    }

    #[tokio::test]
    async fn in_process_provider_has_no_launch_spec() {
        let package = InProcessPackage::new("builtin").capability("clock", |ctx| {
            FnSurface::new(ctx.unit_name()).operation("now", |_| async { Ok(json!(0)) })
        });
        assert_eq!(package.advertised(), vec!["clock"]);

        let factory = package.load("clock").expect("load");
        let provider = factory.instantiate(settings_for("timer")).expect("instantiate");
        assert!(provider.launch_spec().is_none());

        let surface = provider.surface();
        assert_eq!(surface.unit(), "timer");
        assert_eq!(surface.invoke("now", Value::Null).await.expect("now"), json!(0));
    }

    #[test]
    fn chained_discovery_keeps_source_order() {
        let discovery = ChainedDiscovery::new()
            .with(StaticDiscovery::new().with(InProcessPackage::new("first")))
            .with(StaticDiscovery::new().with(InProcessPackage::new("second")));
        let names: Vec<String> = discovery
            .discover()
            .expect("discover")
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }
}

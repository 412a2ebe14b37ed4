//! Capability-type → factory resolution.
//!
//! Packages are enumerated once per registry. A package's factory is loaded
//! the first time a unit asks for one of its capability types, then cached.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::error::{ProviderError, RegistryError};
use crate::provider::{Provider, ProviderDiscovery, ProviderFactory, ProviderPackage, ProviderSettings};

type Packages = Arc<Vec<Arc<dyn ProviderPackage>>>;

/// One installed package and what it advertises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Advertisement {
    pub package: String,
    pub capability_types: Vec<String>,
    /// Capability types whose factory is already loaded.
    pub loaded: Vec<String>,
}

struct Loaded {
    package: String,
    factory: Arc<dyn ProviderFactory>,
}

pub struct CapabilityRegistry {
    discovery: Box<dyn ProviderDiscovery>,
    packages: Mutex<Option<Packages>>,
    factories: Mutex<HashMap<String, Loaded>>,
}

impl CapabilityRegistry {
    pub fn new(discovery: impl ProviderDiscovery + 'static) -> Self {
        Self {
            discovery: Box::new(discovery),
            packages: Mutex::new(None),
            factories: Mutex::new(HashMap::new()),
        }
    }

    /// Every advertised capability type, sorted. Loads nothing.
    pub fn available(&self) -> Result<Vec<String>, RegistryError> {
        Ok(advertised_types(&self.packages()?))
    }

    /// Installed packages in discovery order.
    pub fn advertisements(&self) -> Result<Vec<Advertisement>, RegistryError> {
        let packages = self.packages()?;
        let factories = lock(&self.factories);
        Ok(packages
            .iter()
            .map(|package| {
                let capability_types = package.advertised();
                let loaded = capability_types
                    .iter()
                    .filter(|t| {
                        factories
                            .get(t.as_str())
                            .is_some_and(|l| l.package == package.name())
                    })
                    .cloned()
                    .collect();
                Advertisement {
                    package: package.name().to_string(),
                    capability_types,
                    loaded,
                }
            })
            .collect())
    }

    /// Factory for `capability_type`, loading its package on first use.
    pub fn resolve(&self, capability_type: &str) -> Result<Arc<dyn ProviderFactory>, RegistryError> {
        let mut factories = lock(&self.factories);
        if let Some(loaded) = factories.get(capability_type) {
            return Ok(Arc::clone(&loaded.factory));
        }

        let packages = self.packages()?;
        let package = packages
            .iter()
            .find(|p| p.advertised().iter().any(|t| t == capability_type))
            .ok_or_else(|| RegistryError::NotFound {
                capability_type: capability_type.to_string(),
                available: advertised_types(&packages),
            })?;

        let factory = package
            .load(capability_type)
            .map_err(|source| RegistryError::Load {
                package: package.name().to_string(),
                capability_type: capability_type.to_string(),
                source,
            })?;
        tracing::info!(
            capability_type,
            package = package.name(),
            "loaded provider factory"
        );
        factories.insert(
            capability_type.to_string(),
            Loaded {
                package: package.name().to_string(),
                factory: Arc::clone(&factory),
            },
        );
        Ok(factory)
    }

    pub fn instantiate(
        &self,
        factory: &dyn ProviderFactory,
        settings: ProviderSettings,
    ) -> Result<Box<dyn Provider>, ProviderError> {
        tracing::debug!(
            unit = settings.unit_name(),
            capability_type = factory.capability_type(),
            "instantiating provider"
        );
        factory.instantiate(settings)
    }

    /// Capability types with a cached factory, sorted.
    pub fn loaded(&self) -> Vec<String> {
        let mut loaded: Vec<String> = lock(&self.factories).keys().cloned().collect();
        loaded.sort();
        loaded
    }

    fn packages(&self) -> Result<Packages, RegistryError> {
        let mut cached = lock(&self.packages);
        if let Some(packages) = cached.as_ref() {
            return Ok(Arc::clone(packages));
        }

        let packages = Arc::new(self.discovery.discover()?);
        let mut owners: HashMap<String, &str> = HashMap::new();
        for package in packages.iter() {
            for capability_type in package.advertised() {
                if let Some(owner) = owners.get(&capability_type) {
                    tracing::warn!(
                        capability_type = %capability_type,
                        kept = owner,
                        ignored = package.name(),
                        "capability type advertised twice; keeping the first package"
                    );
                } else {
                    owners.insert(capability_type, package.name());
                }
            }
        }
        tracing::debug!(packages = packages.len(), "enumerated provider packages");

        *cached = Some(Arc::clone(&packages));
        Ok(packages)
    }
}

fn advertised_types(packages: &[Arc<dyn ProviderPackage>]) -> Vec<String> {
    packages
        .iter()
        .flat_map(|p| p.advertised())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

//! Provider packages described by YAML manifests.
//!
//! Layout:
//! ```text
//! ~/.hub/providers/
//!   prospectfinder.yaml   (one file per package)
//!   xtwitter.yaml
//! ```
//!
//! Discovery reads only each manifest's name and capability types. The full
//! capability definition is parsed when the registry loads that type.
//!
//! ```yaml
//! name: egile-prospectfinder
//! capabilities:
//!   - capability_type: prospectfinder
//!     command: python
//!     args: ["-u", "-m", "egile_mcp_prospectfinder.server",
//!            "--transport", "sse", "--host", "{host}", "--port", "{port}"]
//!     env: { PYTHONIOENCODING: utf-8 }
//!     required_settings: [SERPAPI_KEY]
//!     operations: [find_prospects]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hub_core::{Endpoint, LaunchSpec, ReadinessProbe};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, ProviderError, RegistryError};
use crate::provider::{Provider, ProviderDiscovery, ProviderFactory, ProviderPackage, ProviderSettings};
use crate::surface::{CapabilitySurface, RemoteSurface};

// ---------------------------------------------------------------------------
// 1. Manifest format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderManifest {
    pub name: String,
    #[serde(default)]
    pub capabilities: Vec<CapabilityManifest>,
}

/// How to launch and reach one capability server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityManifest {
    pub capability_type: String,
    pub command: String,
    /// `{host}`, `{port}` and `{unit}` are substituted per unit.
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    #[serde(default)]
    pub readiness: ReadinessCheck,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness_timeout_secs: Option<u64>,
    /// Settings (credentials) that must be present; forwarded to the child.
    #[serde(default)]
    pub required_settings: Vec<String>,
    #[serde(default)]
    pub operations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReadinessCheck {
    /// Connect to the unit's endpoint.
    #[default]
    Tcp,
    /// Wait for a stdout line containing `pattern`.
    Stdout { pattern: String },
}

#[derive(Deserialize)]
struct ManifestHeader {
    name: String,
    #[serde(default)]
    capabilities: Vec<CapabilityHeader>,
}

#[derive(Deserialize)]
struct CapabilityHeader {
    capability_type: String,
}

fn read_manifest<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, RegistryError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_yaml::from_str(&contents).map_err(|source| RegistryError::Manifest {
        path: path.to_path_buf(),
        source,
    })
}

// ---------------------------------------------------------------------------
// 2. Discovery
// ---------------------------------------------------------------------------

/// Every `*.yaml` / `*.yml` manifest in one directory, in file-name order.
#[derive(Debug, Clone)]
pub struct ManifestDirectory {
    dir: PathBuf,
}

impl ManifestDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<home>/.hub/providers`.
    pub fn at_home(home: &Path) -> Self {
        Self::new(hub_core::paths::providers_dir_at(home))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ProviderDiscovery for ManifestDirectory {
    /// A missing directory means no packages. A manifest whose header does
    /// not parse is skipped with a warning.
    fn discover(&self) -> Result<Vec<Arc<dyn ProviderPackage>>, RegistryError> {
        if !self.dir.exists() {
            tracing::debug!(dir = %self.dir.display(), "provider directory absent");
            return Ok(vec![]);
        }

        let mut entries: Vec<_> = std::fs::read_dir(&self.dir)
            .map_err(|e| io_err(&self.dir, e))?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|e| e.path())
            .filter(|p| {
                matches!(
                    p.extension().and_then(|ext| ext.to_str()),
                    Some("yaml" | "yml")
                )
            })
            .collect();
        entries.sort();

        let mut packages: Vec<Arc<dyn ProviderPackage>> = Vec::new();
        for path in entries {
            match read_manifest::<ManifestHeader>(&path) {
                Ok(header) => {
                    tracing::debug!(
                        package = %header.name,
                        path = %path.display(),
                        "found provider manifest"
                    );
                    packages.push(Arc::new(ManifestPackage {
                        name: header.name,
                        advertised: header
                            .capabilities
                            .into_iter()
                            .map(|c| c.capability_type)
                            .collect(),
                        path,
                    }));
                }
                Err(err) => tracing::warn!(error = %err, "skipping provider manifest"),
            }
        }
        Ok(packages)
    }
}

// ---------------------------------------------------------------------------
// 3. Package / factory / provider
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ManifestPackage {
    name: String,
    advertised: Vec<String>,
    path: PathBuf,
}

impl ManifestPackage {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProviderPackage for ManifestPackage {
    fn name(&self) -> &str {
        &self.name
    }

    fn advertised(&self) -> Vec<String> {
        self.advertised.clone()
    }

    fn load(&self, capability_type: &str) -> Result<Arc<dyn ProviderFactory>, ProviderError> {
        let invalid = |message: String| ProviderError::InvalidDefinition {
            capability_type: capability_type.to_string(),
            message,
        };
        let manifest: ProviderManifest =
            read_manifest(&self.path).map_err(|e| invalid(e.to_string()))?;
        let capability = manifest
            .capabilities
            .into_iter()
            .find(|c| c.capability_type == capability_type)
            .ok_or_else(|| invalid(format!("not listed in {}", self.path.display())))?;
        if capability.command.trim().is_empty() {
            return Err(invalid("command is empty".to_string()));
        }
        Ok(Arc::new(ManifestFactory { capability }))
    }
}

pub struct ManifestFactory {
    capability: CapabilityManifest,
}

impl ManifestFactory {
    pub fn new(capability: CapabilityManifest) -> Self {
        Self { capability }
    }

    fn launch_spec(&self, settings: &ProviderSettings, endpoint: &Endpoint) -> LaunchSpec {
        let cap = &self.capability;
        let expand = |value: &str| {
            value
                .replace("{host}", &endpoint.host)
                .replace("{port}", &endpoint.port.to_string())
                .replace("{unit}", settings.unit_name())
        };

        let readiness = match &cap.readiness {
            ReadinessCheck::Tcp => ReadinessProbe::Tcp {
                host: endpoint.host.clone(),
                port: endpoint.port,
            },
            ReadinessCheck::Stdout { pattern } => ReadinessProbe::StdoutLine {
                pattern: expand(pattern),
            },
        };

        let mut spec =
            LaunchSpec::new(&cap.command, readiness).args(cap.args.iter().map(|a| expand(a)));
        for (name, value) in &cap.env {
            spec = spec.env(name, expand(value));
        }
        for name in &cap.required_settings {
            if let Some(value) = settings.settings().get(name) {
                spec = spec.env(name, value);
            }
        }
        if let Some(dir) = &cap.working_dir {
            spec = spec.working_dir(dir);
        }
        if let Some(secs) = cap.readiness_timeout_secs {
            spec = spec.readiness_timeout(Duration::from_secs(secs));
        }
        spec
    }
}

impl ProviderFactory for ManifestFactory {
    fn capability_type(&self) -> &str {
        &self.capability.capability_type
    }

    fn instantiate(&self, settings: ProviderSettings) -> Result<Box<dyn Provider>, ProviderError> {
        let endpoint = settings
            .endpoint()
            .cloned()
            .ok_or_else(|| ProviderError::MissingEndpoint {
                unit: settings.unit_name().to_string(),
            })?;
        settings.require(&self.capability.capability_type, &self.capability.required_settings)?;

        let launch = self.launch_spec(&settings, &endpoint);
        let surface = RemoteSurface::new(
            settings.unit_name(),
            endpoint,
            self.capability.operations.clone(),
            settings.timeout(),
        );
        Ok(Box::new(ManifestProvider {
            unit: settings.unit_name().to_string(),
            launch,
            surface: Arc::new(surface),
        }))
    }
}

struct ManifestProvider {
    unit: String,
    launch: LaunchSpec,
    surface: Arc<RemoteSurface>,
}

#[async_trait]
impl Provider for ManifestProvider {
    fn launch_spec(&self) -> Option<LaunchSpec> {
        Some(self.launch.clone())
    }

    fn surface(&self) -> Arc<dyn CapabilitySurface> {
        self.surface.clone()
    }

    async fn teardown(&self) -> Result<(), ProviderError> {
        // The server process itself belongs to the supervisor.
        tracing::debug!(unit = %self.unit, "provider teardown");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_core::{Settings, Unit, UnitFlags};

    fn capability() -> CapabilityManifest {
        serde_yaml::from_str(
            r#"
capability_type: xtwitter
command: python
args: ["-m", "egile_mcp_x_post_creator.server", "--host", "{host}", "--port", "{port}"]
env: { PYTHONIOENCODING: utf-8, SERVER_NAME: "{unit}" }
required_settings: [X_API_KEY]
operations: [create_post]
"#,
        )
        .expect("parse capability")
    }

    fn settings(settings: Settings) -> ProviderSettings {
        let unit = Unit {
            name: "poster".into(),
            description: String::new(),
            capability_type: Some("xtwitter".into()),
            endpoint: Some(Endpoint::new("127.0.0.1", 8002)),
            directives: vec![],
            overrides: Default::default(),
            flags: UnitFlags::default(),
        };
        ProviderSettings::new(unit, Arc::new(settings))
    }

    #[test]
    fn readiness_defaults_to_tcp() {
        assert_eq!(capability().readiness, ReadinessCheck::Tcp);
    }

    #[test]
    fn launch_spec_substitutes_endpoint_and_forwards_credentials() {
        let factory = ManifestFactory::new(capability());
        let provider = factory
            .instantiate(settings(Settings::new().with("X_API_KEY", "secret")))
            .expect("instantiate");
        let spec = provider.launch_spec().expect("launch spec");

        assert_eq!(spec.program, "python");
        assert_eq!(
            spec.args,
            vec!["-m", "egile_mcp_x_post_creator.server", "--host", "127.0.0.1", "--port", "8002"]
        );
        assert_eq!(spec.env.get("SERVER_NAME").map(String::as_str), Some("poster"));
        assert_eq!(spec.env.get("X_API_KEY").map(String::as_str), Some("secret"));
        assert_eq!(
            spec.readiness,
            ReadinessProbe::Tcp {
                host: "127.0.0.1".into(),
                port: 8002
            }
        );
        assert_eq!(provider.surface().operations(), vec!["create_post"]);
    }

    #[test]
    fn missing_credentials_fail_instantiation() {
        let factory = ManifestFactory::new(capability());
        let err = factory.instantiate(settings(Settings::new())).err().expect("error");
        assert!(
            matches!(&err, ProviderError::MissingSettings { missing, .. } if missing == &vec!["X_API_KEY".to_string()]),
            "got: {err}"
        );
    }
}

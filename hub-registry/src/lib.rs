//! Capability registry: maps capability types to provider factories.
//!
//! - [`provider`]: the package / factory / provider traits and per-unit settings
//! - [`registry`]: [`CapabilityRegistry`], cached enumeration and lazy loading
//! - [`manifest`]: YAML-described packages under `~/.hub/providers`
//! - [`in_process`]: packages compiled into the host
//! - [`surface`]: what a composed unit exposes to the coordinating runtime

pub mod error;
pub mod in_process;
pub mod manifest;
pub mod provider;
pub mod registry;
pub mod surface;

pub use error::{ProviderError, RegistryError};
pub use in_process::{ChainedDiscovery, InProcessPackage, StaticDiscovery};
pub use manifest::{CapabilityManifest, ManifestDirectory, ProviderManifest, ReadinessCheck};
pub use provider::{
    Provider, ProviderDiscovery, ProviderFactory, ProviderPackage, ProviderSettings,
    DEFAULT_TIMEOUT,
};
pub use registry::{Advertisement, CapabilityRegistry};
pub use surface::{CapabilitySurface, FnSurface, GenericSurface, OperationFn, RemoteSurface};

use std::sync::Arc;

use async_trait::async_trait;

use crate::compose::ComposedSet;
use crate::error::AttachError;

/// The external system that drives units and groups once they are composed.
/// Group coordination semantics live there, not here.
#[async_trait]
pub trait CoordinatingRuntime: Send + Sync {
    async fn attach(&self, composed: Arc<ComposedSet>) -> Result<(), AttachError>;

    /// A unit's capability server went away after startup.
    async fn capability_unavailable(&self, unit: &str, reason: &str);
}

//! Stand-in coordinating runtime for `hub run`: logs what it is handed.

use std::sync::Arc;

use async_trait::async_trait;

use hub_orchestrator::{AttachError, ComposedSet, CoordinatingRuntime, RuntimeMember};

#[derive(Debug, Default)]
pub struct LoggingRuntime;

#[async_trait]
impl CoordinatingRuntime for LoggingRuntime {
    async fn attach(&self, composed: Arc<ComposedSet>) -> Result<(), AttachError> {
        for unit in composed.units() {
            let model = unit
                .model
                .as_ref()
                .map(|m| format!("{}/{}", m.provider, m.model))
                .unwrap_or_else(|| "none".to_string());
            let endpoint = unit
                .endpoint
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "-".to_string());
            tracing::info!(
                unit = %unit.name,
                endpoint = %endpoint,
                model = %model,
                operations = ?unit.surface.operations(),
                "unit attached"
            );
        }
        for group in composed.groups() {
            let members: Vec<&str> = group.members.iter().map(RuntimeMember::name).collect();
            tracing::info!(group = %group.name, members = ?members, "group attached");
        }
        Ok(())
    }

    async fn capability_unavailable(&self, unit: &str, reason: &str) {
        tracing::warn!(unit, reason, "capability unavailable");
    }
}

//! Capability surfaces: what a composed unit exposes to the coordinating
//! runtime.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hub_core::Endpoint;
use serde_json::Value;

use crate::error::ProviderError;

/// Named operations a unit can perform.
#[async_trait]
pub trait CapabilitySurface: Send + Sync {
    /// Unit this surface is bound to.
    fn unit(&self) -> &str;

    fn operations(&self) -> Vec<String>;

    /// Where a process-backed surface is served.
    fn endpoint(&self) -> Option<&Endpoint> {
        None
    }

    async fn invoke(&self, operation: &str, input: Value) -> Result<Value, ProviderError>;
}

impl fmt::Debug for dyn CapabilitySurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilitySurface")
            .field("unit", &self.unit())
            .field("operations", &self.operations())
            .field("endpoint", &self.endpoint())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Generic
// ---------------------------------------------------------------------------

/// Surface of a unit without a capability type: no operations of its own.
#[derive(Debug, Clone)]
pub struct GenericSurface {
    unit: String,
}

impl GenericSurface {
    pub fn new(unit: impl Into<String>) -> Self {
        Self { unit: unit.into() }
    }
}

#[async_trait]
impl CapabilitySurface for GenericSurface {
    fn unit(&self) -> &str {
        &self.unit
    }

    fn operations(&self) -> Vec<String> {
        Vec::new()
    }

    async fn invoke(&self, operation: &str, _input: Value) -> Result<Value, ProviderError> {
        Err(ProviderError::UnsupportedOperation {
            unit: self.unit.clone(),
            operation: operation.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Remote
// ---------------------------------------------------------------------------

/// Surface of a process-backed unit.
#[derive(Debug, Clone)]
pub struct RemoteSurface {
    unit: String,
    endpoint: Endpoint,
    operations: Vec<String>,
    timeout: Duration,
}

impl RemoteSurface {
    pub fn new(
        unit: impl Into<String>,
        endpoint: Endpoint,
        operations: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            unit: unit.into(),
            endpoint,
            operations,
            timeout,
        }
    }

    /// Per-call timeout the runtime should apply.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl CapabilitySurface for RemoteSurface {
    fn unit(&self) -> &str {
        &self.unit
    }

    fn operations(&self) -> Vec<String> {
        self.operations.clone()
    }

    fn endpoint(&self) -> Option<&Endpoint> {
        Some(&self.endpoint)
    }

    async fn invoke(&self, operation: &str, _input: Value) -> Result<Value, ProviderError> {
        if !self.operations.iter().any(|op| op == operation) {
            return Err(ProviderError::UnsupportedOperation {
                unit: self.unit.clone(),
                operation: operation.to_string(),
            });
        }
        Err(ProviderError::Remote {
            unit: self.unit.clone(),
            endpoint: self.endpoint.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// In-process functions
// ---------------------------------------------------------------------------

pub type OperationFuture = Pin<Box<dyn Future<Output = Result<Value, String>> + Send>>;

/// One in-process operation.
pub type OperationFn = Arc<dyn Fn(Value) -> OperationFuture + Send + Sync>;

/// Surface backed by async functions.
#[derive(Clone)]
pub struct FnSurface {
    unit: String,
    operations: BTreeMap<String, OperationFn>,
}

impl FnSurface {
    pub fn new(unit: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            operations: BTreeMap::new(),
        }
    }

    pub fn operation<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, String>> + Send + 'static,
    {
        let op: OperationFn = Arc::new(move |input| Box::pin(f(input)) as OperationFuture);
        self.operations.insert(name.into(), op);
        self
    }
}

impl fmt::Debug for FnSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSurface")
            .field("unit", &self.unit)
            .field("operations", &self.operations.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
impl CapabilitySurface for FnSurface {
    fn unit(&self) -> &str {
        &self.unit
    }

    fn operations(&self) -> Vec<String> {
        self.operations.keys().cloned().collect()
    }

    async fn invoke(&self, operation: &str, input: Value) -> Result<Value, ProviderError> {
        let op = self
            .operations
            .get(operation)
            .ok_or_else(|| ProviderError::UnsupportedOperation {
                unit: self.unit.clone(),
                operation: operation.to_string(),
            })?;
        op(input).await.map_err(|message| ProviderError::Operation {
            unit: self.unit.clone(),
            operation: operation.to_string(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn generic_surface_rejects_everything() {
        let surface = GenericSurface::new("chat");
        assert!(surface.operations().is_empty());
        let err = surface.invoke("search", json!({})).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnsupportedOperation { .. }));
    }

    #[tokio::test]
    async fn remote_surface_points_at_endpoint() {
        let surface = RemoteSurface::new(
            "prospector",
            Endpoint::new("localhost", 8001),
            vec!["find_prospects".into()],
            Duration::from_secs(120),
        );
        assert_eq!(surface.endpoint().map(|e| e.port), Some(8001));

        let err = surface.invoke("find_prospects", json!({})).await.unwrap_err();
        assert!(err.to_string().contains("localhost:8001"), "{err}");

        let err = surface.invoke("post", json!({})).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnsupportedOperation { .. }));
    }

    #[tokio::test]
    async fn fn_surface_runs_operation() {
        let surface = FnSurface::new("tools")
            .operation("echo", |input| async move { Ok(json!({ "echo": input })) })
            .operation("fail", |_| async { Err("boom".to_string()) });
        assert_eq!(surface.operations(), vec!["echo", "fail"]);

        let out = surface.invoke("echo", json!(3)).await.expect("echo");
        assert_eq!(out, json!({ "echo": 3 }));

        let err = surface.invoke("fail", Value::Null).await.unwrap_err();
        assert!(err.to_string().contains("boom"));

        let err = surface.invoke("missing", Value::Null).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnsupportedOperation { .. }));
    }
}

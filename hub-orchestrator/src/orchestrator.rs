use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use hub_core::{default_model, Configuration, LaunchSpec, Settings, Unit};
use hub_registry::{
    CapabilityRegistry, CapabilitySurface, GenericSurface, Provider, ProviderSettings,
};
use hub_supervisor::{ProcessEvent, ProcessRecord, ProcessState, Supervisor};
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::compose::ComposedSet;
use crate::error::{FailedUnit, OrchestratorError};
use crate::runtime::CoordinatingRuntime;

/// What to do when some units fail to start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StartupPolicy {
    /// Any failure stops everything and fails the run.
    #[default]
    AllOrNothing,
    /// Continue without the failed units.
    BestEffort,
}

/// Requests shutdown of a run, including one still starting up.
#[derive(Debug, Clone, Default)]
pub struct ShutdownTrigger {
    token: CancellationToken,
}

impl ShutdownTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn triggered(&self) {
        self.token.cancelled().await;
    }
}

struct Instance {
    unit: String,
    provider: Option<Arc<dyn Provider>>,
    surface: Arc<dyn CapabilitySurface>,
}

pub struct Orchestrator {
    config: Configuration,
    registry: Arc<CapabilityRegistry>,
    supervisor: Arc<Supervisor>,
    settings: Arc<Settings>,
    policy: StartupPolicy,
    trigger: ShutdownTrigger,
}

impl Orchestrator {
    pub fn new(
        config: Configuration,
        registry: Arc<CapabilityRegistry>,
        supervisor: Arc<Supervisor>,
    ) -> Self {
        Self {
            config,
            registry,
            supervisor,
            settings: Arc::new(Settings::new()),
            policy: StartupPolicy::default(),
            trigger: ShutdownTrigger::new(),
        }
    }

    /// Settings handed to every provider (credentials included).
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Arc::new(settings);
        self
    }

    pub fn policy(mut self, policy: StartupPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        self.trigger.clone()
    }

    /// Resolve providers, start their servers, compose runtime objects and
    /// attach them to `runtime`.
    pub async fn run(
        self,
        runtime: Arc<dyn CoordinatingRuntime>,
    ) -> Result<RunHandle, OrchestratorError> {
        if self.trigger.is_triggered() {
            return Err(OrchestratorError::Cancelled);
        }

        let default_model = match default_model(&self.settings) {
            Ok(selection) => {
                tracing::info!(
                    provider = %selection.provider,
                    model = %selection.model,
                    "default model"
                );
                Some(selection)
            }
            Err(err) => {
                tracing::warn!(error = %err, "units without an explicit provider get no model");
                None
            }
        };

        // 1. providers
        let mut failed = Vec::new();
        let mut instances = Vec::new();
        for unit in self.config.units() {
            match self.instantiate(unit) {
                Ok(instance) => instances.push(instance),
                Err(failure) => {
                    tracing::warn!(unit = %failure.unit, reason = %failure.reason, "provider unavailable");
                    failed.push(failure);
                }
            }
        }
        if !failed.is_empty() && self.policy == StartupPolicy::AllOrNothing {
            self.abort(&instances).await;
            return Err(OrchestratorError::StartupFailed {
                failed_units: failed,
            });
        }

        // 2. processes
        let events = self.supervisor.subscribe();
        let launches: Vec<(String, LaunchSpec)> = instances
            .iter()
            .filter_map(|i| Some((i.unit.clone(), i.provider.as_ref()?.launch_spec()?)))
            .collect();

        let started = tokio::select! {
            biased;
            _ = self.trigger.triggered() => None,
            outcomes = self.supervisor.start_all(launches) => Some(outcomes),
        };
        let outcomes = match started {
            Some(Ok(outcomes)) if !self.trigger.is_triggered() => outcomes,
            Some(Err(err)) => {
                self.abort(&instances).await;
                return Err(err.into());
            }
            _ => {
                tracing::info!("shutdown requested during startup");
                self.abort(&instances).await;
                return Err(OrchestratorError::Cancelled);
            }
        };

        for outcome in outcomes.iter().filter(|o| !o.is_ready()) {
            failed.push(FailedUnit::new(&outcome.unit_name, describe(&outcome.state)));
        }
        if !failed.is_empty() {
            match self.policy {
                StartupPolicy::AllOrNothing => {
                    self.abort(&instances).await;
                    return Err(OrchestratorError::StartupFailed {
                        failed_units: failed,
                    });
                }
                StartupPolicy::BestEffort => {
                    let (dropped, kept): (Vec<_>, Vec<_>) = instances
                        .into_iter()
                        .partition(|i| failed.iter().any(|f| f.unit == i.unit));
                    for failure in &failed {
                        tracing::warn!(unit = %failure.unit, reason = %failure.reason, "continuing without unit");
                    }
                    teardown(&dropped, self.supervisor.config().grace_period).await;
                    instances = kept;
                }
            }
        }

        // 3. composition
        let surfaces: HashMap<String, Arc<dyn CapabilitySurface>> = instances
            .iter()
            .map(|i| (i.unit.clone(), Arc::clone(&i.surface)))
            .collect();
        let composed = Arc::new(ComposedSet::compose(
            &self.config,
            &surfaces,
            default_model.as_ref(),
        ));
        if let Err(err) = runtime.attach(Arc::clone(&composed)).await {
            self.abort(&instances).await;
            return Err(err.into());
        }
        tracing::info!(
            units = composed.units().count(),
            groups = composed.groups().count(),
            "composition attached"
        );

        let forwarder = tokio::spawn(forward_crashes(
            events,
            runtime,
            Arc::clone(&composed),
            self.trigger.clone(),
        ));

        Ok(RunHandle {
            composed,
            instances,
            supervisor: self.supervisor,
            trigger: self.trigger,
            lifecycle: tokio::sync::Mutex::new(Lifecycle {
                forwarder: Some(forwarder),
                finished: false,
            }),
        })
    }

    fn instantiate(&self, unit: &Unit) -> Result<Instance, FailedUnit> {
        let name = unit.name.to_string();
        let Some(capability_type) = &unit.capability_type else {
            return Ok(Instance {
                surface: Arc::new(GenericSurface::new(&name)),
                unit: name,
                provider: None,
            });
        };

        let factory = self
            .registry
            .resolve(capability_type)
            .map_err(|err| FailedUnit::new(&name, err))?;
        let provider: Arc<dyn Provider> = self
            .registry
            .instantiate(
                factory.as_ref(),
                ProviderSettings::new(unit.clone(), Arc::clone(&self.settings)),
            )
            .map_err(|err| FailedUnit::new(&name, err))?
            .into();
        Ok(Instance {
            surface: provider.surface(),
            unit: name,
            provider: Some(provider),
        })
    }

    async fn abort(&self, instances: &[Instance]) {
        teardown(instances, self.supervisor.config().grace_period).await;
        self.supervisor.stop_all().await;
    }
}

/// A started composition. Dropping it does not stop anything; call
/// [`RunHandle::shutdown`] or [`RunHandle::wait`].
pub struct RunHandle {
    composed: Arc<ComposedSet>,
    instances: Vec<Instance>,
    supervisor: Arc<Supervisor>,
    trigger: ShutdownTrigger,
    lifecycle: tokio::sync::Mutex<Lifecycle>,
}

struct Lifecycle {
    forwarder: Option<JoinHandle<()>>,
    finished: bool,
}

impl RunHandle {
    pub fn composed(&self) -> Arc<ComposedSet> {
        Arc::clone(&self.composed)
    }

    pub fn status(&self) -> Vec<ProcessRecord> {
        self.supervisor.status()
    }

    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        self.trigger.clone()
    }

    /// Provider teardown, then stop every process. Idempotent.
    pub async fn shutdown(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.finished {
            return;
        }
        self.trigger.trigger();
        teardown(&self.instances, self.supervisor.config().grace_period).await;
        self.supervisor.stop_all().await;
        if let Some(forwarder) = lifecycle.forwarder.take() {
            if let Err(err) = forwarder.await {
                tracing::warn!(error = %err, "crash forwarder join failure");
            }
        }
        lifecycle.finished = true;
        tracing::info!("shutdown complete");
    }

    /// Block until the trigger fires, then shut down.
    pub async fn wait(&self) {
        self.trigger.triggered().await;
        self.shutdown().await;
    }
}

/// Every provider's teardown, concurrently, each bounded by `limit`.
async fn teardown(instances: &[Instance], limit: Duration) {
    let mut hooks = JoinSet::new();
    for instance in instances {
        let Some(provider) = &instance.provider else {
            continue;
        };
        let provider = Arc::clone(provider);
        let unit = instance.unit.clone();
        hooks.spawn(async move {
            match tokio::time::timeout(limit, provider.teardown()).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::warn!(unit = %unit, error = %err, "provider teardown failed")
                }
                Err(_) => tracing::warn!(
                    unit = %unit,
                    limit_ms = limit.as_millis() as u64,
                    "provider teardown timed out"
                ),
            }
        });
    }
    while let Some(joined) = hooks.join_next().await {
        if let Err(err) = joined {
            tracing::warn!(error = %err, "provider teardown task failed");
        }
    }
}

fn describe(state: &ProcessState) -> String {
    match state {
        ProcessState::Failed(err) => err.to_string(),
        other => format!("ended {}", other.label()),
    }
}

async fn forward_crashes(
    mut events: broadcast::Receiver<ProcessEvent>,
    runtime: Arc<dyn CoordinatingRuntime>,
    composed: Arc<ComposedSet>,
    trigger: ShutdownTrigger,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = trigger.triggered() => break,
            event = events.recv() => event,
        };
        match event {
            // Startup failures of dropped units arrive here too; skip them.
            Ok(ProcessEvent::Failed { unit, error }) if composed.unit(&unit).is_some() => {
                tracing::warn!(unit = %unit, error = %error, "capability unavailable");
                runtime
                    .capability_unavailable(&unit, &error.to_string())
                    .await;
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "missed process events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

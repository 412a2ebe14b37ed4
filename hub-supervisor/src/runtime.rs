use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use hub_core::{LaunchSpec, ReadinessProbe};
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{ProcessError, SupervisorError};
use crate::readiness;
use crate::record::{ProcessEvent, ProcessRecord, ProcessState, StartOutcome};
use crate::signal;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// How long a child may take to exit after SIGTERM before it is killed.
    pub grace_period: Duration,
    /// Used when a launch spec does not carry its own.
    pub readiness_timeout: Duration,
    /// Delay between TCP readiness attempts.
    pub probe_interval: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(5),
            readiness_timeout: Duration::from_secs(30),
            probe_interval: Duration::from_millis(100),
        }
    }
}

/// Owns every capability-server child and its lifecycle record.
pub struct Supervisor {
    config: SupervisorConfig,
    shared: Shared,
    stop: CancellationToken,
    tasks: tokio::sync::Mutex<Vec<(String, JoinHandle<()>)>>,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new(SupervisorConfig::default())
    }
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config,
            shared: Shared {
                records: Arc::new(Mutex::new(Vec::new())),
                events,
                terminating: Arc::new(AtomicBool::new(false)),
            },
            stop: CancellationToken::new(),
            tasks: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Launch every child concurrently and wait until each one is `Ready`,
    /// `Failed` or `Stopped`. A failing child never aborts the others.
    /// Outcomes come back in the order given.
    pub async fn start_all(
        &self,
        launches: Vec<(String, LaunchSpec)>,
    ) -> Result<Vec<StartOutcome>, SupervisorError> {
        let mut pending = Vec::with_capacity(launches.len());
        {
            let mut tasks = self.tasks.lock().await;
            if self.stop.is_cancelled() {
                let unit = launches.first().map(|(u, _)| u.clone()).unwrap_or_default();
                return Err(SupervisorError::ShuttingDown(unit));
            }
            let mut records = self.shared.lock();
            for (i, (unit, _)) in launches.iter().enumerate() {
                let repeated = launches[..i].iter().any(|(u, _)| u == unit);
                if repeated || records.iter().any(|r| &r.unit_name == unit) {
                    return Err(SupervisorError::AlreadySupervised(unit.clone()));
                }
            }
            for (unit, spec) in launches {
                records.push(ProcessRecord::pending(&unit, spec.command_line()));
                let (outcome_tx, outcome_rx) = oneshot::channel();
                let task = ProcessTask {
                    unit: unit.clone(),
                    spec,
                    config: self.config,
                    shared: self.shared.clone(),
                    stop: self.stop.clone(),
                };
                tasks.push((unit.clone(), tokio::spawn(task.run(outcome_tx))));
                pending.push((unit, outcome_rx));
            }
        }
        tracing::info!(count = pending.len(), "starting capability servers");

        let mut outcomes = Vec::with_capacity(pending.len());
        for (unit, outcome_rx) in pending {
            let state = match outcome_rx.await {
                Ok(state) => state,
                Err(_) => {
                    let state = ProcessState::Failed(ProcessError::LaunchFailed(
                        "supervision task ended before startup finished".to_string(),
                    ));
                    self.shared.set_state(&unit, state.clone());
                    state
                }
            };
            outcomes.push(StartOutcome {
                unit_name: unit,
                state,
            });
        }
        Ok(outcomes)
    }

    /// Terminate every live child: SIGTERM to all first, then up to the
    /// grace period each (concurrently), then a forced kill. Safe to call
    /// any number of times.
    pub async fn stop_all(&self) {
        let mut tasks = self.tasks.lock().await;
        let first_call = !self.stop.is_cancelled();

        if first_call {
            self.shared.terminating.store(true, Ordering::SeqCst);
            let live: Vec<(String, u32)> = self
                .shared
                .lock()
                .iter()
                .filter(|r| r.state.is_live())
                .filter_map(|r| r.pid.map(|pid| (r.unit_name.clone(), pid)))
                .collect();
            for (unit, pid) in &live {
                if !signal::terminate(*pid) {
                    tracing::debug!(unit = %unit, pid, "termination request not delivered");
                }
            }
            if !live.is_empty() {
                tracing::info!(count = live.len(), "stopping capability servers");
            }
        }
        // Every SIGTERM is out before any task starts its own grace wait.
        self.stop.cancel();

        for (unit, handle) in std::mem::take(&mut *tasks) {
            if let Err(err) = handle.await {
                tracing::warn!(unit = %unit, error = %err, "supervision task join failure");
            }
        }
    }

    /// Consistent copy of every record, in launch order.
    pub fn status(&self) -> Vec<ProcessRecord> {
        self.shared.lock().clone()
    }

    pub fn record(&self, unit: &str) -> Option<ProcessRecord> {
        self.shared
            .lock()
            .iter()
            .find(|r| r.unit_name == unit)
            .cloned()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProcessEvent> {
        self.shared.events.subscribe()
    }
}

// ---------------------------------------------------------------------------
// Shared record table
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct Shared {
    records: Arc<Mutex<Vec<ProcessRecord>>>,
    events: broadcast::Sender<ProcessEvent>,
    /// Set before the first SIGTERM goes out; exits after it are stops, not crashes.
    terminating: Arc<AtomicBool>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Vec<ProcessRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_terminating(&self) -> bool {
        self.terminating.load(Ordering::SeqCst)
    }

    fn update(&self, unit: &str, f: impl FnOnce(&mut ProcessRecord)) {
        if let Some(record) = self.lock().iter_mut().find(|r| r.unit_name == unit) {
            f(record);
        }
    }

    fn set_state(&self, unit: &str, state: ProcessState) {
        self.update(unit, |r| r.state = state.clone());
        let event = match state {
            ProcessState::Ready => ProcessEvent::Ready {
                unit: unit.to_string(),
            },
            ProcessState::Failed(error) => ProcessEvent::Failed {
                unit: unit.to_string(),
                error,
            },
            ProcessState::Stopped => ProcessEvent::Stopped {
                unit: unit.to_string(),
            },
            ProcessState::Pending | ProcessState::Starting => return,
        };
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

// ---------------------------------------------------------------------------
// Per-process task
// ---------------------------------------------------------------------------

enum Startup {
    Ready,
    Exited(Option<i32>),
    TimedOut(Duration),
    Cancelled,
}

struct ProcessTask {
    unit: String,
    spec: LaunchSpec,
    config: SupervisorConfig,
    shared: Shared,
    stop: CancellationToken,
}

impl ProcessTask {
    async fn run(self, outcome: oneshot::Sender<ProcessState>) {
        if self.stop.is_cancelled() {
            self.shared.set_state(&self.unit, ProcessState::Stopped);
            let _ = outcome.send(ProcessState::Stopped);
            return;
        }

        self.shared.set_state(&self.unit, ProcessState::Starting);
        let mut child = match self.spawn() {
            Ok(child) => child,
            Err(err) => {
                tracing::error!(unit = %self.unit, error = %err, "failed to launch capability server");
                let state = ProcessState::Failed(ProcessError::LaunchFailed(err.to_string()));
                self.shared.set_state(&self.unit, state.clone());
                let _ = outcome.send(state);
                return;
            }
        };
        let pid = child.id();
        self.shared.update(&self.unit, |r| {
            r.pid = pid;
            r.started_at = Some(Utc::now());
        });
        tracing::info!(unit = %self.unit, pid = ?pid, command = %self.spec.command_line(), "launched");

        let state = match self.await_startup(&mut child).await {
            Startup::Ready => ProcessState::Ready,
            Startup::Exited(_) if self.shared.is_terminating() => ProcessState::Stopped,
            Startup::Exited(code) => ProcessState::Failed(ProcessError::ExitedDuringStartup { code }),
            Startup::TimedOut(after) => {
                if let Err(err) = child.kill().await {
                    tracing::warn!(unit = %self.unit, error = %err, "kill after readiness timeout failed");
                }
                ProcessState::Failed(ProcessError::ReadinessTimeout { after })
            }
            Startup::Cancelled => {
                self.terminate(&mut child).await;
                ProcessState::Stopped
            }
        };

        match &state {
            ProcessState::Ready => tracing::info!(unit = %self.unit, "ready"),
            ProcessState::Failed(err) => tracing::error!(unit = %self.unit, error = %err, "startup failed"),
            _ => tracing::info!(unit = %self.unit, "stopped during startup"),
        }
        self.shared.set_state(&self.unit, state.clone());
        let _ = outcome.send(state.clone());

        if state == ProcessState::Ready {
            self.monitor(child).await;
        }
    }

    fn spawn(&self) -> std::io::Result<Child> {
        let mut command = Command::new(&self.spec.program);
        command
            .args(&self.spec.args)
            .envs(&self.spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &self.spec.working_dir {
            command.current_dir(dir);
        }
        command.spawn()
    }

    async fn await_startup(&self, child: &mut Child) -> Startup {
        let pattern = match &self.spec.readiness {
            ReadinessProbe::StdoutLine { pattern } => Some(pattern.clone()),
            ReadinessProbe::Tcp { .. } => None,
        };
        let stdout_ready = child
            .stdout
            .take()
            .map(|stdout| readiness::forward_stdout(self.unit.clone(), stdout, pattern));

        let probe = async {
            match &self.spec.readiness {
                ReadinessProbe::Tcp { host, port } => {
                    readiness::tcp(host, *port, self.config.probe_interval).await
                }
                ReadinessProbe::StdoutLine { .. } => {
                    let matched = match stdout_ready {
                        Some(rx) => rx.await.is_ok(),
                        None => false,
                    };
                    if !matched {
                        // stdout closed without a match; the exit branch decides
                        std::future::pending::<()>().await;
                    }
                }
            }
        };

        let timeout = self
            .spec
            .readiness_timeout
            .unwrap_or(self.config.readiness_timeout);

        tokio::select! {
            biased;
            _ = self.stop.cancelled() => Startup::Cancelled,
            status = child.wait() => Startup::Exited(status.ok().and_then(|s| s.code())),
            _ = probe => Startup::Ready,
            _ = tokio::time::sleep(timeout) => Startup::TimedOut(timeout),
        }
    }

    async fn monitor(&self, mut child: Child) {
        tokio::select! {
            biased;
            _ = self.stop.cancelled() => {
                self.terminate(&mut child).await;
                tracing::info!(unit = %self.unit, "stopped");
                self.shared.set_state(&self.unit, ProcessState::Stopped);
            }
            status = child.wait() => {
                if self.stop.is_cancelled() || self.shared.is_terminating() {
                    self.shared.set_state(&self.unit, ProcessState::Stopped);
                    return;
                }
                let code = status.ok().and_then(|s| s.code());
                let error = ProcessError::Exited { code };
                tracing::warn!(unit = %self.unit, error = %error, "capability server crashed");
                self.shared.set_state(&self.unit, ProcessState::Failed(error));
            }
        }
    }

    /// SIGTERM, wait up to the grace period, then kill.
    async fn terminate(&self, child: &mut Child) {
        let requested = child.id().is_some_and(signal::terminate);
        if requested {
            match tokio::time::timeout(self.config.grace_period, child.wait()).await {
                Ok(_) => return,
                Err(_) => tracing::warn!(
                    unit = %self.unit,
                    grace_ms = self.config.grace_period.as_millis() as u64,
                    "grace period elapsed; killing"
                ),
            }
        }
        if let Err(err) = child.kill().await {
            tracing::debug!(unit = %self.unit, error = %err, "kill failed");
        }
    }
}

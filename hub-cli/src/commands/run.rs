//! `hub run`: start every capability server, attach the composition and
//! block until SIGINT / SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use hub_core::{paths, source, Settings};
use hub_orchestrator::{Orchestrator, StartupPolicy};
use hub_registry::{CapabilityRegistry, ManifestDirectory};
use hub_supervisor::{ProcessRecord, ProcessState, Supervisor, SupervisorConfig};

use crate::logging::init_tracing;
use crate::runtime::LoggingRuntime;
use crate::signals::wait_for_shutdown_signal;

/// Arguments for `hub run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Configuration file (default: `$AGENTS_CONFIG_FILE`, then `agents.yaml`).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Provider manifest directory (default: `~/.hub/providers`).
    #[arg(long)]
    pub providers: Option<PathBuf>,

    /// Keep going when some capability servers fail to start.
    #[arg(long)]
    pub best_effort: bool,

    /// Seconds a server gets to exit after SIGTERM.
    #[arg(long)]
    pub grace_secs: Option<u64>,

    /// Readiness timeout for servers whose provider sets none.
    #[arg(long)]
    pub readiness_timeout_secs: Option<u64>,

    /// Log as JSON lines.
    #[arg(long)]
    pub log_json: bool,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        init_tracing(self.log_json);
        start_blocking(self)
    }
}

fn start_blocking(args: RunArgs) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(serve(args))
}

async fn serve(args: RunArgs) -> Result<()> {
    let settings = Settings::from_env();
    let path = args
        .config
        .clone()
        .unwrap_or_else(|| source::config_path(&settings));
    let config = source::load_file_at(&path, &settings)
        .with_context(|| format!("failed to load {}", path.display()))?;

    let providers_dir = match args.providers {
        Some(dir) => dir,
        None => paths::providers_dir().context("failed to locate provider directory")?,
    };
    tracing::info!(config = %path.display(), providers = %providers_dir.display(), "starting hub");

    let registry = Arc::new(CapabilityRegistry::new(ManifestDirectory::new(providers_dir)));
    let supervisor = Arc::new(Supervisor::new(supervisor_config(
        args.grace_secs,
        args.readiness_timeout_secs,
    )));
    let policy = if args.best_effort {
        StartupPolicy::BestEffort
    } else {
        StartupPolicy::AllOrNothing
    };

    let orchestrator = Orchestrator::new(config, registry, supervisor)
        .settings(settings)
        .policy(policy);

    let trigger = orchestrator.shutdown_trigger();
    let signals = tokio::spawn({
        let trigger = trigger.clone();
        async move {
            match wait_for_shutdown_signal().await {
                Ok(()) => {
                    tracing::info!("shutdown signal received");
                    trigger.trigger();
                }
                Err(err) => tracing::error!(error = %err, "cannot install signal handlers"),
            }
        }
    });

    let started = orchestrator.run(Arc::new(LoggingRuntime)).await;
    let handle = match started {
        Ok(handle) => handle,
        Err(err) => {
            signals.abort();
            return Err(err).context("hub startup failed");
        }
    };

    print_status(&handle.status());
    println!("{}", "hub running; press Ctrl-C to stop".green());

    handle.wait().await;
    signals.abort();
    print_status(&handle.status());
    Ok(())
}

fn supervisor_config(grace_secs: Option<u64>, readiness_secs: Option<u64>) -> SupervisorConfig {
    let mut config = SupervisorConfig::default();
    if let Some(secs) = grace_secs {
        config.grace_period = Duration::from_secs(secs);
    }
    if let Some(secs) = readiness_secs {
        config.readiness_timeout = Duration::from_secs(secs);
    }
    config
}

// ---------------------------------------------------------------------------
// Status table
// ---------------------------------------------------------------------------

#[derive(Tabled)]
struct ProcessRow {
    #[tabled(rename = "unit")]
    unit: String,
    #[tabled(rename = "state")]
    state: String,
    #[tabled(rename = "pid")]
    pid: String,
    #[tabled(rename = "started")]
    started: String,
    #[tabled(rename = "command")]
    command: String,
}

fn print_status(records: &[ProcessRecord]) {
    if records.is_empty() {
        println!("No capability servers.");
        return;
    }
    let rows: Vec<ProcessRow> = records.iter().map(row).collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
}

fn row(record: &ProcessRecord) -> ProcessRow {
    ProcessRow {
        unit: record.unit_name.clone(),
        state: colorize_state(&record.state),
        pid: record
            .pid
            .map(|pid| pid.to_string())
            .unwrap_or_else(|| "-".to_string()),
        started: record
            .started_at
            .map(|at| at.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string()),
        command: record.launch_command.clone(),
    }
}

fn colorize_state(state: &ProcessState) -> String {
    match state {
        ProcessState::Ready => state.label().green().to_string(),
        ProcessState::Failed(err) => format!("{} ({err})", state.label().red()),
        ProcessState::Stopped => state.label().dimmed().to_string(),
        ProcessState::Pending | ProcessState::Starting => state.label().yellow().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_apply_to_supervisor_config() {
        let config = supervisor_config(Some(2), None);
        assert_eq!(config.grace_period, Duration::from_secs(2));
        assert_eq!(
            config.readiness_timeout,
            SupervisorConfig::default().readiness_timeout
        );
    }

    #[test]
    fn pending_row_has_placeholders() {
        let record = ProcessRecord {
            unit_name: "db".to_string(),
            launch_command: "db-server --port 9000".to_string(),
            pid: None,
            state: ProcessState::Pending,
            started_at: None,
        };
        let row = row(&record);
        assert_eq!(row.unit, "db");
        assert_eq!(row.pid, "-");
        assert_eq!(row.started, "-");
    }
}

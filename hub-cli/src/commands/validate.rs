//! `hub validate`: load a configuration and report what it declares.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use hub_core::{load_with_settings, source, Configuration, Settings, ValidationError};

/// Arguments for `hub validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Configuration file (default: `$AGENTS_CONFIG_FILE`, then `agents.yaml`).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl ValidateArgs {
    pub fn run(self) -> Result<()> {
        let settings = Settings::from_env();
        let path = self
            .config
            .clone()
            .unwrap_or_else(|| source::config_path(&settings));

        let raw = source::read_description_at(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        match load_with_settings(&raw, &settings) {
            Ok(config) => {
                if self.json {
                    print_json(&config)?;
                } else {
                    print_table(&config);
                }
                Ok(())
            }
            Err(report) => {
                if self.json {
                    print_issues_json(&report)?;
                } else {
                    print_issues(&report);
                }
                bail!(
                    "{} is invalid ({} issue(s))",
                    path.display(),
                    report.issues().len()
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Output shapes
// ---------------------------------------------------------------------------

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "kind")]
    kind: String,
    #[tabled(rename = "capability")]
    capability: String,
    #[tabled(rename = "endpoint")]
    endpoint: String,
    #[tabled(rename = "members")]
    members: String,
}

#[derive(Serialize)]
struct ValidJson<'a> {
    valid: bool,
    units: Vec<&'a hub_core::Unit>,
    groups: Vec<&'a hub_core::Group>,
}

#[derive(Serialize)]
struct InvalidJson {
    valid: bool,
    issues: Vec<String>,
}

fn rows(config: &Configuration) -> Vec<EntryRow> {
    let units = config.units().map(|unit| EntryRow {
        name: unit.name.to_string(),
        kind: "unit".to_string(),
        capability: unit.capability_type.clone().unwrap_or_else(|| "-".to_string()),
        endpoint: unit
            .endpoint
            .as_ref()
            .map(|endpoint| endpoint.to_string())
            .unwrap_or_else(|| "-".to_string()),
        members: "-".to_string(),
    });
    let groups = config.groups().map(|group| EntryRow {
        name: group.name.to_string(),
        kind: "group".to_string(),
        capability: "-".to_string(),
        endpoint: "-".to_string(),
        members: group
            .member_refs
            .iter()
            .map(|member| member.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    });
    units.chain(groups).collect()
}

fn print_table(config: &Configuration) {
    let rows = rows(config);
    let units = config.units().count();
    let groups = config.groups().count();
    let processes = config.process_units().count();

    println!("{}", Table::new(rows).with(Style::rounded()));
    println!(
        "{} {units} unit(s), {groups} group(s), {processes} capability server(s)",
        "valid:".green().bold()
    );
}

fn print_json(config: &Configuration) -> Result<()> {
    let payload = ValidJson {
        valid: true,
        units: config.units().collect(),
        groups: config.groups().collect(),
    };
    let json = serde_json::to_string_pretty(&payload).context("failed to encode JSON")?;
    println!("{json}");
    Ok(())
}

fn print_issues(report: &ValidationError) {
    println!("{}", "invalid configuration".red().bold());
    for issue in report.issues() {
        println!("  {} {issue}", "-".red());
    }
}

fn print_issues_json(report: &ValidationError) -> Result<()> {
    let payload = InvalidJson {
        valid: false,
        issues: report.issues().iter().map(|issue| issue.to_string()).collect(),
    };
    let json = serde_json::to_string_pretty(&payload).context("failed to encode JSON")?;
    println!("{json}");
    Ok(())
}

//! `hub providers`: list installed provider packages without loading them.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use hub_core::paths;
use hub_registry::{Advertisement, CapabilityRegistry, ManifestDirectory};

/// Arguments for `hub providers`.
#[derive(Args, Debug)]
pub struct ProvidersArgs {
    /// Manifest directory (default: `~/.hub/providers`).
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct PackageRow {
    #[tabled(rename = "package")]
    package: String,
    #[tabled(rename = "capability types")]
    capability_types: String,
}

impl ProvidersArgs {
    pub fn run(self) -> Result<()> {
        let dir = match self.dir {
            Some(dir) => dir,
            None => paths::providers_dir().context("failed to locate provider directory")?,
        };

        let registry = CapabilityRegistry::new(ManifestDirectory::new(dir.clone()));
        let packages = registry
            .advertisements()
            .with_context(|| format!("failed to enumerate providers in {}", dir.display()))?;

        if self.json {
            let json = serde_json::to_string_pretty(&packages).context("failed to encode JSON")?;
            println!("{json}");
            return Ok(());
        }

        if packages.is_empty() {
            println!("No provider manifests in {}", dir.display());
            return Ok(());
        }

        print_table(packages);
        Ok(())
    }
}

fn print_table(packages: Vec<Advertisement>) {
    let count = packages.len();
    let rows: Vec<PackageRow> = packages
        .into_iter()
        .map(|package| PackageRow {
            package: package.package,
            capability_types: package.capability_types.join(", "),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
    println!("{} package(s)", count.to_string().bold());
}

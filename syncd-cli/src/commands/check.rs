//! `sync-daemon check`: validate a configuration without running it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use syncd_core::{build_settings, load_config_file, SourceRegistry, SourceSettings, DEFAULT_CONFIG_PATH};

/// Arguments for `sync-daemon check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Path to the YAML configuration file.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl CheckArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config_file(&self.config)
            .with_context(|| format!("invalid configuration {}", self.config.display()))?;
        let settings = build_settings(&config, &SourceRegistry::with_builtin())
            .with_context(|| format!("invalid configuration {}", self.config.display()))?;

        let report = build_report(&settings);
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to render check report JSON")?
            );
            return Ok(());
        }

        let CheckReport { sources, rules } = report;
        println!(
            "{} {} ({} sources, {} rules)",
            "configuration OK:".green().bold(),
            self.config.display(),
            sources.len(),
            rules.len(),
        );
        println!("{}", Table::new(sources).with(Style::rounded()));
        println!("{}", Table::new(rules).with(Style::rounded()));
        Ok(())
    }
}

#[derive(Serialize)]
struct CheckReport {
    sources: Vec<SourceRow>,
    rules: Vec<RuleRow>,
}

#[derive(Serialize, Tabled)]
struct SourceRow {
    #[tabled(rename = "source")]
    id: String,
    #[tabled(rename = "kind")]
    kind: String,
    #[tabled(rename = "poll interval")]
    poll_interval: String,
    #[tabled(rename = "rules")]
    rules: usize,
}

#[derive(Serialize, Tabled)]
struct RuleRow {
    #[tabled(rename = "rule")]
    id: String,
    #[tabled(rename = "source")]
    source: String,
    #[tabled(rename = "prefix")]
    prefix: String,
    #[tabled(rename = "attempts")]
    attempts: String,
    #[tabled(rename = "commands")]
    commands: usize,
    #[tabled(rename = "includes")]
    includes: usize,
}

fn build_report(settings: &[SourceSettings]) -> CheckReport {
    let sources = settings
        .iter()
        .map(|source| SourceRow {
            id: source.id.clone(),
            kind: source.source.kind().to_string(),
            poll_interval: humantime::format_duration(source.poll_interval).to_string(),
            rules: source.rules.len(),
        })
        .collect();

    let rules = settings
        .iter()
        .flat_map(|source| {
            source.rules.iter().map(move |rule| RuleRow {
                id: rule.id.clone(),
                source: source.id.clone(),
                prefix: rule.prefix.clone(),
                attempts: rule.max_failures.to_string(),
                commands: rule.after_sync.len(),
                includes: rule.includes.len(),
            })
        })
        .collect();

    CheckReport { sources, rules }
}

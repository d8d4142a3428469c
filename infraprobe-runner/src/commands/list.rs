//! `infraprobe list` command handler

use std::io::Write;

use serde::Serialize;

use crate::cli::FileArgs;
use crate::commands::display;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};
use crate::scenario::{Scenario, ScenarioFile};

/// Execute the `list` command.
pub async fn execute(args: FileArgs, writer: &OutputWriter) -> Result<(), CliError> {
    let file = ScenarioFile::load(&args.file).await?;
    let report = ScenarioListReport {
        source: display(&args.file),
        total: file.scenarios.len(),
        scenarios: file.scenarios.iter().map(ScenarioEntry::from).collect(),
    };
    writer.render(&report)
}

#[derive(Serialize)]
pub struct ScenarioListReport {
    pub source: String,
    pub total: usize,
    pub scenarios: Vec<ScenarioEntry>,
}

#[derive(Serialize)]
pub struct ScenarioEntry {
    pub name: String,
    pub mode: String,
    pub provider: String,
    pub module: String,
    pub checks: Vec<String>,
}

impl From<&Scenario> for ScenarioEntry {
    fn from(scenario: &Scenario) -> Self {
        Self {
            name: scenario.name.clone(),
            mode: scenario.mode.to_string(),
            provider: scenario.provider.kind.to_string(),
            module: display(&scenario.module),
            checks: scenario.checks.iter().map(|c| c.label()).collect(),
        }
    }
}

impl Render for ScenarioListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "Scenarios in {} ({} total)",
            self.source.bold(),
            self.total.to_string().bold()
        )?;
        writeln!(w)?;
        writeln!(w, "{:<30} {:<6} {:<8} Module", "Name", "Mode", "Provider")?;
        writeln!(w, "{}", "-".repeat(80))?;

        for s in &self.scenarios {
            writeln!(
                w,
                "{:<30} {:<6} {:<8} {}",
                s.name.cyan(),
                s.mode,
                s.provider,
                s.module
            )?;
            for check in &s.checks {
                writeln!(w, "    - {}", check)?;
            }
        }
        Ok(())
    }
}

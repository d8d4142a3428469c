//! `infraprobe validate` command handler

use std::io::Write;

use serde::Serialize;
use tracing::info;

use crate::cli::FileArgs;
use crate::commands::display;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};
use crate::scenario::ScenarioFile;

/// Execute the `validate` command.
///
/// Renders the report either way; an invalid file is a configuration error.
pub async fn execute(args: FileArgs, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %args.file.display(), "validating scenario file");

    let report = match ScenarioFile::load(&args.file).await {
        Ok(file) => ValidationReport {
            source: display(&args.file),
            valid: true,
            scenarios: file.scenarios.len(),
            checks: file.scenarios.iter().map(|s| s.checks.len()).sum(),
            errors: Vec::new(),
        },
        Err(e) => ValidationReport {
            source: display(&args.file),
            valid: false,
            scenarios: 0,
            checks: 0,
            errors: vec![e.to_string()],
        },
    };

    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("scenario file is invalid".to_owned()));
    }
    Ok(())
}

#[derive(Serialize)]
pub struct ValidationReport {
    pub source: String,
    pub valid: bool,
    pub scenarios: usize,
    pub checks: usize,
    pub errors: Vec<String>,
}

impl Render for ValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if self.valid {
            writeln!(
                w,
                "{} {}: {} scenarios, {} checks",
                "valid".green().bold(),
                self.source.bold(),
                self.scenarios,
                self.checks
            )?;
        } else {
            writeln!(w, "{} {}", "invalid".red().bold(), self.source.bold())?;
            for e in &self.errors {
                writeln!(w, "  {}", e.red())?;
            }
        }
        Ok(())
    }
}

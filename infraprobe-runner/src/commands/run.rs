//! `infraprobe run` command handler

use std::io::Write;
use std::sync::Arc;

use infraprobe_core::config::ProbeConfig;
use infraprobe_driver::TerraformCli;
use infraprobe_fetcher::CloudFetcherFactory;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::commands::display;
use crate::error::CliError;
use crate::orchestrator::{Orchestrator, RunSettings};
use crate::outcome::{CheckStatus, RunSummary, ScenarioResult, StepOutcome};
use crate::output::{OutputWriter, Render};
use crate::scenario::{Mode, ScenarioFile};

/// Execute the `run` command.
///
/// Ctrl-C cancels the run: running scenarios tear down, pending ones are
/// skipped.
pub async fn execute(
    args: RunArgs,
    config: &ProbeConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let file = ScenarioFile::load(&args.file)
        .await?
        .filter(args.filter.as_deref());
    if file.scenarios.is_empty() {
        return Err(CliError::Command(format!(
            "no scenarios in {} match '{}'",
            display(&args.file),
            args.filter.unwrap_or_default()
        )));
    }

    let mut settings = RunSettings::from_config(config);
    if let Some(parallel) = args.parallel {
        settings.max_parallel = usize::from(parallel);
    }
    info!(
        file = %args.file.display(),
        scenarios = file.scenarios.len(),
        max_parallel = settings.max_parallel,
        "starting run"
    );

    let orchestrator = Orchestrator::new(
        Arc::new(TerraformCli::from_config(&config.engine)),
        Arc::new(CloudFetcherFactory::from_config(config)),
        settings,
    );

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, tearing down running scenarios");
                cancel.cancel();
            }
        })
    };

    let summary = orchestrator.run_all(file.scenarios, &cancel).await;
    interrupt.abort();

    writer.render(&summary)?;
    if summary.passed() {
        Ok(())
    } else {
        Err(CliError::ScenariosFailed {
            failed: summary.failed_count(),
            total: summary.results.len(),
        })
    }
}

impl Render for RunSummary {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        for result in &self.results {
            render_scenario(result, w)?;
        }

        writeln!(w)?;
        let failed = self.failed_count();
        writeln!(
            w,
            "{} passed, {} failed ({:.1}s)",
            self.passed_count().to_string().green(),
            if failed > 0 {
                failed.to_string().red()
            } else {
                failed.to_string().normal()
            },
            self.duration_ms as f64 / 1000.0
        )
    }
}

fn render_scenario(result: &ScenarioResult, w: &mut dyn Write) -> std::io::Result<()> {
    use colored::Colorize;

    let verdict = if result.passed() {
        "PASS".green().bold()
    } else {
        "FAIL".red().bold()
    };
    writeln!(
        w,
        "{} {} [{}] ({:.1}s)",
        verdict,
        result.name.bold(),
        result.mode,
        result.duration_ms as f64 / 1000.0
    )?;

    let step = match result.mode {
        Mode::Plan => "plan",
        Mode::Apply => "apply",
    };
    match &result.provision {
        Some(StepOutcome::Ok) => match &result.plan {
            Some(plan) => writeln!(w, "  {step}: {}", plan)?,
            None => writeln!(w, "  {step}: {}", "ok".green())?,
        },
        Some(StepOutcome::Failed { message, .. }) => {
            writeln!(w, "  {step}: {} {}", "failed".red(), message)?;
        }
        None => writeln!(w, "  {step}: {}", "did not finish".yellow())?,
    }

    for check in &result.checks {
        match &check.status {
            CheckStatus::Passed => writeln!(w, "  {} {}", "✓".green(), check.check)?,
            CheckStatus::Failed { mismatches } => {
                writeln!(w, "  {} {}", "✗".red(), check.check)?;
                for mismatch in mismatches.entries() {
                    writeln!(w, "      {}", mismatch)?;
                }
            }
            CheckStatus::Error { message } => {
                writeln!(w, "  {} {}: {}", "!".red(), check.check, message)?;
            }
        }
    }

    if result.timed_out {
        writeln!(w, "  {}", "timed out".red())?;
    }
    if result.cancelled {
        writeln!(w, "  {}", "cancelled".yellow())?;
    }
    if let Some(error) = &result.error {
        writeln!(w, "  {} {}", "error:".red(), error)?;
    }
    match &result.destroy {
        Some(StepOutcome::Ok) => writeln!(w, "  destroy: {}", "ok".green())?,
        Some(StepOutcome::Failed { message, .. }) => {
            writeln!(w, "  destroy: {} {}", "failed".red(), message)?;
            writeln!(
                w,
                "  {} resources of environment {} may remain",
                "warning:".yellow().bold(),
                result.env_id
            )?;
        }
        None => {}
    }
    Ok(())
}

#![recursion_limit = "256"]

use std::process::ExitCode;

use clap::Parser;

use infraprobe_runner::cli::{Cli, Commands};
use infraprobe_runner::commands;
use infraprobe_runner::error::CliError;
use infraprobe_runner::logging::init_tracing;
use infraprobe_runner::output::OutputWriter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match commands::load_config(&cli).await {
        Ok(config) => config,
        Err(e) => return fail(&e),
    };
    if let Err(e) = init_tracing(&config.general) {
        eprintln!("error: {e:#}");
        return ExitCode::FAILURE;
    }
    infraprobe_core::metrics::describe_all();

    let writer = OutputWriter::new(cli.output);
    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args, &config, &writer).await,
        Commands::List(args) => commands::list::execute(args, &writer).await,
        Commands::Validate(args) => commands::validate::execute(args, &writer).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

fn fail(error: &CliError) -> ExitCode {
    eprintln!("error: {error}");
    ExitCode::from(error.exit_code())
}

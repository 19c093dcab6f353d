//! deadwood CLI entry point.

mod cli;

use clap::Parser;
use cli::{Cli, Command};
use deadwood::ir::print_module;
use deadwood::passes::DceConfig;
use deadwood::{PipelineConfig, PipelineResult, run_file};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    if let Err(e) = run(cli.command) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Logs go to stderr so stdout carries only IR and live sets.
fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Command) -> PipelineResult<()> {
    match command {
        Command::Liveness { file, no_validate } => {
            let config = PipelineConfig {
                dce: None,
                print_liveness: true,
                validate: !no_validate,
            };
            let output = run_file(&file, &config)?;
            for report in &output.reports {
                println!("; @{}", report.name);
                print!("{}", report.liveness.as_deref().unwrap_or_default());
            }
        }
        Command::Dce {
            file,
            strategy,
            max_rounds,
            print_liveness,
            no_validate,
        } => {
            let config = PipelineConfig {
                dce: Some(DceConfig {
                    strategy: strategy.into(),
                    max_rounds,
                }),
                print_liveness,
                validate: !no_validate,
            };
            let output = run_file(&file, &config)?;
            for report in &output.reports {
                if let Some(liveness) = &report.liveness {
                    eprintln!("; @{}", report.name);
                    eprint!("{liveness}");
                }
                if let Some(dce) = &report.dce {
                    eprintln!(
                        "@{}: removed {} instruction(s) in {} round(s){}",
                        report.name,
                        dce.removed_count,
                        dce.rounds,
                        if dce.reached_fixpoint { "" } else { " (stopped early)" },
                    );
                }
            }
            print!("{}", print_module(&output.functions));
        }
        Command::Check { file } => {
            let config = PipelineConfig {
                dce: None,
                print_liveness: false,
                validate: true,
            };
            let output = run_file(&file, &config)?;
            println!(
                "{}: {} function(s) ok",
                file.display(),
                output.functions.len()
            );
        }
    }
    Ok(())
}

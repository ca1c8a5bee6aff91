use std::process::ExitCode;

use clap::Parser;
use folio_cli::{Cli, load_config, run};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("folio: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    folio_telemetry::init_logging(&config.log_filter);

    let stdout = std::io::stdout();
    match run(cli.command, &mut stdout.lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("folio: {e:#}");
            ExitCode::FAILURE
        }
    }
}

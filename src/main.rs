use clap::Parser;
use passgroup::cli::{self, Cli};
use passgroup::config::AppConfig;
use passgroup::logging::init_logging;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logging is best effort; the module still runs without it.
    if let Err(e) = AppConfig::from_env().and_then(|config| init_logging(&config.log)) {
        eprintln!("Warning: logging disabled: {}", e);
    }

    match cli::run(cli) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

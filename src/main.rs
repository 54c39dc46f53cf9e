use std::process::ExitCode;

use clap::Parser;
use tracing::debug;

use tele::cli::Cli;
use tele::core::process::command_runner::{CommandRunner, SessionStatus};
use tele::domain::session::service::session_service::{resolve_request, run_session};
use tele::errors::AppError;
use tele::logging::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    // .env must be loaded before parsing so env fallbacks see it.
    dotenvy::dotenv().ok();
    let _log_guard = init_logging();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(status) => ExitCode::from(status.exit_status()),
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::from(e.exit_status())
        }
    }
}

async fn run(cli: Cli) -> Result<SessionStatus, AppError> {
    let inputs = cli.session_inputs()?;
    let options = cli.session_options();
    debug!(?options, "Starting tele");

    let runner = CommandRunner::new();
    let request = resolve_request(&runner, inputs).await?;
    run_session(&runner, &request, &options).await
}

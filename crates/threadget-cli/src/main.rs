use std::process::ExitCode;

use threadget_core::logging;

mod cli;

#[tokio::main]
async fn main() -> ExitCode {
    // The progress line owns the terminal; logs go to the state dir unless
    // that is unavailable.
    if let Err(e) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!("file logging unavailable, using stderr: {:#}", e);
    }

    match cli::run_from_args().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("threadget error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

use std::process::ExitCode;

use clap::Parser;

use grpc_hello::app::{run_client, run_server};
use grpc_hello::cli::{Cli, Mode};
use grpc_hello::observability::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match cli.to_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("grpc-hello: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.observability) {
        eprintln!("grpc-hello: failed to initialize logging: {e}");
    }

    tracing::info!(
        args = ?std::env::args().collect::<Vec<_>>(),
        mode = ?cli.mode(),
        "Starting grpc hello"
    );

    let result = match cli.mode() {
        Mode::Server => run_server(&config.server).await,
        Mode::Client => run_client(&config.client).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}

use std::process::ExitCode;

use clap::Parser;
use shapescan_server::{run_server, ServerConfig};

#[tokio::main]
async fn main() -> ExitCode {
    let config = ServerConfig::parse();
    let directive = shapescan::core::default_directive(log::LevelFilter::Info);
    shapescan::core::init_tracing(config.log_json, &directive);
    // no-op when the subscriber already bridged `log`
    let _ = tracing_log::LogTracer::init();

    match run_server(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

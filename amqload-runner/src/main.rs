//! amqload: AMQP broker load-testing driver.

#![deny(unsafe_code)]
#![warn(clippy::all)]

mod args;
mod report;
mod worker;

use args::Args;
use clap::Parser;
use tracing::error;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    amqload_core::telemetry::init(&args.log);

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(2);
        }
    };

    match worker::run(config).await {
        Ok(report) => print!("{report}"),
        Err(e) => {
            error!(error = %e, "run failed");
            std::process::exit(1);
        }
    }
}

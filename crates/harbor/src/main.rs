use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod plan;
mod ui;

use cli::{App, Commands};

fn init_logging() {
    let filter = EnvFilter::try_from_env("HARBOR_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let app = App::parse();
    init_logging();

    let result = match app.cmd {
        Commands::Run(args) => args.run().await,
        Commands::Hash(args) => args.run().await,
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

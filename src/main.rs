mod cli;

use crate::cli::app::{App, Args};
use clap::Parser;
use std::error::Error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let app = App::new(Args::parse());
    let report = app.run().await?;
    if !report.converged {
        std::process::exit(1);
    }
    Ok(())
}

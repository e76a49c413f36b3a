// kls CLI entry point
use anyhow::Result;
use clap::Parser;
use kls_cli::{execute, Cli};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_env("KLS_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let report = execute(&cli)?;
    for line in &report.lines {
        println!("{line}");
    }
    if !report.success {
        std::process::exit(1);
    }
    Ok(())
}

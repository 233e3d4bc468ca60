use clap::Parser;
use colored::*;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use thinkstream::cli::{resolve_config, Args};
use thinkstream::{ExchangeStatus, Session, TerminalSurface, Transport};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("thinkstream=warn")),
        )
        .init();

    let args = Args::parse();
    let config = resolve_config(&args)?;
    let transport = Transport::from_config(&config)?;
    let mut surface = TerminalSurface::stdout(config.show_thinking);

    // One-shot mode
    if let Some(prompt) = args.prompt.as_deref() {
        let mut session = Session::new(surface, transport);
        session.submit(prompt)?;
        if session.wait_idle().await == ExchangeStatus::Errored {
            std::process::exit(1);
        }
        return Ok(());
    }

    surface.print_banner(&config.server_url, &transport.kind().to_string());
    let mut session = Session::new(surface, transport);
    session.run(BufReader::new(tokio::io::stdin())).await?;
    println!("{}", "bye".dimmed());

    Ok(())
}

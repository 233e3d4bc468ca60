use crate::config::Config;
use crate::error::ChatError;
use crate::transport::TransportKind;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "thinkstream")]
#[command(version = "0.3.0")]
#[command(about = "Streaming chat client with a collapsible thinking region")]
pub struct Args {
    /// Send one prompt, print the reply and exit. Without it, read prompts
    /// from standard input.
    pub prompt: Option<String>,

    /// TOML configuration file
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Backend base URL (overrides the config file)
    #[arg(long)]
    pub server: Option<String>,

    /// How replies are delivered
    #[arg(long, value_enum)]
    pub transport: Option<TransportKind>,

    /// Do not stream the thinking region live
    #[arg(long)]
    pub hide_thinking: bool,
}

/// Load the config file, if any, and apply command-line overrides on top.
pub fn resolve_config(args: &Args) -> Result<Config, ChatError> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(server) = &args.server {
        config.server_url = server.clone();
    }
    if let Some(transport) = args.transport {
        config.transport = transport;
    }
    if args.hide_thinking {
        config.show_thinking = false;
    }
    config.validate()?;
    Ok(config)
}

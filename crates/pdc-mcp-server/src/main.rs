use std::path::PathBuf;

use clap::Parser;
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use pdc_mcp_server::graphql::Forwarder;
use pdc_mcp_server::server::Server;
use runtime::Config;
use tracing::info;

mod runtime;

/// Clap styling
const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// Arguments to the MCP server
#[derive(Debug, Parser)]
#[command(
    version,
    styles = STYLES,
    about = "PDC MCP Server - query the Proteomic Data Commons GraphQL API from an AI agent",
)]
struct Args {
    /// Path to the config file
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config: Config = match Args::parse().config {
        Some(config_path) => runtime::read_config(config_path)?,
        None => runtime::read_config_from_env()?,
    };

    let _guard = runtime::setup_logging(&config)?;

    info!(
        "PDC MCP Server v{} // Licensed under MIT",
        std::env!("CARGO_PKG_VERSION")
    );

    let forwarder = Forwarder::new(config.endpoint.into_inner(), config.headers)?;

    Ok(Server::builder()
        .transport(config.transport.into())
        .forwarder(forwarder)
        .build()
        .start()
        .await?)
}

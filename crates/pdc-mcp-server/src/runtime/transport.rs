use std::net::{IpAddr, Ipv4Addr};

use pdc_mcp_server::server::Transport;
use schemars::JsonSchema;
use serde::Deserialize;

/// The kind of transport the server speaks MCP over
#[derive(Debug, Default, Clone, Copy, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TransportType {
    /// Standard input and output
    Stdio,

    /// Server-sent events, with the event stream at `/sse` and messages posted to `/message`
    #[default]
    Sse,

    /// Streamable HTTP at `/mcp`
    StreamableHttp,
}

/// Transport configuration
///
/// The address and port are ignored by the stdio transport.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TransportConfig {
    /// The transport to use
    #[serde(rename = "type")]
    pub kind: TransportType,

    /// The IP address to bind to
    pub address: IpAddr,

    /// The port to bind to
    pub port: u16,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportType::default(),
            address: defaults::address(),
            port: defaults::port(),
        }
    }
}

impl From<TransportConfig> for Transport {
    fn from(config: TransportConfig) -> Self {
        let TransportConfig {
            kind,
            address,
            port,
        } = config;
        match kind {
            TransportType::Stdio => Transport::Stdio,
            TransportType::Sse => Transport::SSE { address, port },
            TransportType::StreamableHttp => Transport::StreamableHttp { address, port },
        }
    }
}

mod defaults {
    use super::*;

    pub(super) const fn address() -> IpAddr {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    }

    pub(super) const fn port() -> u16 {
        8787
    }
}

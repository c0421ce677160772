use std::net::{IpAddr, SocketAddr};

use axum::Router;
use axum::http::StatusCode;
use bon::bon;
use rmcp::ServiceExt as _;
use rmcp::transport::sse_server::SseServerConfig;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::{SseServer, StreamableHttpService, stdio};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument as _, error, info};

use crate::errors::ServerError;
use crate::graphql::Forwarder;
use crate::tools::query::Query;

mod running;

use running::Running;

/// The path of the SSE event stream
pub const SSE_PATH: &str = "/sse";

/// The path SSE clients post their messages to
pub const MESSAGE_PATH: &str = "/message";

/// The path of the Streamable HTTP endpoint
pub const STREAMABLE_HTTP_PATH: &str = "/mcp";

/// An MCP server exposing the PDC GraphQL API
pub struct Server {
    transport: Transport,
    forwarder: Forwarder,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Transport {
    Stdio,
    SSE { address: IpAddr, port: u16 },
    StreamableHttp { address: IpAddr, port: u16 },
}

#[bon]
impl Server {
    #[builder]
    pub fn new(transport: Transport, forwarder: Forwarder) -> Self {
        Self {
            transport,
            forwarder,
        }
    }

    pub async fn start(self) -> Result<(), ServerError> {
        info!(endpoint = %self.forwarder.endpoint(), "Forwarding queries to GraphQL API");
        let running = Running::new(Query::new(self.forwarder));

        match self.transport {
            Transport::Stdio => {
                info!("Starting MCP server in stdio mode");
                let service = running
                    .serve(stdio())
                    .await
                    .inspect_err(|e| {
                        error!("serving error: {:?}", e);
                    })
                    .map_err(|e| ServerError::Initialize(e.to_string()))?;
                service.waiting().await?;
            }
            Transport::SSE { address, port } => {
                info!(port = ?port, address = ?address, "Starting MCP server in SSE mode");
                let listen_address = SocketAddr::new(address, port);
                let cancellation_token = CancellationToken::new();

                let (server, router) = SseServer::new(SseServerConfig {
                    bind: listen_address,
                    sse_path: SSE_PATH.to_string(),
                    post_path: MESSAGE_PATH.to_string(),
                    ct: cancellation_token.clone(),
                    sse_keep_alive: None,
                });
                let router = with_not_found(router, &[SSE_PATH, MESSAGE_PATH]);

                // Serve the router ourselves so unknown paths get the 404 fallback
                let listener = tokio::net::TcpListener::bind(server.config.bind).await?;
                server.with_service(move || running.clone());

                async move {
                    axum::serve(listener, router)
                        .with_graceful_shutdown(async move {
                            shutdown_signal().await;
                            cancellation_token.cancel();
                        })
                        .await
                }
                .instrument(tracing::info_span!("mcp-server", bind_address = %listen_address))
                .await?;
                info!("MCP server stopped");
            }
            Transport::StreamableHttp { address, port } => {
                info!(port = ?port, address = ?address, "Starting MCP server in Streamable HTTP mode");
                let listen_address = SocketAddr::new(address, port);
                let service = StreamableHttpService::new(
                    move || Ok(running.clone()),
                    LocalSessionManager::default().into(),
                    Default::default(),
                );
                let router = with_not_found(
                    Router::new().nest_service(STREAMABLE_HTTP_PATH, service),
                    &[STREAMABLE_HTTP_PATH],
                );

                let listener = tokio::net::TcpListener::bind(listen_address).await?;
                axum::serve(listener, router)
                    .with_graceful_shutdown(shutdown_signal())
                    .await?;
                info!("MCP server stopped");
            }
        }

        Ok(())
    }
}

/// Answer every path other than the MCP endpoints with a plain-text 404
fn with_not_found(router: Router, available_paths: &[&str]) -> Router {
    let message = match available_paths {
        [path] => format!("Not found. Available endpoint: {path}"),
        paths => format!("Not found. Available endpoints: {}", paths.join(", ")),
    };
    router.fallback(move || async move { (StatusCode::NOT_FOUND, message) })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install CTRL+C signal handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

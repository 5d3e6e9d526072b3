//! HTTP transport with Streamable HTTP support for the MCP server.
//!
//! This transport uses HTTP with SSE streaming responses,
//! which is suitable for hosted agents. A `/health` route reports
//! liveness for load balancers.

use crate::db::ConnectionManager;
use crate::error::{ToolError, ToolResult};
use crate::mcp::FloatService;
use crate::tools::Dispatcher;
use crate::transport::{Transport, wait_for_signal};
use axum::Json;
use axum::routing::get;
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// HTTP transport implementation with Streamable HTTP support.
///
/// This transport provides:
/// - HTTP endpoints for MCP protocol messages
/// - Server-Sent Events for streaming responses
/// - Session management for stateful connections
pub struct HttpTransport {
    dispatcher: Dispatcher,
    /// Host to bind to
    host: String,
    /// Port to bind to
    port: u16,
    /// MCP endpoint path
    endpoint: String,
}

impl HttpTransport {
    /// Create a new HTTP transport.
    ///
    /// # Arguments
    ///
    /// * `dispatcher` - Shared tool dispatcher
    /// * `host` - Host address to bind to
    /// * `port` - Port to bind to
    /// * `endpoint` - MCP endpoint path (e.g., "/mcp")
    pub fn new(
        dispatcher: Dispatcher,
        host: impl Into<String>,
        port: u16,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            dispatcher,
            host: host.into(),
            port,
            endpoint: endpoint.into(),
        }
    }

    /// Get the bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the MCP endpoint path.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Axum router serving MCP at the endpoint plus `/health`.
    pub fn router(&self) -> axum::Router {
        let dispatcher = self.dispatcher.clone();
        let service = StreamableHttpService::new(
            move || Ok(FloatService::new(dispatcher.clone())),
            LocalSessionManager::default().into(),
            Default::default(),
        );

        let manager = Arc::clone(self.dispatcher.executor().manager());
        let tools = self.dispatcher.registry().len();
        let health = get(move || health(Arc::clone(&manager), tools));

        // nest_service doesn't support root path "/", use fallback_service instead
        if self.endpoint == "/" {
            axum::Router::new()
                .route("/health", health)
                .fallback_service(service)
        } else {
            axum::Router::new()
                .route("/health", health)
                .nest_service(&self.endpoint, service)
        }
    }
}

async fn health(manager: Arc<ConnectionManager>, tools: usize) -> Json<JsonValue> {
    Json(json!({
        "status": "ok",
        "database": manager.db_type().display_name(),
        "pool_generation": manager.generation().await,
        "tools": tools,
    }))
}

impl Transport for HttpTransport {
    async fn run(&self) -> ToolResult<()> {
        let bind_addr = self.bind_addr();
        info!("Starting MCP server with HTTP transport on {}", bind_addr);

        let app = self.router();

        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            ToolError::connection(
                format!("Failed to bind to {}: {}", bind_addr, e),
                "Check that the port is available",
            )
        })?;

        info!(endpoint = %self.endpoint, "MCP endpoint ready");

        // SSE connections may keep the server alive indefinitely, so exit is
        // forced after a timeout once a shutdown signal arrives
        const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

        let shutdown_notify = Arc::new(tokio::sync::Notify::new());
        let shutdown_notify_clone = shutdown_notify.clone();

        let shutdown_signal = async move {
            wait_for_signal().await;
            shutdown_notify_clone.notify_one();
        };

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal);

        tokio::select! {
            result = server => {
                match result {
                    Ok(()) => info!("HTTP server stopped"),
                    Err(e) => {
                        error!(error = %e, "HTTP server error");
                        self.dispatcher.executor().manager().close().await;
                        return Err(ToolError::internal(format!("HTTP server error: {}", e)));
                    }
                }
            }
            _ = async {
                shutdown_notify.notified().await;
                info!(
                    timeout_secs = GRACEFUL_TIMEOUT.as_secs(),
                    "Waiting for connections to close (send signal again to force exit)..."
                );

                tokio::select! {
                    _ = tokio::time::sleep(GRACEFUL_TIMEOUT) => {
                        warn!("Graceful shutdown timeout, forcing exit");
                    }
                    _ = wait_for_signal() => {
                        warn!("Received second signal, forcing immediate exit");
                    }
                }
            } => {}
        }

        info!("Closing database pool");
        self.dispatcher.executor().manager().close().await;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

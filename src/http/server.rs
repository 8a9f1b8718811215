//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the gateway handler
//! - Wire up middleware (timeout, request ID, tracing)
//! - Bind server to listener and run until shutdown

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::validation::{parse_origin, ValidationError};
use crate::config::{build_registry, ConfigError, GatewaySettings};
use crate::gateway::{Gateway, GatewayOptions, ShellHandler, UpstreamShell};
use crate::http::request::{MakeGatewayRequestId, X_REQUEST_ID};

/// Application state injected into the handler.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub shell: Arc<dyn ShellHandler>,
}

/// HTTP server fronting the shell origin.
pub struct GatewayServer {
    state: AppState,
    request_timeout: Duration,
}

impl GatewayServer {
    pub fn new(gateway: Gateway, shell: Arc<dyn ShellHandler>, request_timeout: Duration) -> Self {
        Self {
            state: AppState {
                gateway: Arc::new(gateway),
                shell,
            },
            request_timeout,
        }
    }

    /// Build the full server from validated settings: fragment registry,
    /// orchestrator and an upstream shell client.
    pub fn from_settings(settings: &GatewaySettings) -> Result<Self, ConfigError> {
        let registry = build_registry(settings)?;
        let origin = parse_origin(&settings.shell.origin)
            .map_err(|_| ValidationError::InvalidShellOrigin(settings.shell.origin.clone()))?;
        let gateway = Gateway::new(registry, GatewayOptions::from(settings));

        Ok(Self::new(
            gateway,
            Arc::new(UpstreamShell::new(origin)),
            Duration::from_secs(settings.timeouts.request_secs),
        ))
    }

    pub fn gateway(&self) -> &Gateway {
        &self.state.gateway
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn into_router(self) -> Router {
        Router::new()
            .fallback(gateway_handler)
            .with_state(self.state)
            .layer(TimeoutLayer::new(self.request_timeout))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeGatewayRequestId))
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            fragments = self.state.gateway.registry().len(),
            "HTTP server starting"
        );

        axum::serve(listener, self.into_router())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    state
        .gateway
        .handle(request, state.shell.as_ref())
        .await
        .into_response()
}

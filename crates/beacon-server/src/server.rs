//! `BeaconServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::routing::{get, post};
use beacon_store::TelemetryService;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::errors::PushError;
use crate::push::{PushManager, ShutdownReport};
use crate::routes;
use crate::shutdown::ShutdownCoordinator;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Telemetry use cases.
    pub service: Arc<TelemetryService>,
    /// Live push streams.
    pub push: Arc<PushManager>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
}

/// The Beacon server.
pub struct BeaconServer {
    config: ServerConfig,
    service: Arc<TelemetryService>,
    push: Arc<PushManager>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl BeaconServer {
    /// Create a new server over `service`.
    pub fn new(config: ServerConfig, service: Arc<TelemetryService>) -> Self {
        let push = Arc::new(PushManager::new(
            service.clone(),
            service.clone(),
            config.push,
        ));
        Self {
            config,
            service,
            push,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            service: self.service.clone(),
            push: self.push.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
        };

        Router::new()
            .route("/ping", get(routes::ping))
            .route("/health", get(routes::health))
            .route(
                "/sensors",
                get(routes::list_sensors).post(routes::register_sensor),
            )
            .route("/sensors/{sensor_id}", get(routes::get_sensor))
            .route("/sensors/{sensor_id}/events", get(routes::sensor_events))
            .route("/sensors/{sensor_id}/history", get(routes::sensor_history))
            .route("/events", post(routes::ingest_event))
            .route("/users", post(routes::register_user))
            .route(
                "/users/{user_id}/sensors",
                get(routes::user_sensors).post(routes::attach_user_sensor),
            )
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind and serve in the background.
    ///
    /// Returns the bound address and the server task. The task finishes once
    /// the shutdown token is cancelled and in-flight requests complete.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        info!(%addr, "beacon server listening");
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "http server failed");
            }
        });
        Ok((addr, handle))
    }

    /// Ordered teardown: stop accepting push streams, close the open ones,
    /// cancel the server token, then wait for the HTTP task.
    ///
    /// A push shutdown timeout is logged and returned, but the remaining
    /// steps still run.
    pub async fn shutdown_gracefully(
        &self,
        http: JoinHandle<()>,
    ) -> Result<ShutdownReport, PushError> {
        self.shutdown.stop_accepting();

        let push_result = self.push.shutdown().await;
        if let Err(e) = &push_result {
            warn!(error = %e, "push streams did not close in time");
        }

        let drained = self
            .shutdown
            .cancel_and_join(vec![http], self.config.http_shutdown_timeout)
            .await;
        if drained {
            info!("http server stopped");
        }
        push_result
    }

    /// Live push streams.
    pub fn push(&self) -> &Arc<PushManager> {
        &self.push
    }

    /// Telemetry use cases.
    pub fn service(&self) -> &Arc<TelemetryService> {
        &self.service
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

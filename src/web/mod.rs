//! Web server module.

mod handlers;

use crate::config::ServerConfig;
use crate::scheduler::Scheduler;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub scheduler: Arc<Scheduler>,
}

/// Read API over the polled feeds.
pub struct Server {
    state: AppState,
}

impl Server {
    pub fn new(config: ServerConfig, scheduler: Arc<Scheduler>) -> Self {
        Self {
            state: AppState { config, scheduler },
        }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

        Router::new()
            .route("/healthz", get(handlers::handle_health))
            .route("/api/feeds", get(handlers::handle_get_feeds))
            .route(
                "/api/feeds/{greenhouse}/{zone}",
                put(handlers::handle_add_feed).delete(handlers::handle_remove_feed),
            )
            .route("/api/feeds/{greenhouse}/{zone}/series", get(handlers::handle_get_series))
            .route("/api/feeds/{greenhouse}/{zone}/stats", get(handlers::handle_get_stats))
            .route("/api/feeds/{greenhouse}/{zone}/rollup", get(handlers::handle_get_rollup))
            .route("/api/feeds/{greenhouse}/{zone}/refresh", post(handlers::handle_refresh))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(self.state.clone())
    }

    /// Serve on the configured port until `shutdown` resolves.
    pub async fn start<F>(&self, shutdown: F) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).with_graceful_shutdown(shutdown).await?;

        Ok(())
    }
}

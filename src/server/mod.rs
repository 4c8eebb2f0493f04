pub mod api;
pub mod dtos;
pub mod error;
pub mod extractors;
pub mod services;
pub mod utils;

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use anyhow::Context;
use axum::{
    Extension, Router,
    extract::Request,
    http::{HeaderValue, Method},
    routing::get,
};
use tower::{Layer, ServiceBuilder};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    normalize_path::{NormalizePath, NormalizePathLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::config::AppConfig;
use api::{
    api_controller::ApiController, health_controller::health_endpoint,
    proxy_controller::ProxyController, restream_controller::RestreamController,
};
use services::FrontendServices;

static STARTED_AT: OnceLock<Instant> = OnceLock::new();

pub fn get_uptime_seconds() -> u64 {
    STARTED_AT.get_or_init(Instant::now).elapsed().as_secs()
}

pub fn get_app_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub struct ApplicationServer;

impl ApplicationServer {
    fn cors(config: &AppConfig) -> CorsLayer {
        let origin = if config.cors_origin.trim() == "*" {
            AllowOrigin::from(Any)
        } else {
            let origins: Vec<HeaderValue> = config
                .cors_origin
                .split(',')
                .filter_map(|origin| {
                    let origin = origin.trim();
                    HeaderValue::from_str(origin)
                        .map_err(|e| warn!("ignoring cors origin {}: {}", origin, e))
                        .ok()
                })
                .collect();

            AllowOrigin::list(origins)
        };

        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::OPTIONS])
    }

    /// every route, without the path normalisation (tests call this directly)
    pub fn router(services: FrontendServices) -> Router {
        let cors = Self::cors(&services.config);

        Router::new()
            .route("/health", get(health_endpoint))
            .nest("/_/proxy", ProxyController::app())
            .nest("/_/restream", RestreamController::app())
            .nest("/_/api", ApiController::app())
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(CatchPanicLayer::new())
                    .layer(cors),
            )
            .layer(Extension(services))
    }

    /// what actually gets served, `/health/` and `/health` are the same route
    pub fn app(services: FrontendServices) -> NormalizePath<Router> {
        NormalizePathLayer::trim_trailing_slash().layer(Self::router(services))
    }

    pub async fn serve(config: Arc<AppConfig>) -> anyhow::Result<()> {
        STARTED_AT.get_or_init(Instant::now);

        let services =
            FrontendServices::new(config.clone()).context("failed to start the services")?;
        let background = services.spawn_background_tasks();

        let app = Self::app(services);

        let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind to {}", addr))?;

        info!("listening on {}", addr);

        axum::serve(listener, axum::ServiceExt::<Request>::into_make_service(app))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("error while starting the server")?;

        for handle in background {
            handle.abort();
        }

        info!("server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl+c: {}", e);
    }
}

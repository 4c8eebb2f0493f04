use axum::Extension;
use axum::Json;
use axum::http::StatusCode;
use chrono::Utc;
use tokio::time::Instant;

use crate::server::dtos::health_dto::{ClientIdHealth, HealthResponse, HealthStatus};
use crate::server::services::frontend_services::FrontendServices;
use crate::server::{get_app_version, get_uptime_seconds};

/// health endpoint, reports the client id and cache state
/// a missing client id is only degraded since the next api call discovers one
pub async fn health_endpoint(
    Extension(services): Extension<FrontendServices>,
) -> (StatusCode, Json<HealthResponse>) {
    let client_id = services.client_id.snapshot();
    let now = Instant::now();

    let status = if client_id.credential.is_empty() {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    let response = HealthResponse {
        status,
        timestamp: Utc::now(),
        uptime_seconds: get_uptime_seconds(),
        version: get_app_version().to_string(),
        environment: format!("{:?}", services.config.cargo_env).to_lowercase(),
        client_id: ClientIdHealth {
            cached: !client_id.credential.is_empty(),
            site_version: client_id.version,
            expires_in_seconds: client_id
                .expires_at
                .map(|at| at.saturating_duration_since(now).as_secs()),
        },
        caches: services.catalog.cache_sizes(),
    };

    (StatusCode::OK, Json(response))
}

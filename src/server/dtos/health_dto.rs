use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::server::services::catalog_services::CacheSizes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    // no client id yet, the next api request will try discovering one
    Degraded,
}

#[derive(Debug, Serialize)]
pub struct ClientIdHealth {
    pub cached: bool,
    pub site_version: String,
    /// seconds until the cached client id expires
    pub expires_in_seconds: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub version: String,
    pub environment: String,
    pub client_id: ClientIdHealth,
    pub caches: CacheSizes,
}

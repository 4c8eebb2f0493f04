use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use serde::Deserialize;
use tracing::debug;

use crate::server::error::Error;

#[derive(Deserialize)]
struct ProxyQuery {
    url: Option<String>,
}

/// the `url` query parameter every proxy endpoint takes, host checks are left to the handler
/// since each endpoint allows different hosts
pub struct ProxyTarget(pub String);

impl<S> FromRequestParts<S> for ProxyTarget
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(query): Query<ProxyQuery> = Query::from_request_parts(parts, state)
            .await
            .map_err(|err| Error::BadRequest(err.to_string()))?;

        match query.url {
            Some(url) if !url.is_empty() => {
                debug!("proxy target: {}", url);
                Ok(ProxyTarget(url))
            }
            _ => Err(Error::BadRequest("missing url parameter".to_string())),
        }
    }
}

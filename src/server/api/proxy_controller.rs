// the media proxies, so the browser never has to talk to the upstream cdns itself
use axum::{
    Extension, Router,
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::{debug, error};

use crate::server::{
    error::{AppResult, Error},
    extractors::ProxyTarget,
    services::FrontendServices,
    utils::hls_utils::{self, ensure_host_suffix},
};
use crate::upstream::{Pool, StreamingResponse, UpstreamRequest};

const HLS_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

pub struct ProxyController;

impl ProxyController {
    pub fn app() -> Router {
        Router::new()
            .route("/images", get(Self::proxy_image))
            .route("/streams", get(Self::proxy_segment))
            .route("/streams/aac", get(Self::proxy_aac_segment))
            .route("/streams/playlist", get(Self::proxy_playlist))
            .route("/streams/playlist/aac", get(Self::proxy_aac_playlist))
    }

    /// the proxies only exist when the instance turned them on
    fn ensure_enabled(enabled: bool, what: &str) -> AppResult<()> {
        if enabled {
            Ok(())
        } else {
            Err(Error::NotFound(format!("{} proxying is disabled", what)))
        }
    }

    fn header_value(value: &str) -> AppResult<HeaderValue> {
        HeaderValue::from_str(value).map_err(|e| {
            error!("invalid header value {}: {}", value, e);
            Error::InternalServerErrorWithContext("invalid header value".to_string())
        })
    }

    /// pipes an upstream body through, the upstream connection is released when the body is
    /// done or the client goes away
    fn passthrough(
        upstream: StreamingResponse,
        content_type: Option<&str>,
        cache_control: Option<&str>,
    ) -> AppResult<Response> {
        let mut response = Response::new(Body::from_stream(upstream.body));
        *response.status_mut() = StatusCode::OK;

        let headers = response.headers_mut();

        if let Some(content_type) = content_type.or(upstream.content_type.as_deref()) {
            headers.insert(header::CONTENT_TYPE, Self::header_value(content_type)?);
        }

        if let Some(cache_control) = cache_control {
            headers.insert(header::CACHE_CONTROL, Self::header_value(cache_control)?);
        }

        match upstream.content_encoding.as_deref() {
            Some(encoding) => {
                headers.insert(header::CONTENT_ENCODING, Self::header_value(encoding)?);
            }
            None => {
                if let Some(length) = upstream.content_length {
                    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
                }
            }
        }

        Ok(response)
    }

    async fn stream_from(
        services: &FrontendServices,
        pool: Pool,
        request: UpstreamRequest,
    ) -> AppResult<StreamingResponse> {
        let upstream = services.transport.stream(pool, request).await?;

        if upstream.status != 200 {
            debug!("proxy upstream answered {}", upstream.status);
            return Err(Error::UpstreamStatus {
                context: "proxy",
                status: upstream.status,
            });
        }

        Ok(upstream)
    }

    async fn proxy_image(
        Extension(services): Extension<FrontendServices>,
        ProxyTarget(url): ProxyTarget,
    ) -> AppResult<Response> {
        Self::ensure_enabled(services.config.proxy_images, "image")?;

        let mut target = ensure_host_suffix(&url, &services.endpoints.cdn_suffix)?;
        let host = target.host_str().unwrap_or_default().to_string();

        // i1, i2, ... all serve the same thing, al. lives on its own
        let pool = if host.starts_with("al") {
            Pool::ImagesAlt
        } else {
            if host.starts_with('i') {
                target
                    .set_host(Some(&services.endpoints.images))
                    .map_err(|e| Error::BadRequest(e.to_string()))?;
            }
            Pool::Images
        };

        // images are too small for compression to be worth it
        let upstream = Self::stream_from(
            &services,
            pool,
            UpstreamRequest::get(target.as_str()).without_compression(),
        )
        .await?;

        let content_type = upstream
            .content_type
            .clone()
            .unwrap_or_else(|| "image/jpeg".to_string());

        Self::passthrough(
            upstream,
            Some(&content_type),
            Some(&services.config.image_cache_control),
        )
    }

    async fn proxy_segment(
        Extension(services): Extension<FrontendServices>,
        ProxyTarget(url): ProxyTarget,
    ) -> AppResult<Response> {
        Self::ensure_enabled(services.config.proxy_streams, "stream")?;

        let target = ensure_host_suffix(&url, &services.endpoints.cdn_suffix)?;

        let upstream = Self::stream_from(
            &services,
            Pool::HlsStreaming,
            UpstreamRequest::get(target.as_str()),
        )
        .await?;

        Self::passthrough(upstream, None, None)
    }

    async fn proxy_aac_segment(
        Extension(services): Extension<FrontendServices>,
        ProxyTarget(url): ProxyTarget,
    ) -> AppResult<Response> {
        Self::ensure_enabled(services.config.proxy_streams, "stream")?;

        let target = ensure_host_suffix(&url, &services.endpoints.cloud_suffix)?;

        let upstream = Self::stream_from(
            &services,
            Pool::HlsAac,
            UpstreamRequest::get(target.as_str()),
        )
        .await?;

        Self::passthrough(upstream, None, None)
    }

    async fn fetch_playlist(
        services: &FrontendServices,
        pool: Pool,
        url: &str,
    ) -> AppResult<String> {
        let response = services
            .transport
            .fetch(pool, UpstreamRequest::get(url))
            .await?;

        if !response.is_ok() {
            return Err(Error::UpstreamStatus {
                context: "proxy playlist",
                status: response.status,
            });
        }

        Ok(response.text())
    }

    fn playlist_response(body: String) -> Response {
        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, HLS_CONTENT_TYPE),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            body,
        )
            .into_response()
    }

    async fn proxy_playlist(
        Extension(services): Extension<FrontendServices>,
        ProxyTarget(url): ProxyTarget,
    ) -> AppResult<Response> {
        Self::ensure_enabled(services.config.proxy_streams, "stream")?;

        let target = ensure_host_suffix(&url, &services.endpoints.cdn_suffix)?;
        let playlist = Self::fetch_playlist(&services, Pool::Hls, target.as_str()).await?;

        Ok(Self::playlist_response(hls_utils::rewrite_mp3_playlist(
            &playlist,
        )))
    }

    async fn proxy_aac_playlist(
        Extension(services): Extension<FrontendServices>,
        ProxyTarget(url): ProxyTarget,
    ) -> AppResult<Response> {
        Self::ensure_enabled(services.config.proxy_streams, "stream")?;

        let target = ensure_host_suffix(&url, &services.endpoints.cloud_suffix)?;
        let playlist = Self::fetch_playlist(&services, Pool::HlsAac, target.as_str()).await?;

        Ok(Self::playlist_response(hls_utils::rewrite_aac_playlist(
            &playlist,
        )))
    }
}

// the pooled clients, one per upstream host. reqwest keeps the connections alive for us so all
// that's left here is picking the right client, the retry policy and decompression
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use flate2::read::{GzDecoder, ZlibDecoder};
use futures::StreamExt;
use futures::stream::BoxStream;
use mockall::automock;
use reqwest::header;
use tracing::{debug, error};

use crate::server::error::{AppResult, Error};
use crate::upstream::Endpoints;
use crate::upstream::retry::{self, RetryPolicy};

/// we always ask for compressed content and decompress it ourselves
pub const ACCEPT_ENCODING: &str = "gzip, deflate, br, zstd";

pub type DynUpstreamTransport = Arc<dyn UpstreamTransport + Send + Sync>;

/// which pooled client a request goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pool {
    /// json api, buffered
    Api,
    /// main image cdn, streaming
    Images,
    /// alternative image cdn, streaming
    ImagesAlt,
    /// mp3 hls playlists and segments, buffered (playlist rewriting, restreaming)
    Hls,
    /// mp3 hls segments passed straight through to the browser
    HlsStreaming,
    /// fragmented mp4 aac variant, streaming
    HlsAac,
    /// anything else, used for the web shell and script bundle
    Generic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    pub url: String,
    pub retry: RetryPolicy,
    pub accept_encoding: bool,
    pub accept_language: bool,
}

impl UpstreamRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            retry: RetryPolicy::Transient,
            accept_encoding: true,
            accept_language: false,
        }
    }

    pub fn retry_all(mut self) -> Self {
        self.retry = RetryPolicy::All;
        self
    }

    /// images are too small to bother compressing
    pub fn without_compression(mut self) -> Self {
        self.accept_encoding = false;
        self
    }

    /// the paginated endpoints hand out captchas without it
    pub fn with_accept_language(mut self) -> Self {
        self.accept_language = true;
        self
    }
}

/// a fully read, decompressed response
#[derive(Debug, Clone, Default)]
pub struct UpstreamResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            content_type: None,
            body: body.into(),
        }
    }

    pub fn with_status(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type: None,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// a response whose body hasn't been read yet
///
/// dropping it (or the stream) hands the connection back to the pool, so whoever ends up owning
/// the body is the one that releases it
pub struct StreamingResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub content_length: Option<u64>,
    pub body: BoxStream<'static, Result<Bytes, std::io::Error>>,
}

impl std::fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("content_encoding", &self.content_encoding)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

#[automock]
#[async_trait]
pub trait UpstreamTransport {
    /// send the request and read the whole body, decompressing it if needed
    async fn fetch(&self, pool: Pool, request: UpstreamRequest) -> AppResult<UpstreamResponse>;

    /// send the request but leave the body for the caller to drain
    async fn stream(&self, pool: Pool, request: UpstreamRequest) -> AppResult<StreamingResponse>;
}

struct PoolSettings {
    user_agent: String,
    idle_timeout: Duration,
}

/// the real transport, backed by one reqwest client per upstream host
pub struct HttpTransport {
    api: reqwest::Client,
    images: reqwest::Client,
    images_alt: reqwest::Client,
    hls: reqwest::Client,
    hls_streaming: reqwest::Client,
    hls_aac: reqwest::Client,
    generic: reqwest::Client,
    user_agent: String,
}

impl HttpTransport {
    pub fn new(user_agent: &str, idle_timeout: Duration, endpoints: &Endpoints) -> Self {
        let settings = PoolSettings {
            user_agent: user_agent.to_string(),
            idle_timeout,
        };

        debug!(
            "building upstream pools for {}, {}, {}, {}, {}",
            endpoints.api, endpoints.images, endpoints.images_alt, endpoints.hls, endpoints.hls_aac
        );

        Self {
            api: Self::host_client(&settings),
            images: Self::host_client(&settings),
            images_alt: Self::host_client(&settings),
            hls: Self::host_client(&settings),
            hls_streaming: Self::host_client(&settings),
            hls_aac: Self::host_client(&settings),
            generic: Self::host_client(&settings),
            user_agent: settings.user_agent,
        }
    }

    // the upstream only speaks http/1.1 and we want to keep idle connections for hours
    fn host_client(settings: &PoolSettings) -> reqwest::Client {
        reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .pool_idle_timeout(settings.idle_timeout)
            .tcp_keepalive(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .http1_only()
            .build()
            .unwrap_or_else(|e| {
                error!("failed to build pooled client, using defaults: {}", e);
                reqwest::Client::new()
            })
    }

    fn client(&self, pool: Pool) -> &reqwest::Client {
        match pool {
            Pool::Api => &self.api,
            Pool::Images => &self.images,
            Pool::ImagesAlt => &self.images_alt,
            Pool::Hls => &self.hls,
            Pool::HlsStreaming => &self.hls_streaming,
            Pool::HlsAac => &self.hls_aac,
            Pool::Generic => &self.generic,
        }
    }

    async fn send(&self, pool: Pool, request: &UpstreamRequest) -> AppResult<reqwest::Response> {
        let client = self.client(pool);

        retry::with_retry(request.retry, retry::is_transient, || {
            let mut builder = client
                .get(&request.url)
                .header(header::USER_AGENT, &self.user_agent);

            if request.accept_encoding {
                builder = builder.header(header::ACCEPT_ENCODING, ACCEPT_ENCODING);
            }

            if request.accept_language {
                builder = builder.header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.5");
            }

            builder.send()
        })
        .await
        .map_err(|e| {
            error!("request to {} failed ({:?}): {}", request.url, pool, e);
            Error::Network(e.to_string())
        })
    }
}

fn header_string(response: &reqwest::Response, name: header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

#[async_trait]
impl UpstreamTransport for HttpTransport {
    async fn fetch(&self, pool: Pool, request: UpstreamRequest) -> AppResult<UpstreamResponse> {
        let response = self.send(pool, &request).await?;

        let status = response.status().as_u16();
        let content_type = header_string(&response, header::CONTENT_TYPE);
        let content_encoding = header_string(&response, header::CONTENT_ENCODING);

        let bytes = response.bytes().await.map_err(|e| {
            error!("failed to read body of {}: {}", request.url, e);
            Error::Network(e.to_string())
        })?;

        // same as the upstream libraries do: if it doesn't decompress, hand back the raw body
        let body = match decompress(content_encoding.as_deref(), &bytes) {
            Ok(body) => body,
            Err(e) => {
                debug!("failed to decompress {}, using raw body: {}", request.url, e);
                bytes
            }
        };

        debug!("{} -> {} ({} bytes)", request.url, status, body.len());

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }

    async fn stream(&self, pool: Pool, request: UpstreamRequest) -> AppResult<StreamingResponse> {
        let response = self.send(pool, &request).await?;

        let status = response.status().as_u16();
        let content_type = header_string(&response, header::CONTENT_TYPE);
        let content_encoding = header_string(&response, header::CONTENT_ENCODING);
        let content_length = response.content_length();

        debug!("{} -> {} (streaming)", request.url, status);

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other))
            .boxed();

        Ok(StreamingResponse {
            status,
            content_type,
            content_encoding,
            content_length,
            body,
        })
    }
}

/// decode a body according to its `Content-Encoding`
pub fn decompress(content_encoding: Option<&str>, bytes: &Bytes) -> std::io::Result<Bytes> {
    let encoding = match content_encoding {
        Some(e) => e.trim().to_ascii_lowercase(),
        None => return Ok(bytes.clone()),
    };

    let mut out = Vec::new();

    match encoding.as_str() {
        "gzip" | "x-gzip" => {
            GzDecoder::new(&bytes[..]).read_to_end(&mut out)?;
        }
        "deflate" => {
            ZlibDecoder::new(&bytes[..]).read_to_end(&mut out)?;
        }
        "br" => {
            brotli::Decompressor::new(&bytes[..], 4096).read_to_end(&mut out)?;
        }
        "zstd" => {
            out = zstd::decode_all(&bytes[..])?;
        }
        _ => return Ok(bytes.clone()),
    }

    Ok(Bytes::from(out))
}

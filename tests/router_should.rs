mod common;

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use serde_json::{Value, json};
use tower::ServiceExt;

use common::{CLIENT_ID, StubTransport, api, endpoints, track_json};
use tunecloak::AppConfig;
use tunecloak::ApplicationServer;
use tunecloak::server::services::FrontendServices;
use tunecloak::upstream::model::AudioCodec;
use tunecloak::upstream::resolver::resolve_url;
use tunecloak::upstream::{Pool, UpstreamResponse};

fn config() -> AppConfig {
    AppConfig {
        client_id: Some(CLIENT_ID.to_string()),
        proxy_images: true,
        proxy_streams: true,
        ..AppConfig::default()
    }
}

fn router(stub: &Arc<StubTransport>, config: AppConfig) -> Router {
    let services =
        FrontendServices::with_transport(Arc::new(config), endpoints(), stub.into_dyn()).unwrap();
    ApplicationServer::router(services)
}

async fn get(router: Router, uri: &str) -> Response {
    router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn get_with(router: Router, uri: &str, headers: &[(&str, &str)]) -> Response {
    let mut request = Request::builder().uri(uri);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }

    router
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn proxied(path: &str, url: &str) -> String {
    format!("{}?url={}", path, urlencoding::encode(url))
}

fn header_str<'a>(response: &'a Response, name: header::HeaderName) -> &'a str {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_proxy_needs_a_url() {
    let stub = Arc::new(StubTransport::new());

    let response = get(router(&stub, config()), "/_/proxy/images").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["error"], "missing url parameter");

    let response = get(router(&stub, config()), "/_/proxy/images?url=").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_proxy_rejects_foreign_hosts() {
    let stub = Arc::new(StubTransport::new());

    let response = get(
        router(&stub, config()),
        &proxied("/_/proxy/images", "https://evil.example.com/a.jpg"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // the aac proxy only takes the cloud hosts
    let response = get(
        router(&stub, config()),
        &proxied("/_/proxy/streams/aac", "https://cf-hls-media.example.cdn/s.m4s"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert!(stub.calls().is_empty());
}

#[tokio::test]
async fn test_images_are_fetched_from_the_main_host() {
    let stub = Arc::new(
        StubTransport::new().route("https://i1.example.cdn/artworks-1-t500x500.jpg", UpstreamResponse::ok("jpeg")),
    );

    let response = get(
        router(&stub, config()),
        &proxied(
            "/_/proxy/images",
            "https://i4.example.cdn/artworks-1-t500x500.jpg",
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, header::CONTENT_TYPE), "image/jpeg");
    assert_eq!(
        header_str(&response, header::CACHE_CONTROL),
        "max-age=600, public, immutable"
    );
    assert_eq!(body_text(response).await, "jpeg");
    assert_eq!(stub.calls()[0].0, Pool::Images);
}

#[tokio::test]
async fn test_alt_images_use_their_own_pool() {
    let mut png = UpstreamResponse::ok("png");
    png.content_type = Some("image/png".to_string());
    let stub = Arc::new(StubTransport::new().route("https://al.example.cdn/a.png", png));

    let response = get(
        router(&stub, config()),
        &proxied("/_/proxy/images", "https://al.example.cdn/a.png"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, header::CONTENT_TYPE), "image/png");
    assert_eq!(stub.calls()[0].0, Pool::ImagesAlt);
}

#[tokio::test]
async fn test_playlists_are_rewritten() {
    let playlist = "https://cf-hls-media.example.cdn/p.m3u8";
    let stub = Arc::new(StubTransport::new().route(
        playlist,
        UpstreamResponse::ok("#EXTM3U\n#EXTINF:10\nhttps://cf-hls-media.example.cdn/seg1.ts\n"),
    ));

    let response = get(
        router(&stub, config()),
        &proxied("/_/proxy/streams/playlist", playlist),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header_str(&response, header::CONTENT_TYPE),
        "application/vnd.apple.mpegurl"
    );
    assert!(body_text(response).await.contains(
        "/_/proxy/streams?url=https%3A%2F%2Fcf-hls-media.example.cdn%2Fseg1.ts"
    ));
    assert_eq!(stub.calls()[0].0, Pool::Hls);
}

#[tokio::test]
async fn test_segment_errors_keep_the_upstream_status() {
    let stub = Arc::new(StubTransport::new());

    let response = get(
        router(&stub, config()),
        &proxied("/_/proxy/streams", "https://cf-hls-media.example.cdn/gone.ts"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(stub.calls()[0].0, Pool::HlsStreaming);
}

#[tokio::test]
async fn test_served_app_ignores_trailing_slashes() {
    let stub = Arc::new(StubTransport::new());
    let services =
        FrontendServices::with_transport(Arc::new(config()), endpoints(), stub.into_dyn()).unwrap();

    let response = ApplicationServer::app(services)
        .oneshot(Request::builder().uri("/health/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_reports_the_client_id() {
    let stub = Arc::new(StubTransport::new());

    let response = get(router(&stub, config()), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["client_id"]["cached"], true);
    assert_eq!(body["caches"]["tracks"], 0);

    let without_client_id = AppConfig::default();
    let response = get(router(&stub, without_client_id), "/health").await;
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["status"], "degraded");
    assert!(stub.calls().is_empty());
}

fn hls_track() -> Value {
    json!({
        "kind": "track",
        "id": 1,
        "title": "song",
        "permalink": "song",
        "genre": "House",
        "artwork_url": "https://i1.example.cdn/artworks-1-large.jpg",
        "full_duration": 240000,
        "track_authorization": "auth",
        "media": { "transcodings": [
            {
                "url": api("/media/soundcloud:tracks:1/a/stream/hls"),
                "preset": "mp3_0_1",
                "format": { "protocol": "hls", "mime_type": "audio/mpeg" }
            },
            {
                "url": api("/media/soundcloud:tracks:1/b/stream/hls"),
                "preset": "opus_0_0",
                "format": { "protocol": "hls", "mime_type": "audio/ogg; codecs=\"opus\"" }
            }
        ]},
        "user": { "kind": "user", "id": 7, "permalink": "artist" }
    })
}

fn ticket(transcoding: &str) -> String {
    format!(
        "{}?client_id={}&track_authorization=auth",
        api(&format!("/media/soundcloud:tracks:1/{}/stream/hls", transcoding)),
        CLIENT_ID
    )
}

fn hls_stub() -> Arc<StubTransport> {

    Arc::new(
        StubTransport::new()
            .json(resolve_url(&endpoints(), CLIENT_ID, "artist/song"), hls_track())
            .json(ticket("a"), json!({ "url": "https://cf-hls-media.example.cdn/p.m3u8" }))
            .json(ticket("b"), json!({ "url": "https://cf-hls-media.example.cdn/o.m3u8" }))
            .route(
                "https://cf-hls-media.example.cdn/o.m3u8",
                UpstreamResponse::ok("#EXTM3U\n#EXTINF:10\nhttps://cf-hls-media.example.cdn/1.opus\n"),
            )
            .route("https://cf-hls-media.example.cdn/1.opus", UpstreamResponse::ok("opus"))
            .route(
                "https://i1.example.cdn/artworks-1-original.jpg",
                UpstreamResponse::ok("cover"),
            )
            .route(
                "https://cf-hls-media.example.cdn/p.m3u8",
                UpstreamResponse::ok(
                    "#EXTM3U\n#EXTINF:10\nhttps://cf-hls-media.example.cdn/1.mp3\n#EXTINF:10\nhttps://cf-hls-media.example.cdn/2.mp3\n",
                ),
            )
            .route("https://cf-hls-media.example.cdn/1.mp3", UpstreamResponse::ok("first"))
            .route("https://cf-hls-media.example.cdn/2.mp3", UpstreamResponse::ok("second")),
    )
}

#[tokio::test]
async fn test_restream_is_off_by_default() {
    let stub = hls_stub();

    let response = get(router(&stub, config()), "/_/restream/artist/song").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(stub.calls().is_empty());
}

#[tokio::test]
async fn test_restream_stitches_the_segments() {
    let stub = hls_stub();
    let config = AppConfig {
        restream: true,
        ..config()
    };

    let response = get(router(&stub, config), "/_/restream/artist/song").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, header::CONTENT_TYPE), "audio/mpeg");
    assert_eq!(
        header_str(&response, header::CONTENT_DISPOSITION),
        "attachment; filename=\"song.mp3\""
    );
    assert_eq!(body_text(response).await, "firstsecond");
}

#[tokio::test]
async fn test_restream_rejects_unknown_codecs() {
    let stub = hls_stub();
    let config = AppConfig {
        restream: true,
        ..config()
    };

    let response = get(router(&stub, config), "/_/restream/artist/song?audio=flac").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_track_api_includes_the_stream() {
    let stub = hls_stub();
    let config = AppConfig {
        proxy_streams: true,
        proxy_images: true,
        ..config()
    };

    let response = get(router(&stub, config), "/_/api/tracks/artist/song").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["track"]["permalink"], "song");
    assert_eq!(body["audio"], "mpeg");
    assert_eq!(
        body["stream"],
        "/_/proxy/streams/playlist?url=https%3A%2F%2Fcf-hls-media.example.cdn%2Fp.m3u8"
    );
}

#[tokio::test]
async fn test_unknown_listings_are_not_found() {
    let stub = hls_stub();

    let response = get(router(&stub, config()), "/_/api/tracks/artist/song/likes").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_disabled_proxies_are_not_found() {
    let stub = Arc::new(StubTransport::new().route(
        "https://i1.example.cdn/a.jpg",
        UpstreamResponse::ok("jpeg"),
    ));
    let config = AppConfig {
        proxy_images: false,
        proxy_streams: false,
        ..config()
    };

    for uri in [
        proxied("/_/proxy/images", "https://i1.example.cdn/a.jpg"),
        proxied("/_/proxy/streams", "https://cf-hls-media.example.cdn/1.mp3"),
        proxied("/_/proxy/streams/playlist", "https://cf-hls-media.example.cdn/p.m3u8"),
        proxied(
            "/_/proxy/streams/aac",
            "https://playback.media-streaming.example.cloud/s.m4s",
        ),
        proxied(
            "/_/proxy/streams/aac/playlist",
            "https://playback.media-streaming.example.cloud/p.m3u8",
        ),
    ] {
        let response = get(router(&stub, config.clone()), &uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
    }

    assert!(stub.calls().is_empty());
}

#[tokio::test]
async fn test_image_proxy_is_independent_of_the_stream_proxy() {
    let stub = Arc::new(StubTransport::new().route(
        "https://i1.example.cdn/a.jpg",
        UpstreamResponse::ok("jpeg"),
    ));
    let config = AppConfig {
        proxy_streams: false,
        ..config()
    };

    let response = get(
        router(&stub, config.clone()),
        &proxied("/_/proxy/images", "https://i1.example.cdn/a.jpg"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(
        router(&stub, config),
        &proxied("/_/proxy/streams/playlist", "https://cf-hls-media.example.cdn/p.m3u8"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(stub.calls().len(), 1);
}

#[tokio::test]
async fn test_hls_codec_comes_from_the_config_or_the_query() {
    let stub = hls_stub();
    let config = AppConfig {
        hls_audio: AudioCodec::Opus,
        ..config()
    };

    let response = get(router(&stub, config.clone()), "/_/api/tracks/artist/song").await;
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["audio"], "opus");
    assert!(body["stream"].as_str().unwrap().contains("o.m3u8"));

    let response = get(
        router(&stub, config.clone()),
        "/_/api/tracks/artist/song?audio=mpeg",
    )
    .await;
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["audio"], "mpeg");
    assert!(body["stream"].as_str().unwrap().contains("p.m3u8"));

    let response = get(router(&stub, config), "/_/api/tracks/artist/song?audio=flac").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_restream_codec_comes_from_the_config() {
    let stub = hls_stub();
    let config = AppConfig {
        restream: true,
        restream_audio: AudioCodec::Opus,
        ..config()
    };

    let response = get(router(&stub, config), "/_/restream/artist/song").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header_str(&response, header::CONTENT_DISPOSITION),
        "attachment; filename=\"song.ogg\""
    );
    assert_eq!(body_text(response).await, "opus");
}

#[tokio::test]
async fn test_downloads_are_tagged() {
    let stub = hls_stub();
    let config = AppConfig {
        restream: true,
        ..config()
    };

    let response = get(
        router(&stub, config),
        "/_/restream/artist/song?metadata=true&title=&author=someone+else",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_bytes(response).await;
    let text = String::from_utf8_lossy(&body);

    assert!(body.starts_with(b"ID3\x04\x00"));
    assert!(text.ends_with("firstsecond"));
    // an empty override keeps what the track says
    assert!(text.contains("TIT2"));
    assert!(text.contains("song"));
    assert!(text.contains("someone else"));
    assert!(text.contains("House"));
    assert!(text.contains("cover"));

    // the cover comes in full size
    assert_eq!(stub.count("https://i1.example.cdn/artworks-1-original.jpg"), 1);
    assert_eq!(
        stub.calls()
            .iter()
            .find(|(_, url)| url.contains("original"))
            .map(|(pool, _)| *pool),
        Some(Pool::Images)
    );
}

#[tokio::test]
async fn test_plain_restreams_are_not_tagged() {
    let stub = hls_stub();
    let config = AppConfig {
        restream: true,
        ..config()
    };

    let response = get(router(&stub, config), "/_/restream/artist/song?metadata=false").await;

    assert_eq!(body_text(response).await, "firstsecond");
    assert_eq!(stub.count("https://i1.example.cdn/artworks-1-original.jpg"), 0);
}

fn user_stub() -> Arc<StubTransport> {
    Arc::new(
        StubTransport::new()
            .json(
                resolve_url(&endpoints(), CLIENT_ID, "artist"),
                json!({
                    "kind": "user", "id": 7, "permalink": "artist", "username": "artist",
                    "last_modified": "2024-01-02T03:04:05Z"
                }),
            )
            .json(
                api(&format!("/users/7/tracks?limit=20&client_id={}", CLIENT_ID)),
                json!({
                    "collection": [{
                        "kind": "track", "id": 1, "title": "track 1 & more", "permalink": "song",
                        "genre": "House", "description": "first line\n\nsecond <line>",
                        "last_modified": "2024-03-14T05:06:07Z",
                        "artwork_url": "https://i1.example.cdn/artworks-1-large.jpg",
                        "user": { "kind": "user", "id": 7, "permalink": "artist" }
                    }],
                    "next_href": null
                }),
            ),
    )
}

#[tokio::test]
async fn test_user_feed_is_rss() {
    let stub = user_stub();

    let response = get_with(
        router(&stub, config()),
        "/_/api/users/artist/feed",
        &[("host", "front.example"), ("x-forwarded-proto", "https")],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header_str(&response, header::CONTENT_TYPE),
        "application/rss+xml; charset=utf-8"
    );

    let body = body_text(response).await;
    assert!(body.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(body.contains("<title>Tracks from artist</title>"));
    assert!(body.contains("<link>https://front.example/artist</link>"));
    assert!(body.contains("<title>track 1 &amp; more</title>"));
    assert!(body.contains("<link>https://front.example/artist/song</link>"));
    assert!(body.contains("<guid isPermaLink=\"false\">1</guid>"));
    assert!(body.contains("<pubDate>Thu, 14 Mar 2024 05:06:07 +0000</pubDate>"));
    // proxied artwork is made absolute and asks for the full size
    assert!(body.contains("https://front.example/_/proxy/images?url="));
    assert!(body.contains("artworks-1-original.jpg"));
}

#[tokio::test]
async fn test_user_feed_defaults_to_http() {
    let stub = user_stub();

    let response = get_with(
        router(&stub, config()),
        "/_/api/users/artist/feed",
        &[("host", "front.example")],
    )
    .await;

    assert!(body_text(response).await.contains("<link>http://front.example/artist</link>"));
}

#[tokio::test]
async fn test_user_reposts_and_likes_are_listed() {
    let stub = Arc::new(
        StubTransport::new()
            .json(
                resolve_url(&endpoints(), CLIENT_ID, "artist"),
                json!({ "kind": "user", "id": 7, "permalink": "artist" }),
            )
            .json(
                api(&format!("/stream/users/7/reposts?limit=20&client_id={}", CLIENT_ID)),
                json!({
                    "collection": [{ "type": "track-repost", "track": track_json(2, "someone", "other") }],
                    "next_href": null
                }),
            )
            .json(
                api(&format!("/users/7/likes?limit=20&client_id={}", CLIENT_ID)),
                json!({
                    "collection": [{ "track": track_json(3, "someone", "liked") }],
                    "next_href": null
                }),
            ),
    );

    let response = get(router(&stub, config()), "/_/api/users/artist/reposts").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["collection"][0]["type"], "track-repost");
    assert_eq!(body["collection"][0]["track"]["permalink"], "other");
    assert!(
        body["collection"][0]["track"]["artwork_url"]
            .as_str()
            .unwrap()
            .starts_with("/_/proxy/images?url=")
    );

    let response = get(router(&stub, config()), "/_/api/users/artist/likes").await;
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["collection"][0]["track"]["permalink"], "liked");
}

#[tokio::test]
async fn test_search_everything_and_tags() {
    let stub = Arc::new(
        StubTransport::new()
            .json(
                api(&format!("/search?q=mix&limit=20&client_id={}", CLIENT_ID)),
                json!({
                    "collection": [
                        { "kind": "user", "id": 7, "permalink": "artist",
                          "avatar_url": "https://i1.example.cdn/avatars-7-large.jpg" },
                        track_json(1, "artist", "song")
                    ],
                    "next_href": null
                }),
            )
            .json(
                api(&format!("/recent-tracks/house?limit=20&client_id={}", CLIENT_ID)),
                json!({ "collection": [track_json(1, "artist", "song")], "next_href": null }),
            ),
    );

    let response = get(router(&stub, config()), "/_/api/search?q=mix&type=all").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["collection"][0]["kind"], "user");
    assert!(
        body["collection"][0]["avatar_url"]
            .as_str()
            .unwrap()
            .starts_with("/_/proxy/images?url=")
    );
    assert_eq!(body["collection"][1]["kind"], "track");

    let response = get(router(&stub, config()), "/_/api/tags/house").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["collection"][0]["permalink"], "song");
}

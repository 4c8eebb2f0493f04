use tunecloak::server::error::Error;
use tunecloak::server::utils::hls_utils::{
    ensure_host_suffix, ext_x_map_uri, rewrite_aac_playlist, rewrite_mp3_playlist, segment_urls,
};

const MP3_PLAYLIST: &str = "#EXTM3U\n#EXTINF:10\nhttps://cf-hls-media.example.cdn/seg1.ts\n";

const AAC_PLAYLIST: &str = "#EXTM3U\n\
#EXT-X-MAP:URI=\"https://playback.media-streaming.example.cloud/init.mp4\"\n\
#EXTINF:10\n\
https://playback.media-streaming.example.cloud/seg1.m4s\n\
#EXTINF:10\n\
https://playback.media-streaming.example.cloud/seg2.m4s\n\
#EXT-X-ENDLIST";

#[test]
fn test_mp3_segments_go_through_the_proxy() {
    let rewritten = rewrite_mp3_playlist(MP3_PLAYLIST);

    assert!(rewritten.contains(
        "/_/proxy/streams?url=https%3A%2F%2Fcf-hls-media.example.cdn%2Fseg1.ts"
    ));
    assert!(rewritten.starts_with("#EXTM3U\n#EXTINF:10\n"));
    // the trailing newline survives
    assert!(rewritten.ends_with('\n'));
}

#[test]
fn test_aac_init_segment_goes_through_the_proxy() {
    let rewritten = rewrite_aac_playlist(AAC_PLAYLIST);
    let lines: Vec<&str> = rewritten.split('\n').collect();

    assert_eq!(
        lines[1],
        "#EXT-X-MAP:URI=\"/_/proxy/streams/aac?url=https%3A%2F%2Fplayback.media-streaming.example.cloud%2Finit.mp4\""
    );
    assert_eq!(
        lines[3],
        "/_/proxy/streams/aac?url=https%3A%2F%2Fplayback.media-streaming.example.cloud%2Fseg1.m4s"
    );
    assert_eq!(lines[6], "#EXT-X-ENDLIST");
}

#[test]
fn test_ext_x_map_uri() {
    assert_eq!(
        ext_x_map_uri("#EXT-X-MAP:URI=\"https://x.example.cloud/init.mp4\""),
        Some("https://x.example.cloud/init.mp4")
    );
    assert_eq!(ext_x_map_uri("#EXTINF:10"), None);
    assert_eq!(ext_x_map_uri("#EXT-X-MAP:URI=\"unterminated"), None);
}

#[test]
fn test_segment_urls_in_playlist_order() {
    assert_eq!(
        segment_urls(AAC_PLAYLIST, true),
        vec![
            "https://playback.media-streaming.example.cloud/init.mp4",
            "https://playback.media-streaming.example.cloud/seg1.m4s",
            "https://playback.media-streaming.example.cloud/seg2.m4s",
        ]
    );

    // mp3 has no init segment to look for
    assert_eq!(segment_urls(AAC_PLAYLIST, false).len(), 2);
    assert_eq!(
        segment_urls(MP3_PLAYLIST, false),
        vec!["https://cf-hls-media.example.cdn/seg1.ts"]
    );
}

#[test]
fn test_only_allowed_hosts_pass() {
    let url = ensure_host_suffix("https://i1.example.cdn/a.jpg", ".example.cdn").unwrap();
    assert_eq!(url.host_str(), Some("i1.example.cdn"));

    assert!(matches!(
        ensure_host_suffix("https://evil.example.com/a.jpg", ".example.cdn"),
        Err(Error::BadRequest(_))
    ));
    assert!(matches!(
        ensure_host_suffix("not a url", ".example.cdn"),
        Err(Error::BadRequest(_))
    ));
    assert!(matches!(
        ensure_host_suffix("https://example.cdn.evil.com/a.jpg", ".example.cdn"),
        Err(Error::BadRequest(_))
    ));
}

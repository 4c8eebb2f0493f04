// rewriting upstream hls manifests so every segment goes through our proxy
use url::Url;

use crate::server::error::{AppResult, Error};

pub const MP3_SEGMENT_PROXY: &str = "/_/proxy/streams?url=";
pub const AAC_SEGMENT_PROXY: &str = "/_/proxy/streams/aac?url=";
pub const MP3_PLAYLIST_PROXY: &str = "/_/proxy/streams/playlist?url=";
pub const AAC_PLAYLIST_PROXY: &str = "/_/proxy/streams/playlist/aac?url=";

/// init segment of the fragmented mp4 variant
pub const EXT_X_MAP_PREFIX: &str = "#EXT-X-MAP:URI=\"";

fn is_segment_line(line: &str) -> bool {
    !line.is_empty() && !line.starts_with('#')
}

/// `#EXT-X-MAP:URI="<this>"`
pub fn ext_x_map_uri(line: &str) -> Option<&str> {
    line.strip_prefix(EXT_X_MAP_PREFIX)?.strip_suffix('"')
}

/// mp3 variant, every segment line goes through `/_/proxy/streams`
pub fn rewrite_mp3_playlist(playlist: &str) -> String {
    playlist
        .split('\n')
        .map(|line| {
            if is_segment_line(line) {
                format!("{}{}", MP3_SEGMENT_PROXY, urlencoding::encode(line))
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// fragmented mp4 variant, the init segment in `#EXT-X-MAP` gets proxied as well
pub fn rewrite_aac_playlist(playlist: &str) -> String {
    playlist
        .split('\n')
        .map(|line| {
            if let Some(uri) = ext_x_map_uri(line) {
                return format!(
                    "{}{}{}\"",
                    EXT_X_MAP_PREFIX,
                    AAC_SEGMENT_PROXY,
                    urlencoding::encode(uri)
                );
            }

            if is_segment_line(line) {
                format!("{}{}", AAC_SEGMENT_PROXY, urlencoding::encode(line))
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// segment urls of a manifest in playlist order, for aac the init segment comes first
pub fn segment_urls(playlist: &str, aac: bool) -> Vec<String> {
    playlist
        .split('\n')
        .filter_map(|line| {
            if aac {
                if let Some(uri) = ext_x_map_uri(line) {
                    return Some(uri.to_string());
                }
            }

            is_segment_line(line).then(|| line.to_string())
        })
        .collect()
}

/// parses a proxy target and makes sure it points at one of the allowed hosts
pub fn ensure_host_suffix(raw: &str, suffix: &str) -> AppResult<Url> {
    let url = Url::parse(raw).map_err(|e| Error::BadRequest(format!("invalid url: {}", e)))?;

    match url.host_str() {
        Some(host) if host.ends_with(suffix) => Ok(url),
        _ => Err(Error::BadRequest(format!("host not allowed: {}", raw))),
    }
}

use serde::{Deserialize, Serialize};
use url::{Url, form_urlencoded};

use crate::upstream::model::Track;

/// reuses the query of a `next_href` the client got earlier, minus our credential
///
/// relative cursors (`?offset=...`) work too
pub fn cursor_args(pagination: &str) -> Option<String> {
    let url = Url::parse("https://localhost/")
        .and_then(|base| base.join(pagination))
        .ok()?;
    url.query()?;

    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(url.query_pairs().filter(|(key, _)| key != "client_id"))
        .finish();

    Some(format!("?{}", query))
}

#[derive(Debug, Default, Deserialize)]
pub struct PaginationQuery {
    pub pagination: Option<String>,
}

impl PaginationQuery {
    /// empty means the endpoint's default page
    pub fn args(&self) -> String {
        self.pagination
            .as_deref()
            .and_then(cursor_args)
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
pub struct ArbitraryTrackQuery {
    /// a track url, id or `user/track` permalink
    pub input: String,
    pub audio: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    /// codec for the stream instead of the instance default
    pub audio: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MissingTracksQuery {
    /// `missing_tracks` of a playlist
    pub ids: String,
}

#[derive(Debug, Deserialize)]
pub struct SuggestionsQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct TrackResponse {
    pub track: Track,
    /// playable url, missing if no compatible stream exists (blocked tracks mostly)
    pub stream: Option<String>,
    pub audio: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MissingTracksResponse {
    pub tracks: Vec<Track>,
    pub next: String,
}

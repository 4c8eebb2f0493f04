use serde::Deserialize;

use super::api_dto::cursor_args;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    #[default]
    Tracks,
    Users,
    Playlists,
    /// everything at once
    All,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default, rename = "type")]
    pub kind: SearchKind,
    /// `next_href` of a previous page, its query is reused as is
    pub pagination: Option<String>,
}

impl SearchQuery {
    /// the query string the upstream search endpoints take
    pub fn args(&self) -> String {
        if let Some(args) = self.pagination.as_deref().and_then(cursor_args) {
            return args;
        }

        format!("?q={}&limit=20", urlencoding::encode(&self.q))
    }
}

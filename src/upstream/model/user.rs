use serde::{Deserialize, Serialize};
use url::{Position, Url};

use super::{flexible_id, nullable};
use crate::upstream::fixups::{self, ArtworkSize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "avatar_url", default, deserialize_with = "nullable")]
    pub avatar: String,
    #[serde(default, deserialize_with = "nullable")]
    pub created_at: String,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    #[serde(rename = "followers_count", default, deserialize_with = "nullable")]
    pub followers: i64,
    #[serde(rename = "followings_count", default, deserialize_with = "nullable")]
    pub following: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub full_name: String,
    // should always be "user"!
    #[serde(default, deserialize_with = "nullable")]
    pub kind: String,
    #[serde(default, deserialize_with = "nullable")]
    pub last_modified: String,
    #[serde(rename = "likes_count", default, deserialize_with = "nullable")]
    pub liked: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub permalink: String,
    #[serde(rename = "playlist_count", default, deserialize_with = "nullable")]
    pub playlists: i64,
    #[serde(rename = "track_count", default, deserialize_with = "nullable")]
    pub tracks: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub urn: String,
    #[serde(default, deserialize_with = "nullable")]
    pub username: String,
    #[serde(default, deserialize_with = "nullable")]
    pub verified: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub station_permalink: String,
    /// numeric id, filled from `urn` by `fix` when the api only sends that
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: String,
    /// links from the profile, only there when the instance fetches them
    #[serde(default, skip_deserializing, skip_serializing_if = "Vec::is_empty")]
    pub web_profiles: Vec<WebProfile>,
}

/// a link a user put on their profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebProfile {
    #[serde(default, deserialize_with = "nullable")]
    pub url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
}

impl WebProfile {
    /// emails become `mailto:` links and links to `site` (or its subdomains) stay on the
    /// frontend. Short links go through `/on/...`
    pub fn fix(&mut self, site: &str) {
        if fixups::is_email(&self.url) {
            self.url = format!("mailto:{}", self.url);
            return;
        }

        let Ok(parsed) = Url::parse(&self.url) else {
            return;
        };

        let host = parsed.host_str().unwrap_or_default();
        if host != site && !host.ends_with(&format!(".{}", site)) {
            return;
        }

        let local = &parsed[Position::BeforePath..];
        self.url = if host == format!("on.{}", site) {
            format!("/on{}", local)
        } else {
            local.to_string()
        };
    }
}

impl User {
    pub fn fix(&mut self, large: bool) {
        self.avatar = fixups::resize_artwork(&self.avatar, ArtworkSize::from_large(large));

        if fixups::is_default_avatar(&self.avatar) {
            self.avatar.clear();
        }

        if self.id.is_empty() && !self.urn.is_empty() {
            self.id = fixups::normalize_urn(&self.urn).to_string();
        }
    }

    pub fn postfix(&mut self, proxy_images: bool) {
        if proxy_images {
            self.avatar = fixups::proxy_image(&self.avatar);
        }
    }

    pub fn href(&self) -> String {
        format!("/{}", self.permalink)
    }

    pub fn display_name(&self) -> String {
        if self.verified {
            format!("{} ☑️", self.username)
        } else {
            self.username.clone()
        }
    }
}

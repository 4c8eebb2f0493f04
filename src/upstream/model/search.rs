use serde::{Deserialize, Serialize};

use super::{User, flexible_id, nullable};
use crate::upstream::fixups::{self, ArtworkSize};

/// one hit of the combined search, users, tracks and playlists share the shape
///
/// only the fields the result lists need are here, `kind` says which ones are filled
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResult {
    /// `user`, `track`, `playlist` or `system-playlist`
    #[serde(default, deserialize_with = "nullable")]
    pub kind: String,
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub permalink: String,

    #[serde(rename = "avatar_url", default, deserialize_with = "nullable")]
    pub avatar: String,
    #[serde(default, deserialize_with = "nullable")]
    pub username: String,
    #[serde(default, deserialize_with = "nullable")]
    pub full_name: String,

    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    #[serde(rename = "user", default, deserialize_with = "nullable")]
    pub author: User,
    #[serde(rename = "artwork_url", default, deserialize_with = "nullable")]
    pub artwork: String,
    #[serde(default, deserialize_with = "nullable")]
    pub track_count: i64,
}

impl SearchResult {
    pub fn is_user(&self) -> bool {
        self.kind == "user"
    }

    pub fn fix(&mut self) {
        if self.is_user() {
            self.avatar = if fixups::is_default_avatar(&self.avatar) {
                String::new()
            } else {
                fixups::resize_artwork(&self.avatar, ArtworkSize::Small)
            };
        } else {
            self.artwork = fixups::resize_artwork(&self.artwork, ArtworkSize::Small);
        }
    }

    pub fn postfix(&mut self, proxy_images: bool) {
        if !proxy_images {
            return;
        }

        if self.is_user() {
            self.avatar = fixups::proxy_image(&self.avatar);
        } else {
            self.artwork = fixups::proxy_image(&self.artwork);
        }
    }

    pub fn href(&self) -> String {
        match self.kind.as_str() {
            "system-playlist" => format!("/discover/sets/{}", self.permalink),
            "playlist" => format!("/{}/sets/{}", self.author.permalink, self.permalink),
            "track" => format!("/{}/{}", self.author.permalink, self.permalink),
            _ => format!("/{}", self.permalink),
        }
    }
}

use serde::{Deserialize, Serialize};

use super::{Media, User, flexible_id, nullable};
use crate::upstream::fixups::{self, ArtworkSize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrackPolicy {
    // all good
    #[default]
    #[serde(rename = "ALLOW")]
    Open,
    // not available (in your country)
    #[serde(rename = "BLOCK")]
    Block,
    // only some countries get this one, sometimes drm protected
    #[serde(rename = "MONETIZE")]
    Monetize,
    // 30 second snippet
    #[serde(rename = "SNIP")]
    Snip,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Track {
    #[serde(rename = "artwork_url", default, deserialize_with = "nullable")]
    pub artwork: String,
    #[serde(rename = "comment_count", default, deserialize_with = "nullable")]
    pub comments: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub created_at: String,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    /// milliseconds
    #[serde(rename = "full_duration", default, deserialize_with = "nullable")]
    pub duration: u32,
    #[serde(default, deserialize_with = "nullable")]
    pub genre: String,
    // should always be "track"!
    #[serde(default, deserialize_with = "nullable")]
    pub kind: String,
    #[serde(default, deserialize_with = "nullable")]
    pub last_modified: String,
    #[serde(default, deserialize_with = "nullable")]
    pub license: String,
    #[serde(rename = "likes_count", default, deserialize_with = "nullable")]
    pub likes: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub permalink: String,
    #[serde(rename = "playback_count", default, deserialize_with = "nullable")]
    pub plays: i64,
    #[serde(rename = "reposts_count", default, deserialize_with = "nullable")]
    pub reposts: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub tag_list: String,
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub urn: String,
    #[serde(default, deserialize_with = "nullable")]
    pub media: Media,
    /// needed for the stream ticket, only valid for this session
    #[serde(rename = "track_authorization", default, deserialize_with = "nullable")]
    pub authorization: String,
    #[serde(rename = "user", default, deserialize_with = "nullable")]
    pub author: User,
    #[serde(default, deserialize_with = "nullable")]
    pub policy: TrackPolicy,
    #[serde(default, deserialize_with = "nullable")]
    pub station_permalink: String,
}

impl Track {
    pub fn fix(&mut self, large: bool, fix_author: bool) {
        self.artwork = fixups::resize_artwork(&self.artwork, ArtworkSize::from_large(large));

        if self.id.is_empty() && !self.urn.is_empty() {
            self.id = fixups::normalize_urn(&self.urn).to_string();
        }

        if fix_author {
            self.author.fix(false);
        }
    }

    pub fn postfix(&mut self, proxy_images: bool, fix_author: bool) {
        if proxy_images {
            self.artwork = fixups::proxy_image(&self.artwork);
        }

        if fix_author {
            self.author.postfix(proxy_images);
        }
    }

    /// playlists only embed the first few tracks fully, the rest are just ids
    pub fn is_placeholder(&self) -> bool {
        self.title.is_empty()
    }

    pub fn tags(&self) -> Vec<String> {
        fixups::parse_tag_list(&self.tag_list)
    }

    pub fn href(&self) -> String {
        format!("/{}/{}", self.author.permalink, self.permalink)
    }

    /// the key the track cache uses
    pub fn cache_key(&self) -> String {
        format!("{}/{}", self.author.permalink, self.permalink)
    }
}

use serde::{Deserialize, Serialize};

use super::{Track, User, flexible_id, nullable};
use crate::upstream::fixups::{self, ArtworkSize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Playlist {
    #[serde(rename = "artwork_url", default, deserialize_with = "nullable")]
    pub artwork: String,
    #[serde(default, deserialize_with = "nullable")]
    pub created_at: String,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    // "playlist" or "system-playlist"
    #[serde(default, deserialize_with = "nullable")]
    pub kind: String,
    #[serde(default, deserialize_with = "nullable")]
    pub last_modified: String,
    #[serde(default, deserialize_with = "nullable")]
    pub permalink: String,
    #[serde(default, deserialize_with = "nullable")]
    pub tag_list: String,
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    #[serde(rename = "set_type", default, deserialize_with = "nullable")]
    pub kind_of_set: String,
    /// ids we didn't resolve yet, comma separated, so the next batch can be loaded on scroll
    #[serde(default, skip_deserializing)]
    pub missing_tracks: String,
    #[serde(default, deserialize_with = "nullable")]
    pub tracks: Vec<Track>,
    #[serde(rename = "user", default, deserialize_with = "nullable")]
    pub author: User,
    #[serde(rename = "likes_count", default, deserialize_with = "nullable")]
    pub likes: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub track_count: i64,
    #[serde(rename = "is_album", default, deserialize_with = "nullable")]
    pub album: bool,
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub urn: String,
}

impl Playlist {
    pub fn is_playlist_kind(&self) -> bool {
        self.kind == "playlist" || self.kind == "system-playlist"
    }

    /// only resizes things, placeholder tracks are resolved by the service since that needs the
    /// network
    pub fn fix(&mut self, large: bool, fix_author: bool) {
        if large {
            for track in self.tracks.iter_mut() {
                track.fix(false, false);
            }
        }

        self.artwork = fixups::resize_artwork(&self.artwork, ArtworkSize::from_large(large));

        if self.id.is_empty() && !self.urn.is_empty() {
            self.id = fixups::normalize_urn(&self.urn).to_string();
        }

        if fix_author {
            self.author.fix(false);
        }
    }

    pub fn postfix(&mut self, proxy_images: bool, fix_tracks: bool, fix_author: bool) {
        if proxy_images {
            self.artwork = fixups::proxy_image(&self.artwork);
        }

        if fix_author {
            self.author.postfix(proxy_images);
        }

        if fix_tracks {
            for track in self.tracks.iter_mut() {
                track.postfix(proxy_images, false);
            }
        }
    }

    /// (index, id) of every placeholder track
    pub fn placeholders(&self) -> Vec<(usize, String)> {
        self.tracks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_placeholder())
            .map(|(i, t)| (i, t.id.clone()))
            .collect()
    }

    pub fn tags(&self) -> Vec<String> {
        fixups::parse_tag_list(&self.tag_list)
    }

    pub fn href(&self) -> String {
        if self.kind == "system-playlist" {
            return format!("/discover/sets/{}", self.permalink);
        }

        format!("/{}/sets/{}", self.author.permalink, self.permalink)
    }

    pub fn tracks_count(&self) -> i64 {
        if self.track_count != 0 {
            return self.track_count;
        }

        self.tracks.len() as i64
    }
}

use serde::{Deserialize, Serialize};

use super::{Playlist, Track, nullable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RepostKind {
    #[default]
    #[serde(rename = "track-repost")]
    Track,
    #[serde(rename = "playlist-repost")]
    Playlist,
    #[serde(other)]
    Unknown,
}

/// an entry of a user's repost stream, exactly one of `track` and `playlist` is set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Repost {
    #[serde(rename = "type", default, deserialize_with = "nullable")]
    pub kind: RepostKind,
    #[serde(default, deserialize_with = "nullable")]
    pub track: Option<Track>,
    #[serde(default, deserialize_with = "nullable")]
    pub playlist: Option<Playlist>,
}

impl Repost {
    pub fn fix(&mut self) {
        match self.kind {
            RepostKind::Track => {
                if let Some(track) = self.track.as_mut() {
                    track.fix(false, false);
                }
            }
            RepostKind::Playlist => {
                if let Some(playlist) = self.playlist.as_mut() {
                    playlist.fix(false, false);
                }
            }
            RepostKind::Unknown => {}
        }
    }

    pub fn postfix(&mut self, proxy_images: bool) {
        if let Some(track) = self.track.as_mut() {
            track.postfix(proxy_images, false);
        }

        if let Some(playlist) = self.playlist.as_mut() {
            playlist.postfix(proxy_images, false, false);
        }
    }
}

/// same deal as `Repost`, just without the type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Like {
    #[serde(default, deserialize_with = "nullable")]
    pub track: Option<Track>,
    #[serde(default, deserialize_with = "nullable")]
    pub playlist: Option<Playlist>,
}

impl Like {
    pub fn fix(&mut self) {
        if let Some(track) = self.track.as_mut() {
            track.fix(false, false);
        } else if let Some(playlist) = self.playlist.as_mut() {
            playlist.fix(false, false);
        }
    }

    pub fn postfix(&mut self, proxy_images: bool) {
        if let Some(track) = self.track.as_mut() {
            track.postfix(proxy_images, false);
        } else if let Some(playlist) = self.playlist.as_mut() {
            playlist.postfix(proxy_images, false, false);
        }
    }
}

use serde::{Deserialize, Serialize};

use super::{Paginated, Playlist, nullable};

/// a row on the discover page, e.g. "Trending by genre"
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Selection {
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub kind: String,
    #[serde(default)]
    pub items: Paginated<Playlist>,
}

impl Selection {
    pub fn fix(&mut self) {
        for playlist in self.items.collection.iter_mut() {
            playlist.fix(false, false);
        }
    }

    pub fn postfix(&mut self, proxy_images: bool) {
        for playlist in self.items.collection.iter_mut() {
            playlist.postfix(proxy_images, false, false);
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchSuggestion {
    #[serde(default, deserialize_with = "nullable")]
    pub query: String,
}

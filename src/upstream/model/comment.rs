use serde::{Deserialize, Serialize};

use super::{User, nullable};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default, deserialize_with = "nullable")]
    pub kind: String,
    #[serde(default, deserialize_with = "nullable")]
    pub body: String,
    /// position in the track, milliseconds
    #[serde(default, deserialize_with = "nullable")]
    pub timestamp: i64,
    #[serde(rename = "user", default, deserialize_with = "nullable")]
    pub author: User,
}

impl Comment {
    pub fn fix(&mut self) {
        self.author.fix(false);
    }

    pub fn postfix(&mut self, proxy_images: bool) {
        self.author.postfix(proxy_images);
    }
}

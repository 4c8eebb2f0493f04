use serde::{Deserialize, Serialize};

use super::AudioCodec;
use crate::config::AppConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Player {
    /// progressive file through `/_/restream`
    Restream,
    /// hls manifest played client side
    #[default]
    Hls,
    None,
}

/// per request knobs, seeded from the instance config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preferences {
    pub proxy_images: bool,
    pub proxy_streams: bool,
    pub player: Player,
    pub hls_audio: AudioCodec,
    pub restream_audio: AudioCodec,
    /// restreams with `metadata=true`
    pub download_audio: AudioCodec,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            proxy_images: false,
            proxy_streams: false,
            player: Player::Hls,
            hls_audio: AudioCodec::Mpeg,
            restream_audio: AudioCodec::Mpeg,
            download_audio: AudioCodec::Mpeg,
        }
    }
}

impl Preferences {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            proxy_images: config.proxy_images,
            proxy_streams: config.proxy_streams,
            player: if config.restream {
                Player::Restream
            } else {
                Player::Hls
            },
            hls_audio: config.hls_audio,
            restream_audio: config.restream_audio,
            download_audio: config.download_audio,
        }
    }

    /// `?audio=` wins over the instance default for the codecs
    pub fn with_audio(mut self, audio: Option<&str>) -> Result<Self, String> {
        if let Some(audio) = audio {
            let codec = audio.parse::<AudioCodec>()?;
            self.hls_audio = codec;
            self.restream_audio = codec;
            self.download_audio = codec;
        }

        Ok(self)
    }
}

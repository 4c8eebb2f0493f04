use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::nullable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Protocol {
    #[default]
    Hls,
    Progressive,
    EncryptedHls,
    // widevine
    CtrEncryptedHls,
    // fairplay
    CbcEncryptedHls,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Format {
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default, deserialize_with = "nullable")]
    pub mime_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcoding {
    #[serde(default, deserialize_with = "nullable")]
    pub url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub preset: String,
    #[serde(default)]
    pub format: Format,
    #[serde(default, deserialize_with = "nullable")]
    pub quality: String,
}

impl Transcoding {
    fn is_aac(&self) -> bool {
        self.preset == "aac_160k" || self.format.mime_type.starts_with("audio/mp4")
    }

    fn is_opus(&self) -> bool {
        self.preset.starts_with("opus_") || self.format.mime_type.contains("opus")
    }

    fn is_mpeg(&self) -> bool {
        self.format.mime_type == "audio/mpeg"
    }

    fn matches(&self, codec: AudioCodec) -> bool {
        match codec {
            AudioCodec::Aac => self.is_aac(),
            AudioCodec::Opus => self.is_opus(),
            AudioCodec::Mpeg => self.is_mpeg(),
            AudioCodec::Best => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    #[serde(default, deserialize_with = "nullable")]
    pub transcodings: Vec<Transcoding>,
}

impl Media {
    /// picks the first transcoding matching the wanted codec
    ///
    /// `Best` tries aac, then opus, then mp3. Explicit codecs fall back to mp3 when they're not
    /// available. With `progressive` only progressive transcodings are looked at, otherwise only
    /// hls ones
    pub fn select_compatible(
        &self,
        codec: AudioCodec,
        progressive: bool,
    ) -> Option<(&Transcoding, AudioCodec)> {
        let protocol = if progressive {
            Protocol::Progressive
        } else {
            Protocol::Hls
        };

        let preference: &[AudioCodec] = match codec {
            AudioCodec::Best => &[AudioCodec::Aac, AudioCodec::Opus, AudioCodec::Mpeg],
            AudioCodec::Aac => &[AudioCodec::Aac, AudioCodec::Mpeg],
            AudioCodec::Opus => &[AudioCodec::Opus, AudioCodec::Mpeg],
            AudioCodec::Mpeg => &[AudioCodec::Mpeg],
        };

        preference.iter().find_map(|wanted| {
            self.transcodings
                .iter()
                .find(|t| t.format.protocol == protocol && t.matches(*wanted))
                .map(|t| (t, *wanted))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    /// aac over opus over mp3
    Best,
    /// 160kbps m4a, rarely available
    Aac,
    /// 72kbps ogg opus, almost always available
    Opus,
    /// 128kbps mp3, always available
    #[default]
    Mpeg,
}

impl AudioCodec {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Best => "best",
            Self::Aac => "aac",
            Self::Opus => "opus",
            Self::Mpeg => "mpeg",
        }
    }

    /// file extension for downloads
    pub fn extension(self) -> &'static str {
        match self {
            Self::Aac => "m4a",
            Self::Opus => "ogg",
            Self::Mpeg | Self::Best => "mp3",
        }
    }
}

impl FromStr for AudioCodec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "best" => Ok(Self::Best),
            "aac" => Ok(Self::Aac),
            "opus" => Ok(Self::Opus),
            "mpeg" => Ok(Self::Mpeg),
            other => Err(format!("unknown audio codec: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamTicket {
    #[serde(default, deserialize_with = "nullable")]
    pub url: String,
}

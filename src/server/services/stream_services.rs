use std::sync::Arc;

use async_trait::async_trait;
use mockall::automock;
use tracing::debug;

use crate::server::error::{AppResult, Error};
use crate::server::utils::hls_utils::{AAC_PLAYLIST_PROXY, MP3_PLAYLIST_PROXY};
use crate::upstream::model::{AudioCodec, Player, Preferences, StreamTicket, Track, Transcoding};
use crate::upstream::{DynUpstreamTransport, Pool, UpstreamRequest};

use super::client_id_services::DynClientIdService;

pub type DynStreamService = Arc<dyn StreamServiceTrait + Send + Sync>;

/// a playable url plus what we picked to get it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedStream {
    pub url: String,
    pub codec: AudioCodec,
    pub transcoding: Transcoding,
}

#[automock]
#[async_trait]
pub trait StreamServiceTrait {
    /// exchanges a transcoding for its short lived media url, never cache the result
    async fn get_stream_ticket(&self, transcoding: &Transcoding, authorization: &str)
    -> AppResult<String>;

    /// picks an hls transcoding for the player, wrapping the url into the playlist proxy when
    /// the instance and the user both want that
    async fn get_stream(&self, track: &Track, preferences: &Preferences)
    -> AppResult<SelectedStream>;

    /// like `get_stream` but for restreaming: hls first, then progressive, never wrapped
    async fn get_restream(&self, track: &Track, codec: AudioCodec) -> AppResult<SelectedStream>;
}

pub struct StreamService {
    transport: DynUpstreamTransport,
    client_id: DynClientIdService,
    // instance wide switch, users can only opt into it when this is on
    proxy_streams: bool,
}

impl StreamService {
    pub fn new(
        transport: DynUpstreamTransport,
        client_id: DynClientIdService,
        proxy_streams: bool,
    ) -> Self {
        Self {
            transport,
            client_id,
            proxy_streams,
        }
    }

    fn wrap(url: &str, codec: AudioCodec) -> String {
        let prefix = match codec {
            AudioCodec::Aac => AAC_PLAYLIST_PROXY,
            _ => MP3_PLAYLIST_PROXY,
        };

        format!("{}{}", prefix, urlencoding::encode(url))
    }
}

#[async_trait]
impl StreamServiceTrait for StreamService {
    async fn get_stream_ticket(
        &self,
        transcoding: &Transcoding,
        authorization: &str,
    ) -> AppResult<String> {
        let cid = self.client_id.get_client_id().await?;
        let url = format!(
            "{}?client_id={}&track_authorization={}",
            transcoding.url, cid, authorization
        );

        let response = self
            .transport
            .fetch(Pool::Api, UpstreamRequest::get(url))
            .await?;

        if !response.is_ok() {
            return Err(Error::UpstreamStatus {
                context: "getstream",
                status: response.status,
            });
        }

        let ticket: StreamTicket = serde_json::from_slice(&response.body)?;
        if ticket.url.is_empty() {
            return Err(Error::NoUrl);
        }

        Ok(ticket.url)
    }

    async fn get_stream(
        &self,
        track: &Track,
        preferences: &Preferences,
    ) -> AppResult<SelectedStream> {
        let (transcoding, codec) = track
            .media
            .select_compatible(preferences.hls_audio, false)
            .ok_or(Error::IncompatibleStream)?;

        let mut url = self
            .get_stream_ticket(transcoding, &track.authorization)
            .await?;

        if self.proxy_streams && preferences.proxy_streams && preferences.player == Player::Hls {
            url = Self::wrap(&url, codec);
        }

        debug!("stream for {} uses {}", track.permalink, codec.as_str());

        Ok(SelectedStream {
            url,
            codec,
            transcoding: transcoding.clone(),
        })
    }

    async fn get_restream(&self, track: &Track, codec: AudioCodec) -> AppResult<SelectedStream> {
        let (transcoding, codec) = track
            .media
            .select_compatible(codec, false)
            .or_else(|| track.media.select_compatible(codec, true))
            .ok_or(Error::IncompatibleStream)?;

        let url = self
            .get_stream_ticket(transcoding, &track.authorization)
            .await?;

        Ok(SelectedStream {
            url,
            codec,
            transcoding: transcoding.clone(),
        })
    }
}

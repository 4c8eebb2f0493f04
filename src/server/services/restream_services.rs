use std::sync::Arc;

use axum::body::Bytes;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use tracing::{debug, warn};

use crate::server::error::{AppResult, Error};
use crate::server::utils::hls_utils;
use crate::server::utils::tag_utils::{self, Artwork, TrackMetadata};
use crate::upstream::model::AudioCodec;
use crate::upstream::{DynUpstreamTransport, Pool, StreamingResponse, UpstreamRequest};

const MVHD: &[u8] = b"mvhd";
// from the start of the atom name to the 32 bit duration: version/flags, creation time,
// modification time, timescale
const MVHD_DURATION_OFFSET: usize = 20;

/// overwrites the `mvhd` duration with `duration` (milliseconds)
///
/// the upstream files claim a duration shorter than all segments together. Their timescale is
/// already 1000 so the value goes in as is. Data without the marker (or too short to hold the
/// field) is left alone. Returns whether anything was patched
pub fn fix_duration(data: &mut [u8], duration: u32) -> bool {
    let Some(start) = data.windows(MVHD.len()).position(|w| w == MVHD) else {
        return false;
    };

    let at = start + MVHD_DURATION_OFFSET;
    match data.get_mut(at..at + 4) {
        Some(field) => {
            field.copy_from_slice(&duration.to_be_bytes());
            true
        }
        None => false,
    }
}

/// metadata for a download, where it goes depends on the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tagging {
    /// id3v2 in front of the mp3 data
    Id3(TrackMetadata),
    /// replaces the comment header of the ogg stream
    OpusTags(TrackMetadata),
    /// ilst atoms in the `moov` of the init segment
    Mp4(TrackMetadata),
}

impl Tagging {
    pub fn for_codec(codec: AudioCodec, metadata: TrackMetadata) -> Self {
        match codec {
            AudioCodec::Aac => Self::Mp4(metadata),
            AudioCodec::Opus => Self::OpusTags(metadata),
            AudioCodec::Mpeg | AudioCodec::Best => Self::Id3(metadata),
        }
    }
}

/// what a single `read` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Filled {
    pub len: usize,
    /// nothing left after this, can be set together with a non zero `len`
    pub eof: bool,
}

/// an hls track served as one continuous file
///
/// segments are fetched one after the other while the caller reads, there's no prefetching.
/// Only the first segment of an aac session gets its duration patched
pub struct RestreamSession {
    transport: DynUpstreamTransport,
    pool: Pool,
    segments: Vec<String>,
    index: usize,
    leftover: Bytes,
    duration: Option<u32>,
    tagging: Option<Tagging>,
    // pages the opus comment header grew by, later pages are renumbered
    ogg_shift: i32,
}

impl std::fmt::Debug for RestreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestreamSession")
            .field("pool", &self.pool)
            .field("segments", &self.segments.len())
            .field("index", &self.index)
            .field("leftover", &self.leftover.len())
            .field("duration", &self.duration)
            .field("tagged", &self.tagging.is_some())
            .finish()
    }
}

impl RestreamSession {
    /// loads the manifest at `playlist_url` and collects its segments
    ///
    /// `duration` only matters for aac, mp3 has no container header to fix
    pub async fn setup(
        transport: DynUpstreamTransport,
        playlist_url: &str,
        aac: bool,
        duration: Option<u32>,
    ) -> AppResult<Self> {
        let pool = if aac { Pool::HlsAac } else { Pool::Hls };

        let response = transport
            .fetch(pool, UpstreamRequest::get(playlist_url))
            .await?;

        if !response.is_ok() {
            return Err(Error::UpstreamStatus {
                context: "restream",
                status: response.status,
            });
        }

        let segments = hls_utils::segment_urls(&response.text(), aac);
        debug!("restreaming {} segments ({:?})", segments.len(), pool);

        Ok(Self {
            transport,
            pool,
            segments,
            index: 0,
            leftover: Bytes::new(),
            duration: if aac { duration } else { None },
            tagging: None,
            ogg_shift: 0,
        })
    }

    /// writes `tagging` into the file, call before reading anything
    ///
    /// a first segment that can't be tagged goes out untouched
    pub fn with_tags(mut self, tagging: Tagging) -> Self {
        if let Tagging::Id3(metadata) = &tagging {
            self.leftover = Bytes::from(tag_utils::id3v2_tag(metadata));
        }

        self.tagging = Some(tagging);
        self
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    fn is_done(&self) -> bool {
        self.index == self.segments.len()
    }

    async fn fetch_segment(&mut self) -> AppResult<Bytes> {
        let url = &self.segments[self.index];

        let response = self
            .transport
            .fetch(self.pool, UpstreamRequest::get(url.as_str()))
            .await?;

        if !response.is_ok() {
            warn!("segment {} of restream failed with {}", self.index, response.status);
            return Err(Error::UpstreamStatus {
                context: "restream segment",
                status: response.status,
            });
        }

        let body = if self.index == 0 {
            self.patch_first_segment(response.body)
        } else if self.ogg_shift != 0 {
            Bytes::from(tag_utils::shift_ogg_sequence(&response.body, self.ogg_shift))
        } else {
            response.body
        };

        self.index += 1;
        Ok(body)
    }

    /// the duration fix and the container tags both live in the first segment
    fn patch_first_segment(&mut self, body: Bytes) -> Bytes {
        let container_tags = matches!(
            self.tagging,
            Some(Tagging::Mp4(_)) | Some(Tagging::OpusTags(_))
        );
        if self.duration.is_none() && !container_tags {
            return body;
        }

        let mut data = body.to_vec();

        if let Some(duration) = self.duration {
            if fix_duration(&mut data, duration) {
                debug!("patched mvhd duration to {}ms", duration);
            }
        }

        match &self.tagging {
            Some(Tagging::Mp4(metadata)) => match tag_utils::inject_mp4_tags(&data, metadata) {
                Ok(tagged) => data = tagged,
                Err(e) => warn!("sending the init segment untagged: {}", e),
            },
            Some(Tagging::OpusTags(metadata)) => {
                match tag_utils::inject_opus_tags(&data, metadata) {
                    Ok((tagged, shift)) => {
                        data = tagged;
                        self.ogg_shift = shift;
                    }
                    Err(e) => warn!("sending the opus header untagged: {}", e),
                }
            }
            _ => {}
        }

        Bytes::from(data)
    }

    /// fills `buf` from the leftover of the previous segment, or the next segment if there
    /// isn't any
    pub async fn read(&mut self, buf: &mut [u8]) -> AppResult<Filled> {
        if !self.leftover.is_empty() {
            let len = buf.len().min(self.leftover.len());
            buf[..len].copy_from_slice(&self.leftover.split_to(len));

            return Ok(Filled {
                len,
                eof: len < buf.len() && self.is_done(),
            });
        }

        if self.is_done() {
            return Ok(Filled { len: 0, eof: true });
        }

        let mut data = self.fetch_segment().await?;

        let len = buf.len().min(data.len());
        buf[..len].copy_from_slice(&data.split_to(len));
        self.leftover = data;

        Ok(Filled {
            len,
            eof: len < buf.len() && self.is_done(),
        })
    }

    /// the next piece of the file, `None` once everything was handed out
    pub async fn next_chunk(&mut self) -> AppResult<Option<Bytes>> {
        if !self.leftover.is_empty() {
            return Ok(Some(std::mem::take(&mut self.leftover)));
        }

        if self.is_done() {
            return Ok(None);
        }

        self.fetch_segment().await.map(Some)
    }

    /// the whole file as a body stream, dropping it ends the session
    pub fn into_stream(self) -> BoxStream<'static, Result<Bytes, std::io::Error>> {
        stream::unfold(Some(self), |session| async move {
            let mut session = session?;

            match session.next_chunk().await {
                Ok(Some(chunk)) => Some((Ok(chunk), Some(session))),
                Ok(None) => None,
                // hand out the error and stop
                Err(e) => Some((Err(std::io::Error::other(e.to_string())), None)),
            }
        })
        .boxed()
    }
}

/// starts restream sessions and progressive passthroughs
#[derive(Clone)]
pub struct RestreamService {
    transport: DynUpstreamTransport,
}

pub type DynRestreamService = Arc<RestreamService>;

impl RestreamService {
    pub fn new(transport: DynUpstreamTransport) -> Self {
        Self { transport }
    }

    pub async fn session(
        &self,
        playlist_url: &str,
        aac: bool,
        duration: Option<u32>,
    ) -> AppResult<RestreamSession> {
        RestreamSession::setup(self.transport.clone(), playlist_url, aac, duration).await
    }

    /// cover art for a download, anything but a clean 200 just means no cover
    pub async fn artwork(&self, url: &str) -> Option<Artwork> {
        let response = match self
            .transport
            .fetch(Pool::Images, UpstreamRequest::get(url).without_compression())
            .await
        {
            Ok(response) if response.is_ok() => response,
            Ok(response) => {
                debug!("artwork {} -> {}", url, response.status);
                return None;
            }
            Err(e) => {
                debug!("failed to fetch artwork {}: {}", url, e);
                return None;
            }
        };

        Some(Artwork {
            mime_type: response
                .content_type
                .clone()
                .unwrap_or_else(|| "image/jpeg".to_string()),
            data: response.body.to_vec(),
        })
    }

    /// progressive transcodings already are a single file, just pass them through
    pub async fn progressive(&self, url: &str) -> AppResult<StreamingResponse> {
        let response = self
            .transport
            .stream(
                Pool::HlsStreaming,
                UpstreamRequest::get(url).without_compression(),
            )
            .await?;

        if response.status != 200 {
            return Err(Error::UpstreamStatus {
                context: "restream",
                status: response.status,
            });
        }

        Ok(response)
    }
}

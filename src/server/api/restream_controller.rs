use axum::{
    Extension, Router,
    body::{Body, Bytes},
    extract::{Path, Query},
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
    routing::get,
};
use futures::{StreamExt, stream};
use tracing::{debug, error};

use crate::server::{
    dtos::restream_dto::{RestreamQuery, non_empty},
    error::{AppResult, Error},
    services::{FrontendServices, restream_services::Tagging},
    utils::tag_utils::{self, TrackMetadata},
};
use crate::upstream::model::{AudioCodec, Preferences, Protocol, Track};

pub struct RestreamController;

impl RestreamController {
    pub fn app() -> Router {
        Router::new().route("/{author}/{track}", get(Self::restream))
    }

    fn headers(
        content_type: &str,
        cache_control: &str,
        permalink: &str,
        codec: AudioCodec,
    ) -> AppResult<HeaderMap> {
        let value = |v: String| {
            HeaderValue::from_str(&v).map_err(|e| {
                error!("invalid header value {}: {}", v, e);
                Error::InternalServerErrorWithContext("invalid header value".to_string())
            })
        };

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, value(content_type.to_string())?);
        headers.insert(header::CACHE_CONTROL, value(cache_control.to_string())?);
        headers.insert(
            header::CONTENT_DISPOSITION,
            value(format!(
                "attachment; filename=\"{}.{}\"",
                permalink,
                codec.extension()
            ))?,
        );

        Ok(headers)
    }

    /// tags for a download, the query can override what the track says
    async fn tagging(
        services: &FrontendServices,
        track: &Track,
        query: &RestreamQuery,
        codec: AudioCodec,
    ) -> Tagging {
        let mut metadata = TrackMetadata::for_track(track);

        if let Some(title) = non_empty(&query.title) {
            metadata.title = title.to_string();
        }
        if let Some(genre) = non_empty(&query.genre) {
            metadata.genre = genre.to_string();
        }
        if let Some(author) = non_empty(&query.author) {
            metadata.artist = author.to_string();
        }

        if !track.artwork.is_empty() {
            let original = track.artwork.replacen("t500x500", "original", 1);
            metadata.artwork = services.restream.artwork(&original).await;
        }

        Tagging::for_codec(codec, metadata)
    }

    /// the whole track as one file, hls gets stitched together segment by segment
    ///
    /// with `metadata=true` it's a download instead, tagged with the title, author, genre and
    /// cover of the track
    async fn restream(
        Extension(services): Extension<FrontendServices>,
        Path((author, track)): Path<(String, String)>,
        Query(query): Query<RestreamQuery>,
    ) -> AppResult<Response> {
        if !services.config.restream {
            return Err(Error::NotFound("restreaming is disabled".to_string()));
        }

        let preferences = Preferences::from_config(&services.config)
            .with_audio(query.audio.as_deref())
            .map_err(Error::BadRequest)?;

        let download = query.is_download();
        let codec = if download {
            preferences.download_audio
        } else {
            preferences.restream_audio
        };

        let track = services
            .catalog
            .get_track(&format!("{}/{}", author, track))
            .await?;

        let selected = services.streams.get_restream(&track, codec).await?;
        debug!(
            "restreaming {} as {} ({:?}, download: {})",
            track.permalink,
            selected.codec.as_str(),
            selected.transcoding.format.protocol,
            download
        );

        let headers = Self::headers(
            &selected.transcoding.format.mime_type,
            &services.config.restream_cache_control,
            &track.permalink,
            selected.codec,
        )?;

        let tagging = if download {
            Some(Self::tagging(&services, &track, &query, selected.codec).await)
        } else {
            None
        };

        let body = if selected.transcoding.format.protocol == Protocol::Progressive {
            let upstream = services.restream.progressive(&selected.url).await?;

            match tagging {
                Some(Tagging::Id3(metadata)) => {
                    let tag = Bytes::from(tag_utils::id3v2_tag(&metadata));
                    let head = stream::once(async move { Ok::<Bytes, std::io::Error>(tag) });
                    Body::from_stream(head.chain(upstream.body))
                }
                Some(_) => {
                    debug!("progressive {} goes out untagged", selected.codec.as_str());
                    Body::from_stream(upstream.body)
                }
                None => Body::from_stream(upstream.body),
            }
        } else {
            let aac = selected.codec == AudioCodec::Aac;
            let mut session = services
                .restream
                .session(&selected.url, aac, aac.then_some(track.duration))
                .await?;

            if let Some(tagging) = tagging {
                session = session.with_tags(tagging);
            }

            Body::from_stream(session.into_stream())
        };

        Ok((headers, body).into_response())
    }
}

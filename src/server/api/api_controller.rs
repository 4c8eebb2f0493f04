// json views of the catalog, the same data the pages are rendered from
use std::time::Duration;

use axum::{
    Extension, Json, Router,
    extract::{Path, Query},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::{debug, warn};

use crate::server::{
    dtos::{
        api_dto::{
            ArbitraryTrackQuery, MissingTracksQuery, MissingTracksResponse, PaginationQuery,
            StreamQuery, SuggestionsQuery, TrackResponse,
        },
        search_dto::{SearchKind, SearchQuery},
    },
    error::{AppResult, Error},
    services::FrontendServices,
    utils::feed_utils::{self, FEED_CONTENT_TYPE},
};
use crate::upstream::model::{
    Comment, Paginated, Playlist, Preferences, SearchSuggestion, Selection, Track, User,
};

pub struct ApiController;

fn postfix_tracks(tracks: &mut [Track], preferences: &Preferences) {
    for track in tracks.iter_mut() {
        track.postfix(preferences.proxy_images, true);
    }
}

fn postfix_users(users: &mut [User], preferences: &Preferences) {
    for user in users.iter_mut() {
        user.postfix(preferences.proxy_images);
    }
}

fn postfix_playlists(playlists: &mut [Playlist], preferences: &Preferences) {
    for playlist in playlists.iter_mut() {
        playlist.postfix(preferences.proxy_images, false, true);
    }
}

impl ApiController {
    pub fn app() -> Router {
        Router::new()
            .route("/search", get(Self::search))
            .route("/suggestions", get(Self::suggestions))
            .route("/selections", get(Self::selections))
            .route("/featured", get(Self::featured))
            .route("/resolve", get(Self::arbitrary_track))
            .route("/tags/{tag}", get(Self::recent_tracks))
            .route("/users/{user}", get(Self::user))
            .route("/users/{user}/feed", get(Self::feed))
            .route("/users/{user}/{listing}", get(Self::user_listing))
            .route("/tracks/{user}/{track}", get(Self::track))
            .route("/tracks/{user}/{track}/{listing}", get(Self::track_listing))
            .route("/playlists/missing", get(Self::missing_tracks))
            .route("/playlists/{user}/{playlist}", get(Self::playlist))
    }

    fn preferences(services: &FrontendServices) -> Preferences {
        Preferences::from_config(&services.config)
    }

    /// where the frontend is reachable from the client's point of view
    fn base_url(headers: &HeaderMap) -> String {
        let value = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

        format!(
            "{}://{}",
            value("x-forwarded-proto").unwrap_or("http"),
            value(header::HOST.as_str()).unwrap_or("localhost")
        )
    }

    async fn search(
        Extension(services): Extension<FrontendServices>,
        Query(query): Query<SearchQuery>,
    ) -> AppResult<Response> {
        let preferences = Self::preferences(&services);
        let args = query.args();
        debug!("search {:?} {}", query.kind, args);

        let response = match query.kind {
            SearchKind::Tracks => {
                let mut page = services.catalog.search_tracks(&args).await?;
                postfix_tracks(&mut page.collection, &preferences);
                Json(page).into_response()
            }
            SearchKind::Users => {
                let mut page = services.catalog.search_users(&args).await?;
                postfix_users(&mut page.collection, &preferences);
                Json(page).into_response()
            }
            SearchKind::Playlists => {
                let mut page = services.catalog.search_playlists(&args).await?;
                postfix_playlists(&mut page.collection, &preferences);
                Json(page).into_response()
            }
            SearchKind::All => {
                let mut page = services.catalog.search(&args).await?;
                for result in page.collection.iter_mut() {
                    result.postfix(preferences.proxy_images);
                }
                Json(page).into_response()
            }
        };

        Ok(response)
    }

    async fn suggestions(
        Extension(services): Extension<FrontendServices>,
        Query(query): Query<SuggestionsQuery>,
    ) -> AppResult<Json<Vec<SearchSuggestion>>> {
        if query.q.is_empty() {
            return Ok(Json(Vec::new()));
        }

        Ok(Json(services.catalog.search_suggestions(&query.q).await?))
    }

    async fn selections(
        Extension(services): Extension<FrontendServices>,
    ) -> AppResult<Json<Paginated<Selection>>> {
        let preferences = Self::preferences(&services);

        let mut page = services.catalog.get_selections().await?;
        for selection in page.collection.iter_mut() {
            selection.postfix(preferences.proxy_images);
        }

        Ok(Json(page))
    }

    async fn featured(
        Extension(services): Extension<FrontendServices>,
        Query(query): Query<PaginationQuery>,
    ) -> AppResult<Json<Paginated<Track>>> {
        let preferences = Self::preferences(&services);

        let mut page = services.catalog.get_featured_tracks(&query.args()).await?;
        postfix_tracks(&mut page.collection, &preferences);

        Ok(Json(page))
    }

    async fn recent_tracks(
        Extension(services): Extension<FrontendServices>,
        Path(tag): Path<String>,
        Query(query): Query<PaginationQuery>,
    ) -> AppResult<Json<Paginated<Track>>> {
        let mut page = services.catalog.recent_tracks(&tag, &query.args()).await?;
        postfix_tracks(&mut page.collection, &Self::preferences(&services));

        Ok(Json(page))
    }

    async fn with_stream(
        services: &FrontendServices,
        mut track: Track,
        audio: Option<&str>,
    ) -> AppResult<TrackResponse> {
        let preferences = Self::preferences(services)
            .with_audio(audio)
            .map_err(Error::BadRequest)?;

        let (stream, audio) = match services.streams.get_stream(&track, &preferences).await {
            Ok(selected) => (Some(selected.url), Some(selected.codec.as_str().to_string())),
            Err(e) => {
                warn!("no stream for {} ({:?}): {}", track.permalink, track.policy, e);
                (None, None)
            }
        };

        track.postfix(preferences.proxy_images, true);

        Ok(TrackResponse {
            track,
            stream,
            audio,
        })
    }

    async fn arbitrary_track(
        Extension(services): Extension<FrontendServices>,
        Query(query): Query<ArbitraryTrackQuery>,
    ) -> AppResult<Json<TrackResponse>> {
        let track = services.catalog.get_arbitrary_track(&query.input).await?;
        Ok(Json(
            Self::with_stream(&services, track, query.audio.as_deref()).await?,
        ))
    }

    async fn track(
        Extension(services): Extension<FrontendServices>,
        Path((user, track)): Path<(String, String)>,
        Query(query): Query<StreamQuery>,
    ) -> AppResult<Json<TrackResponse>> {
        let track = services
            .catalog
            .get_track(&format!("{}/{}", user, track))
            .await?;

        Ok(Json(
            Self::with_stream(&services, track, query.audio.as_deref()).await?,
        ))
    }

    async fn track_listing(
        Extension(services): Extension<FrontendServices>,
        Path((user, track, listing)): Path<(String, String, String)>,
        Query(query): Query<PaginationQuery>,
    ) -> AppResult<Response> {
        let preferences = Self::preferences(&services);
        let track = services
            .catalog
            .get_track(&format!("{}/{}", user, track))
            .await?;
        let args = query.args();

        let response = match listing.as_str() {
            "related" => {
                let mut page = services.catalog.track_related(&track.id, &args).await?;
                postfix_tracks(&mut page.collection, &preferences);
                Json(page).into_response()
            }
            "comments" => {
                let mut page: Paginated<Comment> =
                    services.catalog.track_comments(&track.id, &args).await?;
                for comment in page.collection.iter_mut() {
                    comment.postfix(preferences.proxy_images);
                }
                Json(page).into_response()
            }
            "sets" => {
                let mut page = services.catalog.track_playlists(&track.id, &args).await?;
                postfix_playlists(&mut page.collection, &preferences);
                Json(page).into_response()
            }
            "albums" => {
                let mut page = services.catalog.track_albums(&track.id, &args).await?;
                postfix_playlists(&mut page.collection, &preferences);
                Json(page).into_response()
            }
            other => return Err(Error::NotFound(format!("unknown track listing: {}", other))),
        };

        Ok(response)
    }

    async fn user(
        Extension(services): Extension<FrontendServices>,
        Path(user): Path<String>,
    ) -> AppResult<Json<User>> {
        let mut user = services.catalog.get_user(&user).await?;
        user.postfix(Self::preferences(&services).proxy_images);

        Ok(Json(user))
    }

    async fn user_listing(
        Extension(services): Extension<FrontendServices>,
        Path((user, listing)): Path<(String, String)>,
        Query(query): Query<PaginationQuery>,
    ) -> AppResult<Response> {
        let preferences = Self::preferences(&services);
        let user = services.catalog.get_user(&user).await?;
        let args = query.args();

        let response = match listing.as_str() {
            "tracks" => {
                let mut page = services.catalog.user_tracks(&user.id, &args).await?;
                postfix_tracks(&mut page.collection, &preferences);
                Json(page).into_response()
            }
            "popular-tracks" => {
                let mut tracks = services.catalog.user_top_tracks(&user.id).await?;
                postfix_tracks(&mut tracks, &preferences);
                Json(tracks).into_response()
            }
            "sets" => {
                let mut page = services.catalog.user_playlists(&user.id, &args).await?;
                postfix_playlists(&mut page.collection, &preferences);
                Json(page).into_response()
            }
            "albums" => {
                let mut page = services.catalog.user_albums(&user.id, &args).await?;
                postfix_playlists(&mut page.collection, &preferences);
                Json(page).into_response()
            }
            "followers" => {
                let mut page = services.catalog.user_followers(&user.id, &args).await?;
                postfix_users(&mut page.collection, &preferences);
                Json(page).into_response()
            }
            "following" => {
                let mut page = services.catalog.user_followings(&user.id, &args).await?;
                postfix_users(&mut page.collection, &preferences);
                Json(page).into_response()
            }
            "related" => {
                let mut users = services.catalog.user_related(&user.id).await?;
                postfix_users(&mut users, &preferences);
                Json(users).into_response()
            }
            "reposts" => {
                let mut page = services.catalog.user_reposts(&user.id, &args).await?;
                for repost in page.collection.iter_mut() {
                    repost.postfix(preferences.proxy_images);
                }
                Json(page).into_response()
            }
            "likes" => {
                let mut page = services.catalog.user_likes(&user.id, &args).await?;
                for like in page.collection.iter_mut() {
                    like.postfix(preferences.proxy_images);
                }
                Json(page).into_response()
            }
            other => return Err(Error::NotFound(format!("unknown user listing: {}", other))),
        };

        Ok(response)
    }

    /// rss of the newest uploads
    async fn feed(
        Extension(services): Extension<FrontendServices>,
        Path(user): Path<String>,
        headers: HeaderMap,
    ) -> AppResult<Response> {
        let preferences = Self::preferences(&services);
        let user = services.catalog.get_user(&user).await?;

        let mut page = services.catalog.user_tracks(&user.id, "?limit=20").await?;
        postfix_tracks(&mut page.collection, &preferences);

        let feed = feed_utils::user_feed(
            &user,
            &page.collection,
            &Self::base_url(&headers),
            Duration::from_secs(services.config.user_ttl),
        )?;

        Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, FEED_CONTENT_TYPE)],
            feed,
        )
            .into_response())
    }

    async fn playlist(
        Extension(services): Extension<FrontendServices>,
        Path((user, playlist)): Path<(String, String)>,
    ) -> AppResult<Json<Playlist>> {
        let mut playlist = services
            .catalog
            .get_playlist(&format!("{}/sets/{}", user, playlist))
            .await?;
        playlist.postfix(Self::preferences(&services).proxy_images, true, true);

        Ok(Json(playlist))
    }

    async fn missing_tracks(
        Extension(services): Extension<FrontendServices>,
        Query(query): Query<MissingTracksQuery>,
    ) -> AppResult<Json<MissingTracksResponse>> {
        let (mut tracks, next) = services.catalog.get_next_missing_tracks(&query.ids).await?;
        postfix_tracks(&mut tracks, &Self::preferences(&services));

        Ok(Json(MissingTracksResponse { tracks, next }))
    }
}

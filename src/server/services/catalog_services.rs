use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use mockall::automock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::cache::MemoryCache;
use crate::server::error::{AppResult, Error};
use crate::upstream::model::{
    Comment, Like, Paginated, Playlist, Repost, SearchResult, SearchSuggestion, Selection, Track,
    User, WebProfile,
};
use crate::upstream::resolver::{self, with_client_id};
use crate::upstream::{DynUpstreamTransport, Endpoints, Pool, UpstreamRequest};

use super::client_id_services::DynClientIdService;

/// how many ids `/tracks?ids=` takes at once
pub const TRACKS_BATCH_SIZE: usize = 50;

const DEFAULT_ARGS: &str = "?limit=20";

pub type DynCatalogService = Arc<dyn CatalogServiceTrait + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheSizes {
    pub users: usize,
    pub tracks: usize,
    pub playlists: usize,
}

/// read access to the upstream catalog
///
/// everything comes back `fix`ed (thumbnail sizes, ids) but not `postfix`ed, image proxying
/// depends on the request so the caller does that
#[automock]
#[async_trait]
pub trait CatalogServiceTrait {
    async fn get_user(&self, permalink: &str) -> AppResult<User>;
    async fn get_track(&self, permalink: &str) -> AppResult<Track>;
    async fn get_track_by_id(&self, id: &str) -> AppResult<Track>;

    /// api urls, site urls, bare ids and `user/track` permalinks all work
    async fn get_arbitrary_track(&self, input: &str) -> AppResult<Track>;

    /// resolves the first batch of placeholder tracks, the rest ends up in `missing_tracks`
    async fn get_playlist(&self, permalink: &str) -> AppResult<Playlist>;

    /// bulk lookup, at most `TRACKS_BATCH_SIZE` ids
    async fn get_tracks(&self, ids: Vec<String>) -> AppResult<Vec<Track>>;

    /// continues a `missing_tracks` list, returns the tracks and what's still missing
    async fn get_next_missing_tracks(&self, raw: &str) -> AppResult<(Vec<Track>, String)>;

    async fn search_tracks(&self, args: &str) -> AppResult<Paginated<Track>>;
    async fn search_users(&self, args: &str) -> AppResult<Paginated<User>>;
    async fn search_playlists(&self, args: &str) -> AppResult<Paginated<Playlist>>;
    async fn search_suggestions(&self, query: &str) -> AppResult<Vec<SearchSuggestion>>;

    /// users, tracks and playlists mixed together
    async fn search(&self, args: &str) -> AppResult<Paginated<SearchResult>>;

    /// newest tracks tagged with `tag`
    async fn recent_tracks(&self, tag: &str, args: &str) -> AppResult<Paginated<Track>>;

    async fn get_featured_tracks(&self, args: &str) -> AppResult<Paginated<Track>>;
    async fn get_selections(&self) -> AppResult<Paginated<Selection>>;

    async fn user_tracks(&self, user_id: &str, args: &str) -> AppResult<Paginated<Track>>;
    async fn user_playlists(&self, user_id: &str, args: &str) -> AppResult<Paginated<Playlist>>;
    async fn user_albums(&self, user_id: &str, args: &str) -> AppResult<Paginated<Playlist>>;
    async fn user_followers(&self, user_id: &str, args: &str) -> AppResult<Paginated<User>>;
    async fn user_followings(&self, user_id: &str, args: &str) -> AppResult<Paginated<User>>;
    async fn user_related(&self, user_id: &str) -> AppResult<Vec<User>>;
    async fn user_top_tracks(&self, user_id: &str) -> AppResult<Vec<Track>>;
    async fn user_reposts(&self, user_id: &str, args: &str) -> AppResult<Paginated<Repost>>;
    async fn user_likes(&self, user_id: &str, args: &str) -> AppResult<Paginated<Like>>;

    /// the links on a profile, already `fix`ed
    async fn user_web_profiles(&self, user_id: &str) -> AppResult<Vec<WebProfile>>;

    async fn track_related(&self, track_id: &str, args: &str) -> AppResult<Paginated<Track>>;
    async fn track_comments(&self, track_id: &str, args: &str) -> AppResult<Paginated<Comment>>;
    async fn track_playlists(&self, track_id: &str, args: &str) -> AppResult<Paginated<Playlist>>;
    async fn track_albums(&self, track_id: &str, args: &str) -> AppResult<Paginated<Playlist>>;

    fn cache_sizes(&self) -> CacheSizes;
}

pub struct CatalogService {
    transport: DynUpstreamTransport,
    endpoints: Endpoints,
    client_id: DynClientIdService,
    users: Arc<MemoryCache<User>>,
    tracks: Arc<MemoryCache<Track>>,
    playlists: Arc<MemoryCache<Playlist>>,
    web_profiles: bool,
}

fn args_or_default(args: &str) -> &str {
    if args.is_empty() { DEFAULT_ARGS } else { args }
}

impl CatalogService {
    pub fn new(
        transport: DynUpstreamTransport,
        endpoints: Endpoints,
        client_id: DynClientIdService,
        users: Arc<MemoryCache<User>>,
        tracks: Arc<MemoryCache<Track>>,
        playlists: Arc<MemoryCache<Playlist>>,
    ) -> Self {
        Self {
            transport,
            endpoints,
            client_id,
            users,
            tracks,
            playlists,
            web_profiles: false,
        }
    }

    /// `get_user` also loads the profile links, it fails if they can't be loaded
    pub fn with_web_profiles(mut self, enabled: bool) -> Self {
        self.web_profiles = enabled;
        self
    }

    async fn resolve<T: resolver::Resolvable>(&self, permalink: &str) -> AppResult<T> {
        let cid = self.client_id.get_client_id().await?;
        resolver::resolve(self.transport.as_ref(), &self.endpoints, &cid, permalink).await
    }

    /// a single page starting at `path_and_query` on the api host
    async fn page<T: DeserializeOwned + Send>(
        &self,
        path_and_query: String,
        unfold_empty: bool,
    ) -> AppResult<Paginated<T>> {
        let cid = self.client_id.get_client_id().await?;

        let mut page = Paginated::starting_at(self.endpoints.api_url(&path_and_query));
        page.proceed(self.transport.as_ref(), &cid, unfold_empty).await?;

        Ok(page)
    }

    /// plain json arrays (no cursor) from the api host
    async fn list<T: DeserializeOwned>(
        &self,
        path_and_query: String,
        context: &'static str,
    ) -> AppResult<Vec<T>> {
        let cid = self.client_id.get_client_id().await?;
        let url = with_client_id(&self.endpoints.api_url(&path_and_query), &cid);

        let response = self
            .transport
            .fetch(Pool::Api, UpstreamRequest::get(url))
            .await?;

        if !response.is_ok() {
            return Err(Error::UpstreamStatus {
                context,
                status: response.status,
            });
        }

        Ok(serde_json::from_slice(&response.body)?)
    }

    fn fix_tracks(mut page: Paginated<Track>) -> Paginated<Track> {
        for track in page.collection.iter_mut() {
            track.fix(false, true);
        }
        page
    }

    fn fix_users(mut page: Paginated<User>) -> Paginated<User> {
        for user in page.collection.iter_mut() {
            user.fix(false);
        }
        page
    }

    fn fix_playlists(mut page: Paginated<Playlist>) -> Paginated<Playlist> {
        for playlist in page.collection.iter_mut() {
            playlist.fix(false, true);
        }
        page
    }

    /// swaps placeholder tracks for the real thing, one batch worth of them
    async fn fill_missing_tracks(&self, playlist: &mut Playlist) -> AppResult<()> {
        let mut placeholders = playlist.placeholders();
        if placeholders.is_empty() {
            return Ok(());
        }

        let rest = if placeholders.len() > TRACKS_BATCH_SIZE {
            placeholders.split_off(TRACKS_BATCH_SIZE)
        } else {
            Vec::new()
        };

        let ids = placeholders.iter().map(|(_, id)| id.clone()).collect();
        let mut resolved: HashMap<String, Track> = self
            .get_tracks(ids)
            .await?
            .into_iter()
            .map(|t| (t.id.clone(), t))
            .collect();

        for (index, id) in placeholders {
            if let Some(track) = resolved.remove(&id) {
                playlist.tracks[index] = track;
            }
        }

        playlist.missing_tracks = rest
            .into_iter()
            .map(|(_, id)| id)
            .collect::<Vec<_>>()
            .join(",");

        Ok(())
    }

    fn split_at_id(url: &url::Url, prefix: &str) -> Option<String> {
        url.path()
            .strip_prefix(prefix)
            .filter(|id| !id.is_empty())
            .map(|id| id.trim_end_matches('/').to_string())
    }

    /// `user/track` (optionally wrapped in slashes), anything with another number of
    /// segments is not a track
    fn track_permalink(input: &str) -> AppResult<String> {
        if input.len() < 4 {
            return Err(Error::NoUrl);
        }

        let permalink = input.strip_prefix('/').unwrap_or(input);
        let permalink = permalink.strip_suffix('/').unwrap_or(permalink);

        if permalink.matches('/').count() != 1 {
            return Err(Error::KindNotCorrect);
        }

        Ok(permalink.to_string())
    }
}

#[async_trait]
impl CatalogServiceTrait for CatalogService {
    async fn get_user(&self, permalink: &str) -> AppResult<User> {
        if let Some(user) = self.users.get(permalink) {
            return Ok(user);
        }

        let mut user: User = self.resolve(permalink).await?;
        user.fix(true);

        if self.web_profiles {
            user.web_profiles = self.user_web_profiles(&user.id).await?;
        }

        self.users.insert(permalink, user.clone());
        Ok(user)
    }

    async fn get_track(&self, permalink: &str) -> AppResult<Track> {
        if let Some(track) = self.tracks.get(permalink) {
            return Ok(track);
        }

        let mut track: Track = self.resolve(permalink).await?;
        track.fix(true, true);

        self.tracks.insert(permalink, track.clone());
        Ok(track)
    }

    async fn get_track_by_id(&self, id: &str) -> AppResult<Track> {
        if let Some(track) = self.tracks.find(|t| t.id == id) {
            return Ok(track);
        }

        let cid = self.client_id.get_client_id().await?;
        let url = with_client_id(&self.endpoints.api_url(&format!("/tracks/{}", id)), &cid);

        let response = self
            .transport
            .fetch(Pool::Api, UpstreamRequest::get(url))
            .await?;

        if !response.is_ok() {
            return Err(Error::UpstreamStatus {
                context: "gettrackbyid",
                status: response.status,
            });
        }

        let mut track: Track = serde_json::from_slice(&response.body)?;
        if track.kind != "track" {
            return Err(Error::KindNotCorrect);
        }

        track.fix(true, true);

        self.tracks.insert(track.cache_key(), track.clone());
        Ok(track)
    }

    async fn get_arbitrary_track(&self, input: &str) -> AppResult<Track> {
        if input.starts_with("https://") || input.starts_with("http://") {
            let url = url::Url::parse(input)
                .map_err(|e| Error::BadRequest(format!("invalid url: {}", e)))?;
            let host = url.host_str().unwrap_or_default();

            // the v1 api host shows up in old share links
            let api_host = host == self.endpoints.api
                || host == self.endpoints.api.replacen("api-v2.", "api.", 1);
            if api_host {
                if let Some(id) = Self::split_at_id(&url, "/tracks/") {
                    return self.get_track_by_id(&id).await;
                }
            }

            if host == self.endpoints.site {
                let permalink = Self::track_permalink(url.path())?;
                return self.get_track(&permalink).await;
            }
        }

        if !input.is_empty() && input.bytes().all(|b| b.is_ascii_digit()) {
            return self.get_track_by_id(input).await;
        }

        let permalink = Self::track_permalink(input)?;
        self.get_track(&permalink).await
    }

    async fn get_playlist(&self, permalink: &str) -> AppResult<Playlist> {
        if let Some(playlist) = self.playlists.get(permalink) {
            return Ok(playlist);
        }

        let mut playlist: Playlist = self.resolve(permalink).await?;
        playlist.fix(true, true);
        self.fill_missing_tracks(&mut playlist).await?;

        self.playlists.insert(permalink, playlist.clone());
        Ok(playlist)
    }

    async fn get_tracks(&self, ids: Vec<String>) -> AppResult<Vec<Track>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        debug!("bulk fetching {} tracks", ids.len());

        let mut tracks: Vec<Track> = self
            .list(format!("/tracks?ids={}", ids.join(",")), "gettracks")
            .await?;

        for track in tracks.iter_mut() {
            track.fix(false, true);
        }

        Ok(tracks)
    }

    async fn get_next_missing_tracks(&self, raw: &str) -> AppResult<(Vec<Track>, String)> {
        let mut ids: Vec<String> = raw
            .split(',')
            .filter(|id| !id.is_empty())
            .map(|id| id.to_string())
            .collect();

        let rest = if ids.len() > TRACKS_BATCH_SIZE {
            ids.split_off(TRACKS_BATCH_SIZE)
        } else {
            Vec::new()
        };

        let tracks = self.get_tracks(ids).await?;
        Ok((tracks, rest.join(",")))
    }

    async fn search_tracks(&self, args: &str) -> AppResult<Paginated<Track>> {
        let page = self.page(format!("/search/tracks{}", args), true).await?;
        Ok(Self::fix_tracks(page))
    }

    async fn search_users(&self, args: &str) -> AppResult<Paginated<User>> {
        let page = self.page(format!("/search/users{}", args), true).await?;
        Ok(Self::fix_users(page))
    }

    async fn search_playlists(&self, args: &str) -> AppResult<Paginated<Playlist>> {
        let page = self.page(format!("/search/playlists{}", args), true).await?;
        Ok(Self::fix_playlists(page))
    }

    async fn search_suggestions(&self, query: &str) -> AppResult<Vec<SearchSuggestion>> {
        let page: Paginated<SearchSuggestion> = self
            .page(
                format!("/search/queries?limit=10&q={}", urlencoding::encode(query)),
                false,
            )
            .await?;

        Ok(page.collection)
    }

    async fn search(&self, args: &str) -> AppResult<Paginated<SearchResult>> {
        let mut page: Paginated<SearchResult> =
            self.page(format!("/search{}", args), true).await?;

        for result in page.collection.iter_mut() {
            result.fix();
        }

        Ok(page)
    }

    async fn recent_tracks(&self, tag: &str, args: &str) -> AppResult<Paginated<Track>> {
        let page = self
            .page(
                format!("/recent-tracks/{}{}", urlencoding::encode(tag), args_or_default(args)),
                true,
            )
            .await?;
        Ok(Self::fix_tracks(page))
    }

    async fn get_featured_tracks(&self, args: &str) -> AppResult<Paginated<Track>> {
        // this one keeps handing out empty pages with a cursor, never unfold it
        let page = self
            .page(
                format!("/featured_tracks/top/all-music{}", args_or_default(args)),
                false,
            )
            .await?;

        Ok(Self::fix_tracks(page))
    }

    async fn get_selections(&self) -> AppResult<Paginated<Selection>> {
        let mut page: Paginated<Selection> = self
            .page("/mixed-selections?limit=20".to_string(), false)
            .await?;

        for selection in page.collection.iter_mut() {
            selection.fix();
        }

        Ok(page)
    }

    async fn user_tracks(&self, user_id: &str, args: &str) -> AppResult<Paginated<Track>> {
        let page = self
            .page(format!("/users/{}/tracks{}", user_id, args_or_default(args)), true)
            .await?;
        Ok(Self::fix_tracks(page))
    }

    async fn user_playlists(&self, user_id: &str, args: &str) -> AppResult<Paginated<Playlist>> {
        let page = self
            .page(
                format!("/users/{}/playlists_without_albums{}", user_id, args_or_default(args)),
                true,
            )
            .await?;
        Ok(Self::fix_playlists(page))
    }

    async fn user_albums(&self, user_id: &str, args: &str) -> AppResult<Paginated<Playlist>> {
        let page = self
            .page(format!("/users/{}/albums{}", user_id, args_or_default(args)), true)
            .await?;
        Ok(Self::fix_playlists(page))
    }

    async fn user_followers(&self, user_id: &str, args: &str) -> AppResult<Paginated<User>> {
        let page = self
            .page(format!("/users/{}/followers{}", user_id, args_or_default(args)), true)
            .await?;
        Ok(Self::fix_users(page))
    }

    async fn user_followings(&self, user_id: &str, args: &str) -> AppResult<Paginated<User>> {
        let page = self
            .page(format!("/users/{}/followings{}", user_id, args_or_default(args)), true)
            .await?;
        Ok(Self::fix_users(page))
    }

    async fn user_related(&self, user_id: &str) -> AppResult<Vec<User>> {
        let page = self
            .page(format!("/users/{}/relatedartists?page_size=20", user_id), false)
            .await?;
        Ok(Self::fix_users(page).collection)
    }

    async fn user_top_tracks(&self, user_id: &str) -> AppResult<Vec<Track>> {
        let page = self
            .page(format!("/users/{}/toptracks?limit=10", user_id), false)
            .await?;
        Ok(Self::fix_tracks(page).collection)
    }

    async fn user_reposts(&self, user_id: &str, args: &str) -> AppResult<Paginated<Repost>> {
        let mut page: Paginated<Repost> = self
            .page(
                format!("/stream/users/{}/reposts{}", user_id, args_or_default(args)),
                true,
            )
            .await?;

        for repost in page.collection.iter_mut() {
            repost.fix();
        }

        Ok(page)
    }

    async fn user_likes(&self, user_id: &str, args: &str) -> AppResult<Paginated<Like>> {
        let mut page: Paginated<Like> = self
            .page(format!("/users/{}/likes{}", user_id, args_or_default(args)), true)
            .await?;

        for like in page.collection.iter_mut() {
            like.fix();
        }

        Ok(page)
    }

    async fn user_web_profiles(&self, user_id: &str) -> AppResult<Vec<WebProfile>> {
        let mut profiles: Vec<WebProfile> = self
            .list(
                format!("/users/soundcloud:users:{}/web-profiles", user_id),
                "getwebprofiles",
            )
            .await?;

        for profile in profiles.iter_mut() {
            profile.fix(&self.endpoints.site);
        }

        Ok(profiles)
    }

    async fn track_related(&self, track_id: &str, args: &str) -> AppResult<Paginated<Track>> {
        let page = self
            .page(format!("/tracks/{}/related{}", track_id, args_or_default(args)), true)
            .await?;
        Ok(Self::fix_tracks(page))
    }

    async fn track_comments(&self, track_id: &str, args: &str) -> AppResult<Paginated<Comment>> {
        let mut page: Paginated<Comment> = self
            .page(format!("/tracks/{}/comments{}", track_id, args_or_default(args)), true)
            .await?;

        for comment in page.collection.iter_mut() {
            comment.fix();
        }

        Ok(page)
    }

    async fn track_playlists(&self, track_id: &str, args: &str) -> AppResult<Paginated<Playlist>> {
        let page = self
            .page(
                format!("/tracks/{}/playlists_without_albums{}", track_id, args_or_default(args)),
                true,
            )
            .await?;
        Ok(Self::fix_playlists(page))
    }

    async fn track_albums(&self, track_id: &str, args: &str) -> AppResult<Paginated<Playlist>> {
        let page = self
            .page(format!("/tracks/{}/albums{}", track_id, args_or_default(args)), true)
            .await?;
        Ok(Self::fix_playlists(page))
    }

    fn cache_sizes(&self) -> CacheSizes {
        CacheSizes {
            users: self.users.len(),
            tracks: self.tracks.len(),
            playlists: self.playlists.len(),
        }
    }
}

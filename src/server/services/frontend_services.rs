use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::{
    cache::{MemoryCache, spawn_sweeper},
    config::AppConfig,
    server::error::AppResult,
    upstream::{
        DynUpstreamTransport, Endpoints, HttpTransport,
        model::{Playlist, Track, User},
    },
};

use super::{
    catalog_services::{CatalogService, DynCatalogService},
    client_id_services::{self, ClientIdService, DynClientIdService},
    restream_services::{DynRestreamService, RestreamService},
    stream_services::{DynStreamService, StreamService},
};

/// the entity caches, shared between the catalog and their sweepers
#[derive(Clone)]
pub struct EntityCaches {
    pub users: Arc<MemoryCache<User>>,
    pub tracks: Arc<MemoryCache<Track>>,
    pub playlists: Arc<MemoryCache<Playlist>>,
}

impl EntityCaches {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            users: Arc::new(MemoryCache::new("users", Duration::from_secs(config.user_ttl))),
            tracks: Arc::new(MemoryCache::new("tracks", Duration::from_secs(config.track_ttl))),
            playlists: Arc::new(MemoryCache::new(
                "playlists",
                Duration::from_secs(config.playlist_ttl),
            )),
        }
    }
}

/// everything the handlers need, cloned into every request through an `Extension`
#[derive(Clone)]
pub struct FrontendServices {
    pub client_id: DynClientIdService,
    pub catalog: DynCatalogService,
    pub streams: DynStreamService,
    pub restream: DynRestreamService,
    pub transport: DynUpstreamTransport,
    pub caches: EntityCaches,
    pub endpoints: Endpoints,
    pub config: Arc<AppConfig>,
}

impl FrontendServices {
    /// the real thing, pooled clients against the production hosts
    pub fn new(config: Arc<AppConfig>) -> AppResult<Self> {
        info!("starting frontend services...");

        let endpoints = Endpoints::default();
        let transport = Arc::new(HttpTransport::new(
            &config.user_agent,
            config.max_idle_conn_duration(),
            &endpoints,
        )) as DynUpstreamTransport;

        info!("upstream pools ok, starting remaining services...");

        Self::with_transport(config, endpoints, transport)
    }

    /// same wiring on top of any transport, this is what tests use
    pub fn with_transport(
        config: Arc<AppConfig>,
        endpoints: Endpoints,
        transport: DynUpstreamTransport,
    ) -> AppResult<Self> {
        let client_id = Arc::new(ClientIdService::new(
            transport.clone(),
            endpoints.clone(),
            config.client_id_ttl(),
            config.client_id.clone(),
        )?) as DynClientIdService;

        let caches = EntityCaches::new(&config);

        let catalog = Arc::new(CatalogService::new(
            transport.clone(),
            endpoints.clone(),
            client_id.clone(),
            caches.users.clone(),
            caches.tracks.clone(),
            caches.playlists.clone(),
        )
        .with_web_profiles(config.get_web_profiles)) as DynCatalogService;

        let streams = Arc::new(StreamService::new(
            transport.clone(),
            client_id.clone(),
            config.proxy_streams,
        )) as DynStreamService;

        let restream = Arc::new(RestreamService::new(transport.clone()));

        Ok(Self {
            client_id,
            catalog,
            streams,
            restream,
            transport,
            caches,
            endpoints,
            config,
        })
    }

    /// cache sweepers and the client id refresher, they run until the handles are aborted
    pub fn spawn_background_tasks(&self) -> Vec<JoinHandle<()>> {
        let config = &self.config;

        let mut handles = vec![
            spawn_sweeper(
                self.caches.users.clone(),
                Duration::from_secs(config.user_cache_clean_delay),
            ),
            spawn_sweeper(
                self.caches.tracks.clone(),
                Duration::from_secs(config.track_cache_clean_delay),
            ),
            spawn_sweeper(
                self.caches.playlists.clone(),
                Duration::from_secs(config.playlist_cache_clean_delay),
            ),
        ];

        if config.client_id.is_none() {
            handles.push(client_id_services::spawn_refresher(
                self.client_id.clone(),
                config.client_id_ttl(),
            ));
        }

        info!("{} background tasks started", handles.len());
        handles
    }
}

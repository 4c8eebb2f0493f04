use std::collections::HashSet;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::server::error::{AppResult, Error};
use crate::upstream::model::{Paginated, Playlist, Track, User};
use crate::upstream::{Endpoints, Pool, UpstreamRequest, UpstreamTransport};

/// things `/resolve` can hand back, each knows which `kind` values it accepts
pub trait Resolvable: DeserializeOwned {
    fn kind_matches(&self) -> bool;
}

impl Resolvable for User {
    fn kind_matches(&self) -> bool {
        self.kind == "user"
    }
}

impl Resolvable for Track {
    fn kind_matches(&self) -> bool {
        self.kind == "track"
    }
}

impl Resolvable for Playlist {
    fn kind_matches(&self) -> bool {
        self.is_playlist_kind()
    }
}

/// appends the credential to an api url, whether or not it already has a query
pub fn with_client_id(url: &str, client_id: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}client_id={}", url, separator, client_id)
}

pub fn resolve_url(endpoints: &Endpoints, client_id: &str, permalink: &str) -> String {
    format!(
        "https://{}/resolve?url={}&client_id={}",
        endpoints.api,
        urlencoding::encode(&endpoints.site_url(permalink)),
        client_id
    )
}

/// turns a permalink (`user`, `user/track`, `user/sets/playlist`) into the entity behind it
pub async fn resolve<T: Resolvable>(
    transport: &(dyn UpstreamTransport + Send + Sync),
    endpoints: &Endpoints,
    client_id: &str,
    permalink: &str,
) -> AppResult<T> {
    let response = transport
        .fetch(
            Pool::Api,
            UpstreamRequest::get(resolve_url(endpoints, client_id, permalink)),
        )
        .await?;

    if !response.is_ok() {
        debug!("resolving {} failed with {}", permalink, response.status);
        return Err(Error::UpstreamStatus {
            context: "resolve",
            status: response.status,
        });
    }

    let entity: T = serde_json::from_slice(&response.body)?;
    if !entity.kind_matches() {
        return Err(Error::KindNotCorrect);
    }

    Ok(entity)
}

impl<T: DeserializeOwned + Send> Paginated<T> {
    /// loads the page `next` points at, replacing the current one
    ///
    /// cursors that come back unchanged (or that we already visited) end the listing. With
    /// `unfold_empty` empty pages that still have a successor are skipped, some endpoints do
    /// that forever so they opt out
    pub async fn proceed(
        &mut self,
        transport: &(dyn UpstreamTransport + Send + Sync),
        client_id: &str,
        unfold_empty: bool,
    ) -> AppResult<()> {
        let mut visited = HashSet::new();

        while !self.next.is_empty() {
            let cursor = std::mem::take(&mut self.next);

            let response = transport
                .fetch(
                    Pool::Api,
                    UpstreamRequest::get(with_client_id(&cursor, client_id))
                        .with_accept_language(),
                )
                .await?;

            if !response.is_ok() {
                return Err(Error::UpstreamStatus {
                    context: "paginated.proceed",
                    status: response.status,
                });
            }

            let page: Paginated<T> = serde_json::from_slice(&response.body)?;
            visited.insert(cursor);

            self.collection = page.collection;
            self.total = page.total;
            self.next = page.next;

            if visited.contains(&self.next) {
                warn!("cursor loop on {}, stopping", self.next);
                self.next.clear();
            }

            if !unfold_empty || !self.collection.is_empty() {
                break;
            }
        }

        Ok(())
    }
}

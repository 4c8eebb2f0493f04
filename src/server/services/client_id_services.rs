use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
use regex::Regex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::cache::ClientIdCache;
use crate::server::error::{AppResult, Error};
use crate::upstream::{DynUpstreamTransport, Endpoints, Pool, UpstreamRequest};

pub type DynClientIdService = Arc<dyn ClientIdServiceTrait + Send + Sync>;

#[automock]
#[async_trait]
pub trait ClientIdServiceTrait {
    /// the cached credential, discovering a new one once it expired
    async fn get_client_id(&self) -> AppResult<String>;

    /// runs discovery even if the cached credential is still fresh
    async fn refresh(&self) -> AppResult<String>;

    /// what's in the cache right now, for the health endpoint
    fn snapshot(&self) -> ClientIdCache;
}

/// the regexes discovery runs over the web shell and the script bundle
#[derive(Debug, Clone)]
pub struct DiscoveryPatterns {
    pub version: Regex,
    pub hydration: Regex,
    pub preferred_script: Regex,
    pub scripts: Regex,
    pub credential: Regex,
}

impl DiscoveryPatterns {
    pub fn new(endpoints: &Endpoints) -> AppResult<Self> {
        let assets = regex::escape(&endpoints.assets);

        let build = |pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                error!("bad discovery pattern {}: {}", pattern, e);
                Error::InternalServerErrorWithContext(e.to_string())
            })
        };

        Ok(Self {
            version: build(r#"(?m)^<script>window\.__sc_version="([0-9]{10})"</script>$"#)?,
            hydration: build(r#"\{"hydratable":"apiClient","data":\{"id":"([A-Za-z0-9]{32})""#)?,
            preferred_script: build(&format!(
                r#"(?m)^<script crossorigin src="(https://{}/assets/0-.+\.js)"></script>$"#,
                assets
            ))?,
            scripts: build(&format!(
                r#"(?m)^<script crossorigin src="(https://{}/assets/.+\.js)"></script>$"#,
                assets
            ))?,
            credential: build(r#"\("client_id=([A-Za-z0-9]{32})"\)|client_id:"([A-Za-z0-9]{32})""#)?,
        })
    }

    pub fn find_credential(&self, script: &str) -> Option<String> {
        let captures = self.credential.captures(script)?;

        captures
            .get(1)
            .or_else(|| captures.get(2))
            .map(|m| m.as_str().to_string())
    }
}

pub struct ClientIdService {
    transport: DynUpstreamTransport,
    endpoints: Endpoints,
    patterns: DiscoveryPatterns,
    ttl: Duration,
    manual: Option<String>,
    cache: RwLock<ClientIdCache>,
    // only one discovery at a time, everyone else waits for its result
    refresh_gate: tokio::sync::Mutex<()>,
}

impl ClientIdService {
    pub fn new(
        transport: DynUpstreamTransport,
        endpoints: Endpoints,
        ttl: Duration,
        manual: Option<String>,
    ) -> AppResult<Self> {
        let patterns = DiscoveryPatterns::new(&endpoints)?;

        if manual.is_some() {
            info!("using the configured client id, discovery is off");
        }

        Ok(Self {
            transport,
            endpoints,
            patterns,
            ttl,
            manual,
            cache: RwLock::new(ClientIdCache::default()),
            refresh_gate: tokio::sync::Mutex::new(()),
        })
    }

    fn cached(&self) -> ClientIdCache {
        self.cache.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn fresh_credential(&self) -> Option<String> {
        let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());

        cache
            .is_fresh(Instant::now())
            .then(|| cache.credential.clone())
    }

    fn store(&self, credential: &str, version: &str) {
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());

        cache.credential = credential.to_string();
        cache.version = version.to_string();
        cache.expires_at = Some(Instant::now() + self.ttl);
    }

    async fn fetch_text(&self, url: &str, context: &'static str) -> AppResult<String> {
        let response = self
            .transport
            .fetch(Pool::Generic, UpstreamRequest::get(url).retry_all())
            .await?;

        if !response.is_ok() {
            return Err(Error::UpstreamStatus {
                context,
                status: response.status,
            });
        }

        Ok(response.text())
    }

    async fn discover(&self) -> AppResult<String> {
        // a path that doesn't exist still gets the whole web shell, but it's way smaller
        let shell = self
            .fetch_text(&format!("https://{}/h", self.endpoints.site), "clientid")
            .await?;

        let version = self
            .patterns
            .version
            .captures(&shell)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or(Error::VersionNotFound)?;

        {
            let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
            if !cache.credential.is_empty() && cache.version == version {
                debug!("site version {} unchanged, keeping client id", version);
                cache.expires_at = Some(Instant::now() + self.ttl);
                return Ok(cache.credential.clone());
            }
        }

        if let Some(credential) = self
            .patterns
            .hydration
            .captures(&shell)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
        {
            debug!("client id found in hydration data");
            self.store(&credential, &version);
            return Ok(credential);
        }

        if let Some(script) = self
            .patterns
            .preferred_script
            .captures(&shell)
            .and_then(|c| c.get(1))
        {
            match self.fetch_text(script.as_str(), "clientid").await {
                Ok(body) => {
                    if let Some(credential) = self.patterns.find_credential(&body) {
                        debug!("client id found in {}", script.as_str());
                        self.store(&credential, &version);
                        return Ok(credential);
                    }

                    warn!("{} has no client id, scanning every script", script.as_str());
                }
                Err(e) => {
                    warn!("failed to fetch {}: {}, scanning every script", script.as_str(), e);
                }
            }
        }

        let scripts: Vec<String> = self
            .patterns
            .scripts
            .captures_iter(&shell)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect();

        if scripts.is_empty() {
            return Err(Error::ScriptNotFound);
        }

        let credential = self.race(scripts).await?;
        self.store(&credential, &version);

        Ok(credential)
    }

    /// fetches every script at once, the first one containing a credential wins
    ///
    /// losers notice through `done` and stop at the next checkpoint, at most one request each
    /// is wasted
    async fn race(&self, scripts: Vec<String>) -> AppResult<String> {
        debug!("racing {} scripts for the client id", scripts.len());

        let (sender, receiver) = oneshot::channel::<String>();
        let sender = Arc::new(Mutex::new(Some(sender)));
        let done = Arc::new(AtomicBool::new(false));

        for script in scripts {
            let transport = self.transport.clone();
            let patterns = self.patterns.clone();
            let sender = sender.clone();
            let done = done.clone();

            tokio::spawn(async move {
                if done.load(Ordering::Acquire) {
                    return;
                }

                let response = match transport
                    .fetch(Pool::Generic, UpstreamRequest::get(&script).retry_all())
                    .await
                {
                    Ok(response) if response.is_ok() => response,
                    Ok(response) => {
                        debug!("{} -> {}", script, response.status);
                        return;
                    }
                    Err(e) => {
                        debug!("failed to fetch {}: {}", script, e);
                        return;
                    }
                };

                if done.load(Ordering::Acquire) {
                    return;
                }

                let body = response.text();
                if done.load(Ordering::Acquire) {
                    return;
                }

                let Some(credential) = patterns.find_credential(&body) else {
                    return;
                };

                if done.load(Ordering::Acquire) {
                    return;
                }

                // whoever takes the sender first wins, everyone else finds `None`
                let winner = sender.lock().unwrap_or_else(|e| e.into_inner()).take();
                if let Some(winner) = winner {
                    done.store(true, Ordering::Release);
                    debug!("client id found in {}", script);
                    let _ = winner.send(credential);
                }
            });
        }

        // the receiver errors out once every worker dropped its handle on the sender
        drop(sender);

        receiver.await.map_err(|_| Error::IdNotFound)
    }
}

#[async_trait]
impl ClientIdServiceTrait for ClientIdService {
    async fn get_client_id(&self) -> AppResult<String> {
        if let Some(manual) = &self.manual {
            return Ok(manual.clone());
        }

        if let Some(credential) = self.fresh_credential() {
            return Ok(credential);
        }

        let _gate = self.refresh_gate.lock().await;

        // someone else might have refreshed it while we were waiting
        if let Some(credential) = self.fresh_credential() {
            return Ok(credential);
        }

        self.discover().await
    }

    async fn refresh(&self) -> AppResult<String> {
        if let Some(manual) = &self.manual {
            return Ok(manual.clone());
        }

        let _gate = self.refresh_gate.lock().await;
        self.discover().await
    }

    fn snapshot(&self) -> ClientIdCache {
        if let Some(manual) = &self.manual {
            return ClientIdCache {
                credential: manual.clone(),
                ..ClientIdCache::default()
            };
        }

        self.cached()
    }
}

/// re-runs discovery every `every`, a failed refresh keeps the previous credential around
pub fn spawn_refresher(service: DynClientIdService, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;

        loop {
            interval.tick().await;

            match service.refresh().await {
                Ok(_) => debug!("client id refreshed"),
                Err(e) => warn!("failed to refresh client id: {}", e),
            }
        }
    })
}

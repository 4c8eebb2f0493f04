mod memory_cache;

pub use memory_cache::*;

use tokio::time::Instant;

/// the one client id we share between every request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientIdCache {
    pub credential: String,
    /// `window.__sc_version` of the web shell the credential was found on
    pub version: String,
    pub expires_at: Option<Instant>,
}

impl ClientIdCache {
    pub fn is_fresh(&self, now: Instant) -> bool {
        !self.credential.is_empty() && self.expires_at.is_some_and(|at| now < at)
    }
}

// shared between the test binaries, not every binary uses everything
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Bytes;
use futures::StreamExt;
use futures::stream;
use serde_json::{Value, json};

use tunecloak::server::error::AppResult;
use tunecloak::upstream::{
    DynUpstreamTransport, Endpoints, Pool, StreamingResponse, UpstreamRequest, UpstreamResponse,
    UpstreamTransport,
};

pub const CLIENT_ID: &str = "cid";

pub fn endpoints() -> Endpoints {
    Endpoints::for_service("example")
}

/// answers from a fixed url -> response table, anything unknown is a 404
#[derive(Default)]
pub struct StubTransport {
    routes: Mutex<HashMap<String, UpstreamResponse>>,
    calls: Mutex<Vec<(Pool, String)>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, url: impl Into<String>, response: UpstreamResponse) -> Self {
        self.routes.lock().unwrap().insert(url.into(), response);
        self
    }

    pub fn json(self, url: impl Into<String>, body: Value) -> Self {
        self.route(url, UpstreamResponse::ok(body.to_string()))
    }

    pub fn calls(&self) -> Vec<(Pool, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, u)| u == url)
            .count()
    }

    pub fn into_dyn(self: &Arc<Self>) -> DynUpstreamTransport {
        self.clone()
    }

    fn answer(&self, pool: Pool, request: &UpstreamRequest) -> UpstreamResponse {
        self.calls
            .lock()
            .unwrap()
            .push((pool, request.url.clone()));

        self.routes
            .lock()
            .unwrap()
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| UpstreamResponse::with_status(404, "not found"))
    }
}

#[async_trait]
impl UpstreamTransport for StubTransport {
    async fn fetch(&self, pool: Pool, request: UpstreamRequest) -> AppResult<UpstreamResponse> {
        Ok(self.answer(pool, &request))
    }

    async fn stream(&self, pool: Pool, request: UpstreamRequest) -> AppResult<StreamingResponse> {
        let response = self.answer(pool, &request);
        let length = response.body.len() as u64;

        Ok(StreamingResponse {
            status: response.status,
            content_type: response.content_type.clone(),
            content_encoding: None,
            content_length: Some(length),
            body: stream::once(async move { Ok::<Bytes, std::io::Error>(response.body) }).boxed(),
        })
    }
}

pub fn api(path_and_query: &str) -> String {
    format!("https://api-v2.example.com{}", path_and_query)
}

pub fn track_json(id: u64, user: &str, permalink: &str) -> Value {
    json!({
        "kind": "track",
        "id": id,
        "title": format!("track {}", id),
        "permalink": permalink,
        "artwork_url": format!("https://i1.example.cdn/artworks-{}-large.jpg", id),
        "full_duration": 240000,
        "user": { "kind": "user", "id": 7, "permalink": user, "username": user }
    })
}

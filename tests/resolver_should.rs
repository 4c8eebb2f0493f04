mod common;

use std::sync::Arc;

use serde_json::json;

use common::{CLIENT_ID, StubTransport, api, endpoints, track_json};
use tunecloak::server::error::Error;
use tunecloak::upstream::model::{Paginated, Playlist, Track, User};
use tunecloak::upstream::resolver::{resolve, resolve_url, with_client_id};

fn page_url(offset: u32) -> String {
    api(&format!("/search/tracks?q=a&offset={}", offset))
}

fn fetched(offset: u32) -> String {
    with_client_id(&page_url(offset), CLIENT_ID)
}

fn page(tracks: Vec<serde_json::Value>, next: &str) -> serde_json::Value {
    json!({ "collection": tracks, "total_results": 100, "next_href": next })
}

#[test]
fn test_client_id_is_appended_either_way() {
    assert_eq!(with_client_id("https://x/a", "c"), "https://x/a?client_id=c");
    assert_eq!(with_client_id("https://x/a?b=1", "c"), "https://x/a?b=1&client_id=c");
}

#[test]
fn test_resolve_url_encodes_the_site_url() {
    assert_eq!(
        resolve_url(&endpoints(), CLIENT_ID, "artist/song"),
        "https://api-v2.example.com/resolve?url=https%3A%2F%2Fexample.com%2Fartist%2Fsong&client_id=cid"
    );
}

#[tokio::test]
async fn test_resolve_checks_the_kind() {
    let stub = Arc::new(
        StubTransport::new()
            .json(
                resolve_url(&endpoints(), CLIENT_ID, "artist"),
                json!({ "kind": "user", "id": 7, "permalink": "artist" }),
            )
            .json(
                resolve_url(&endpoints(), CLIENT_ID, "artist/song"),
                track_json(1, "artist", "song"),
            ),
    );

    let user: User = resolve(stub.as_ref(), &endpoints(), CLIENT_ID, "artist")
        .await
        .unwrap();
    assert_eq!(user.id, "7");

    let track: Track = resolve(stub.as_ref(), &endpoints(), CLIENT_ID, "artist/song")
        .await
        .unwrap();
    assert_eq!(track.author.permalink, "artist");

    let wrong = resolve::<Playlist>(stub.as_ref(), &endpoints(), CLIENT_ID, "artist").await;
    assert!(matches!(wrong, Err(Error::KindNotCorrect)));
}

#[tokio::test]
async fn test_resolve_keeps_the_upstream_status() {
    let stub = Arc::new(StubTransport::new());

    let result = resolve::<User>(stub.as_ref(), &endpoints(), CLIENT_ID, "nobody").await;

    assert!(matches!(
        result,
        Err(Error::UpstreamStatus {
            context: "resolve",
            status: 404
        })
    ));
}

#[tokio::test]
async fn test_proceed_loads_a_single_page() {
    let stub = Arc::new(StubTransport::new().json(
        fetched(0),
        page(vec![track_json(1, "a", "one")], &page_url(20)),
    ));

    let mut listing = Paginated::<Track>::starting_at(page_url(0));
    listing.proceed(stub.as_ref(), CLIENT_ID, true).await.unwrap();

    assert_eq!(listing.collection.len(), 1);
    assert_eq!(listing.total, 100);
    assert_eq!(listing.next, page_url(20));
    assert_eq!(stub.calls().len(), 1);
}

#[tokio::test]
async fn test_proceed_breaks_cursor_loops() {
    let stub = Arc::new(StubTransport::new().json(
        fetched(0),
        page(vec![track_json(1, "a", "one")], &page_url(0)),
    ));

    let mut listing = Paginated::<Track>::starting_at(page_url(0));
    listing.proceed(stub.as_ref(), CLIENT_ID, true).await.unwrap();

    assert_eq!(listing.collection.len(), 1);
    assert!(listing.next.is_empty());
}

#[tokio::test]
async fn test_proceed_skips_empty_pages() {
    let stub = Arc::new(
        StubTransport::new()
            .json(fetched(0), page(vec![], &page_url(20)))
            .json(fetched(20), page(vec![], &page_url(40)))
            .json(
                fetched(40),
                page(vec![track_json(1, "a", "one")], &page_url(60)),
            ),
    );

    let mut listing = Paginated::<Track>::starting_at(page_url(0));
    listing.proceed(stub.as_ref(), CLIENT_ID, true).await.unwrap();

    assert_eq!(listing.collection.len(), 1);
    assert_eq!(listing.next, page_url(60));
    assert_eq!(stub.calls().len(), 3);
}

#[tokio::test]
async fn test_proceed_stops_on_empty_cycles() {
    let stub = Arc::new(
        StubTransport::new()
            .json(fetched(0), page(vec![], &page_url(20)))
            .json(fetched(20), page(vec![], &page_url(0))),
    );

    let mut listing = Paginated::<Track>::starting_at(page_url(0));
    listing.proceed(stub.as_ref(), CLIENT_ID, true).await.unwrap();

    assert!(listing.collection.is_empty());
    assert!(listing.next.is_empty());
    assert_eq!(stub.calls().len(), 2);
}

#[tokio::test]
async fn test_proceed_can_keep_empty_pages() {
    let stub = Arc::new(StubTransport::new().json(fetched(0), page(vec![], &page_url(20))));

    let mut listing = Paginated::<Track>::starting_at(page_url(0));
    listing.proceed(stub.as_ref(), CLIENT_ID, false).await.unwrap();

    assert!(listing.collection.is_empty());
    assert_eq!(listing.next, page_url(20));
    assert_eq!(stub.calls().len(), 1);
}

#[tokio::test]
async fn test_proceed_fails_on_upstream_errors() {
    let stub = Arc::new(StubTransport::new());

    let mut listing = Paginated::<Track>::starting_at(page_url(0));
    let result = listing.proceed(stub.as_ref(), CLIENT_ID, true).await;

    assert!(matches!(
        result,
        Err(Error::UpstreamStatus {
            context: "paginated.proceed",
            status: 404
        })
    ));
}

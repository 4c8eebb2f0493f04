// rss for a user's uploads, so people can follow artists without an account
use std::time::Duration;

use chrono::DateTime;
use quick_xml::Writer;
use quick_xml::escape::escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::server::error::{AppResult, Error};
use crate::upstream::fixups;
use crate::upstream::model::{Track, User};

pub const FEED_CONTENT_TYPE: &str = "application/rss+xml; charset=utf-8";

const CONTENT_NAMESPACE: &str = "http://purl.org/rss/1.0/modules/content/";

fn xml_error(e: impl std::fmt::Display) -> Error {
    Error::InternalServerErrorWithContext(format!("failed to write feed: {}", e))
}

/// rfc3339 from the api to the rfc2822 rss wants, garbage becomes empty
pub fn rss_date(date: &str) -> String {
    DateTime::parse_from_rfc3339(date)
        .map(|d| d.to_rfc2822())
        .unwrap_or_default()
}

struct FeedWriter {
    writer: Writer<Vec<u8>>,
}

impl FeedWriter {
    fn new() -> Self {
        Self {
            writer: Writer::new(Vec::new()),
        }
    }

    fn event(&mut self, event: Event<'_>) -> AppResult<()> {
        self.writer.write_event(event).map_err(xml_error)
    }

    fn start(&mut self, element: BytesStart<'_>) -> AppResult<()> {
        self.event(Event::Start(element))
    }

    fn end(&mut self, name: &str) -> AppResult<()> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    /// `<name>text</name>`, skipped when `text` is empty and the element is optional
    fn text(&mut self, name: &str, text: &str, optional: bool) -> AppResult<()> {
        if optional && text.is_empty() {
            return Ok(());
        }

        self.start(BytesStart::new(name))?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    fn finish(self) -> AppResult<String> {
        String::from_utf8(self.writer.into_inner()).map_err(xml_error)
    }
}

/// artwork on top, then the description as plain paragraphs
fn item_description(track: &Track, artwork: &str) -> String {
    let mut html = String::new();

    if !artwork.is_empty() {
        html.push_str(&format!("<img src=\"{}\"/>", escape(artwork)));
    }

    for line in track.description.lines().filter(|l| !l.trim().is_empty()) {
        html.push_str(&format!("<p>{}</p>", escape(line)));
    }

    html
}

/// the rss 2.0 document for `user` and their newest `tracks`
///
/// `base` is where the frontend is reachable (`https://host`), links and proxied images are
/// made absolute with it. `ttl` ends up in the feed in minutes
pub fn user_feed(user: &User, tracks: &[Track], base: &str, ttl: Duration) -> AppResult<String> {
    let link = format!("{}/{}", base, user.permalink);
    let editor = format!("{} (@{})", user.username, user.permalink);

    let build_date = match tracks.first() {
        Some(track) => rss_date(&track.last_modified),
        None => rss_date(&user.last_modified),
    };

    let mut feed = FeedWriter::new();
    feed.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    rss.push_attribute(("xmlns:content", CONTENT_NAMESPACE));
    feed.start(rss)?;
    feed.start(BytesStart::new("channel"))?;

    feed.text("title", &format!("Tracks from {}", user.username), false)?;
    feed.text("link", &link, false)?;
    feed.text(
        "description",
        &format!("Recently released tracks by {}", editor),
        false,
    )?;
    feed.text("managingEditor", &editor, true)?;
    feed.text("pubDate", &build_date, true)?;
    feed.text("lastBuildDate", &build_date, true)?;
    feed.text("category", "Music", false)?;
    feed.text("generator", env!("CARGO_PKG_NAME"), false)?;
    feed.text("ttl", &(ttl.as_secs() / 60).max(1).to_string(), false)?;

    for track in tracks {
        // feed readers want the full size image, and they can't follow relative proxy links
        let mut artwork = track.artwork.replacen("-t200x200.", "-original.", 1);
        if artwork.starts_with(fixups::IMAGE_PROXY_PREFIX) {
            artwork = format!("{}{}", base, artwork);
        }

        feed.start(BytesStart::new("item"))?;
        feed.text("title", &track.title, false)?;
        feed.text("link", &format!("{}/{}", link, track.permalink), false)?;
        feed.text("description", &item_description(track, &artwork), false)?;
        feed.text("category", &track.genre, true)?;

        let mut guid = BytesStart::new("guid");
        guid.push_attribute(("isPermaLink", "false"));
        feed.start(guid)?;
        feed.event(Event::Text(BytesText::new(&track.id)))?;
        feed.end("guid")?;

        feed.text("pubDate", &rss_date(&track.last_modified), true)?;
        feed.end("item")?;
    }

    feed.end("channel")?;
    feed.end("rss")?;

    feed.finish()
}

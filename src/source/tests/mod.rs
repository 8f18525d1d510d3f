use super::feed::parse_feed;
use super::*;
use crate::error::SourceError;
use chrono::NaiveDate;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ATOM_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns:yt="http://www.youtube.com/xml/schemas/2015" xmlns:media="http://search.yahoo.com/mrss/" xmlns="http://www.w3.org/2005/Atom">
 <link rel="self" href="http://www.youtube.com/feeds/videos.xml?channel_id=UC123"/>
 <id>yt:channel:UC123</id>
 <yt:channelId>UC123</yt:channelId>
 <title>Quiz Channel</title>
 <author>
  <name>Quiz Channel</name>
  <uri>https://www.youtube.com/channel/UC123</uri>
 </author>
 <published>2015-01-01T00:00:00+00:00</published>
 <updated>2024-03-02T09:00:00+00:00</updated>
 <entry>
  <id>yt:video:vid001</id>
  <yt:videoId>vid001</yt:videoId>
  <yt:channelId>UC123</yt:channelId>
  <title>Only Connect - Series 21 - Episode 3</title>
  <link rel="alternate" href="https://www.youtube.com/watch?v=vid001"/>
  <author>
   <name>Quiz Channel</name>
   <uri>https://www.youtube.com/channel/UC123</uri>
  </author>
  <published>2024-03-01T18:00:00+00:00</published>
  <updated>2024-03-02T09:00:00+00:00</updated>
  <media:group>
   <media:title>Only Connect - Series 21 - Episode 3</media:title>
   <media:description>Quarter final between the Gamblers and the Wordsmiths</media:description>
  </media:group>
 </entry>
 <entry>
  <id>yt:video:vid002</id>
  <title>Channel trailer</title>
  <link rel="alternate" href="https://www.youtube.com/watch?v=vid002"/>
  <published>2024-02-28T10:00:00+02:00</published>
  <updated>2024-02-28T10:00:00+02:00</updated>
  <summary>Welcome!</summary>
 </entry>
 <entry>
  <id>yt:video:vid003</id>
  <yt:videoId>vid003</yt:videoId>
  <title>Random Video Title</title>
  <link rel="alternate" href="https://www.youtube.com/watch?v=vid003"/>
  <published>2024-02-20T10:00:00+00:00</published>
  <updated>2024-02-20T10:00:00+00:00</updated>
 </entry>
</feed>
"#;

const RSS_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
 <channel>
  <title>Sitcom Clips</title>
  <link>https://example.com/</link>
  <description>Clips</description>
  <item>
   <title>Friends 1x01</title>
   <link>https://www.youtube.com/watch?v=rss001&amp;feature=share</link>
   <description>The pilot</description>
   <pubDate>Mon, 15 Jan 2024 10:30:00 GMT</pubDate>
  </item>
  <item>
   <title>Not a video</title>
   <link>https://example.com/blog/post</link>
  </item>
 </channel>
</rss>
"#;

fn at(y: i32, m: u32, d: u32, h: u32) -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, 0, 0)
        .unwrap()
}

fn search_hit(id: &str, title: &str) -> serde_json::Value {
    json!({
        "kind": "youtube#searchResult",
        "id": { "kind": "youtube#video", "videoId": id },
        "snippet": {
            "title": title,
            "description": format!("snippet for {id}"),
            "publishedAt": "2024-03-01T18:00:00Z",
            "channelTitle": "Quiz Channel",
            "channelId": "UC123"
        }
    })
}

fn video(id: &str, title: &str, duration: &str) -> serde_json::Value {
    json!({
        "kind": "youtube#video",
        "id": id,
        "snippet": {
            "title": title,
            "description": format!("full description for {id}"),
            "publishedAt": "2024-03-01T18:00:00Z",
            "channelTitle": "Quiz Channel"
        },
        "contentDetails": { "duration": duration }
    })
}

async fn mount_video_search(server: &MockServer, channel_id: &str) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("type", "video"))
        .and(query_param("channelId", channel_id))
        .and(query_param("order", "date"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                search_hit("vid001", "Only Connect - Series 21 - Episode 3"),
                search_hit("vid002", "Channel trailer"),
            ]
        })))
        .mount(server)
        .await;
}

async fn mount_video_details(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/videos"))
        .and(query_param("id", "vid001,vid002"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                video("vid001", "Only Connect - Series 21 - Episode 3", "PT29M30S"),
                video("vid002", "Channel trailer", "PT1M"),
            ]
        })))
        .mount(server)
        .await;
}

// ---------------------------------------------------------------------------
// ApiSource
// ---------------------------------------------------------------------------

#[tokio::test]
async fn api_lists_uploads_with_details() {
    let server = MockServer::start().await;
    mount_video_search(&server, "UC123").await;
    mount_video_details(&server).await;

    let source = ApiSource::with_base_url("test-key", 10_000, server.uri()).unwrap();
    let channel = ChannelRef::ChannelId("UC123".into());
    let items = source.list_recent(&channel, 10).await.unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, "vid001");
    assert_eq!(items[0].title, "Only Connect - Series 21 - Episode 3");
    assert_eq!(items[0].duration_seconds, Some(1770));
    assert_eq!(items[0].duration_minutes(), Some(30));
    assert_eq!(items[0].description, "full description for vid001");
    assert_eq!(items[0].channel_label, "Quiz Channel");
    assert_eq!(items[0].published, at(2024, 3, 1, 18));

    // One search plus one lookup per video
    let usage = source.quota_usage().await.unwrap();
    assert_eq!(usage.used, SEARCH_COST + 2 * VIDEO_LOOKUP_COST);
    assert_eq!(usage.remaining, 10_000 - 102);
}

#[tokio::test]
async fn api_caps_page_size_at_fifty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("maxResults", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let source = ApiSource::with_base_url("test-key", 10_000, server.uri()).unwrap();
    let items = source
        .list_recent(&ChannelRef::ChannelId("UC123".into()), 200)
        .await
        .unwrap();
    assert!(items.is_empty());
}

#[tokio::test]
async fn api_resolves_handles_by_search_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("type", "channel"))
        .and(query_param("q", "QuizChannel"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{
                "id": { "kind": "youtube#channel", "channelId": "UC123" },
                "snippet": { "channelId": "UC123", "title": "Quiz Channel" }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_video_search(&server, "UC123").await;
    mount_video_details(&server).await;

    let source = ApiSource::with_base_url("test-key", 10_000, server.uri()).unwrap();
    let channel = ChannelRef::Handle("QuizChannel".into());

    assert_eq!(source.resolve_channel_id(&channel).await.unwrap(), "UC123");
    let items = source.list_recent(&channel, 5).await.unwrap();
    assert_eq!(items.len(), 2);

    // Resolution search (100) + upload search (100) + 2 lookups
    assert_eq!(source.quota_usage().await.unwrap().used, 202);
}

#[tokio::test]
async fn api_resolves_legacy_usernames_by_lookup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/channels"))
        .and(query_param("forUsername", "legacyuser"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "items": [{ "id": "UC999" }] })),
        )
        .mount(&server)
        .await;

    let source = ApiSource::with_base_url("test-key", 10_000, server.uri()).unwrap();
    let id = source
        .resolve_channel_id(&ChannelRef::User("legacyuser".into()))
        .await
        .unwrap();
    assert_eq!(id, "UC999");
    assert_eq!(
        source.quota_usage().await.unwrap().used,
        CHANNEL_LOOKUP_COST
    );
}

#[tokio::test]
async fn api_unresolvable_channel() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .mount(&server)
        .await;

    let source = ApiSource::with_base_url("test-key", 10_000, server.uri()).unwrap();
    let err = source
        .resolve_channel_id(&ChannelRef::Custom("nobody".into()))
        .await
        .unwrap_err();
    assert!(
        matches!(err, crate::Error::Source(SourceError::ChannelNotResolved(_))),
        "{err:?}"
    );
}

#[tokio::test]
async fn api_uses_snippets_when_details_would_exceed_quota() {
    let server = MockServer::start().await;
    mount_video_search(&server, "UC123").await;
    Mock::given(method("GET"))
        .and(path("/videos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .expect(0)
        .mount(&server)
        .await;

    // Enough for the search but not for two lookups
    let source = ApiSource::with_base_url("test-key", 101, server.uri()).unwrap();
    let items = source
        .list_recent(&ChannelRef::ChannelId("UC123".into()), 10)
        .await
        .unwrap();

    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i.duration_seconds.is_none()));
    assert_eq!(items[0].description, "snippet for vid001");
    assert_eq!(source.quota_usage().await.unwrap().used, 100);
}

#[tokio::test]
async fn api_refuses_calls_beyond_quota_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .expect(0)
        .mount(&server)
        .await;

    let source = ApiSource::with_base_url("test-key", 50, server.uri()).unwrap();
    let err = source
        .list_recent(&ChannelRef::ChannelId("UC123".into()), 10)
        .await
        .unwrap_err();
    assert!(err.is_quota_exhausted(), "{err:?}");
}

#[tokio::test]
async fn api_http_errors_are_not_charged() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(403).set_body_string("quotaExceeded"))
        .mount(&server)
        .await;

    let source = ApiSource::with_base_url("test-key", 10_000, server.uri()).unwrap();
    let err = source
        .list_recent(&ChannelRef::ChannelId("UC123".into()), 10)
        .await
        .unwrap_err();

    match err {
        crate::Error::Source(SourceError::Api { status, message }) => {
            assert_eq!(status, 403);
            assert!(message.contains("quotaExceeded"));
        }
        other => panic!("expected API error, got {other:?}"),
    }
    assert_eq!(source.quota_usage().await.unwrap().used, 0);
}

#[tokio::test]
async fn api_fetch_single_video() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/videos"))
        .and(query_param("id", "vid001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [video("vid001", "Only Connect - Series 21 - Episode 3", "PT1H")]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/videos"))
        .and(query_param("id", "missing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .mount(&server)
        .await;

    let source = ApiSource::with_base_url("test-key", 10_000, server.uri()).unwrap();
    let item = source.fetch_video("vid001").await.unwrap();
    assert_eq!(item.duration_minutes(), Some(60));

    let err = source.fetch_video("missing").await.unwrap_err();
    assert!(
        matches!(err, crate::Error::Source(SourceError::VideoNotFound(ref id)) if id == "missing"),
        "{err:?}"
    );
    assert_eq!(source.quota_usage().await.unwrap().used, 2);
}

// ---------------------------------------------------------------------------
// FeedSource
// ---------------------------------------------------------------------------

#[test]
fn atom_feed_entries_become_candidates() {
    let items = parse_feed(ATOM_FEED).unwrap();
    assert_eq!(items.len(), 3);

    let first = &items[0];
    assert_eq!(first.id, "vid001");
    assert_eq!(first.title, "Only Connect - Series 21 - Episode 3");
    assert_eq!(
        first.description,
        "Quarter final between the Gamblers and the Wordsmiths"
    );
    assert_eq!(first.channel_label, "Quiz Channel");
    assert_eq!(first.published, at(2024, 3, 1, 18));
    assert_eq!(first.duration_seconds, None);

    // No yt:videoId: id comes from the watch link, description from the summary,
    // and the +02:00 offset is converted to UTC
    let second = &items[1];
    assert_eq!(second.id, "vid002");
    assert_eq!(second.description, "Welcome!");
    assert_eq!(second.published, at(2024, 2, 28, 8));

    assert_eq!(items[2].description, "");
}

#[test]
fn rss_feed_items_become_candidates() {
    let items = parse_feed(RSS_FEED).unwrap();
    assert_eq!(items.len(), 1, "items without a video id are skipped");
    assert_eq!(items[0].id, "rss001");
    assert_eq!(items[0].title, "Friends 1x01");
    assert_eq!(items[0].description, "The pilot");
    assert_eq!(items[0].channel_label, "Sitcom Clips");
    assert_eq!(
        items[0].published,
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap()
    );
}

#[test]
fn unparseable_feed_is_a_feed_error() {
    let err = parse_feed("<html><body>not a feed</body></html>").unwrap_err();
    assert!(
        matches!(err, crate::Error::Source(SourceError::Feed(ref m)) if m.contains("RSS or Atom")),
        "{err:?}"
    );
}

#[tokio::test]
async fn feed_fetches_by_channel_id_and_truncates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feeds/videos.xml"))
        .and(query_param("channel_id", "UC123"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ATOM_FEED))
        .mount(&server)
        .await;

    let source = FeedSource::with_base_url(server.uri()).unwrap();
    let items = source
        .list_recent(&ChannelRef::ChannelId("UC123".into()), 2)
        .await
        .unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, "vid001");
    assert!(source.quota_usage().await.is_none());
}

#[tokio::test]
async fn feed_uses_user_query_for_handles() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feeds/videos.xml"))
        .and(query_param("user", "QuizChannel"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ATOM_FEED))
        .expect(1)
        .mount(&server)
        .await;

    let source = FeedSource::with_base_url(server.uri()).unwrap();
    let items = source
        .list_recent(&ChannelRef::Handle("QuizChannel".into()), 50)
        .await
        .unwrap();
    assert_eq!(items.len(), 3);
}

#[tokio::test]
async fn feed_cannot_serve_custom_names() {
    let source = FeedSource::with_base_url("http://127.0.0.1:9").unwrap();
    let err = source
        .list_recent(&ChannelRef::Custom("custom".into()), 10)
        .await
        .unwrap_err();
    assert!(
        matches!(err, crate::Error::Source(SourceError::ChannelNotResolved(_))),
        "{err:?}"
    );
}

#[tokio::test]
async fn feed_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let source = FeedSource::with_base_url(server.uri()).unwrap();
    let err = source
        .list_recent(&ChannelRef::ChannelId("UC123".into()), 10)
        .await
        .unwrap_err();
    assert!(
        matches!(err, crate::Error::Source(SourceError::Feed(ref m)) if m.contains("404")),
        "{err:?}"
    );
}

#[tokio::test]
async fn feed_does_not_support_single_video_lookup() {
    let source = FeedSource::with_base_url("http://127.0.0.1:9").unwrap();
    let err = source.fetch_video("abc").await.unwrap_err();
    assert!(matches!(err, crate::Error::NotSupported(_)), "{err:?}");
}

// ---------------------------------------------------------------------------
// FallbackSource
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum Behaviour {
    Items,
    Empty,
    Quota,
    Fail,
}

struct FakeSource {
    behaviour: Behaviour,
    label: &'static str,
    calls: Arc<AtomicUsize>,
}

impl FakeSource {
    fn boxed(behaviour: Behaviour, label: &'static str) -> (Box<dyn ChannelSource>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = FakeSource {
            behaviour,
            label,
            calls: calls.clone(),
        };
        (Box::new(source), calls)
    }
}

#[async_trait::async_trait]
impl ChannelSource for FakeSource {
    async fn list_recent(
        &self,
        _channel: &ChannelRef,
        _max_results: usize,
    ) -> crate::Result<Vec<crate::types::CandidateItem>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behaviour {
            Behaviour::Items => Ok(vec![crate::types::CandidateItem {
                id: format!("{}-1", self.label),
                title: "Some Show Episode 5".into(),
                published: at(2024, 1, 1, 0),
                duration_seconds: None,
                description: String::new(),
                channel_label: self.label.into(),
            }]),
            Behaviour::Empty => Ok(Vec::new()),
            Behaviour::Quota => Err(SourceError::QuotaExhausted {
                used: 10_000,
                cost: 100,
                limit: 10_000,
            }
            .into()),
            Behaviour::Fail => Err(SourceError::Feed("boom".into()).into()),
        }
    }

    fn name(&self) -> &'static str {
        self.label
    }
}

fn channel() -> ChannelRef {
    ChannelRef::Handle("x".into())
}

#[tokio::test]
async fn fallback_prefers_primary_items() {
    let (primary, primary_calls) = FakeSource::boxed(Behaviour::Items, "api");
    let (fallback, fallback_calls) = FakeSource::boxed(Behaviour::Items, "feed");
    let source = FallbackSource::new(Some(primary), fallback);

    let items = source.list_recent(&channel(), 10).await.unwrap();
    assert_eq!(items[0].id, "api-1");
    assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn fallback_on_quota_exhaustion_emits_event() {
    let (tx, mut rx) = broadcast::channel(8);
    let (primary, _) = FakeSource::boxed(Behaviour::Quota, "api");
    let (fallback, _) = FakeSource::boxed(Behaviour::Items, "feed");
    let source = FallbackSource::new(Some(primary), fallback).with_events(tx);

    let items = source.list_recent(&channel(), 10).await.unwrap();
    assert_eq!(items[0].id, "feed-1");

    match rx.try_recv().unwrap() {
        crate::types::Event::SourceFallback { reason } => assert!(reason.contains("quota")),
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn fallback_on_empty_or_failed_primary() {
    for behaviour in [Behaviour::Empty, Behaviour::Fail] {
        let (primary, _) = FakeSource::boxed(behaviour, "api");
        let (fallback, fallback_calls) = FakeSource::boxed(Behaviour::Items, "feed");
        let source = FallbackSource::new(Some(primary), fallback);

        let items = source.list_recent(&channel(), 10).await.unwrap();
        assert_eq!(items[0].id, "feed-1");
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }
}

#[tokio::test]
async fn total_failure_degrades_to_empty_list() {
    let (primary, _) = FakeSource::boxed(Behaviour::Fail, "api");
    let (fallback, _) = FakeSource::boxed(Behaviour::Fail, "feed");
    let source = FallbackSource::new(Some(primary), fallback);

    let items = source.list_recent(&channel(), 10).await.unwrap();
    assert!(items.is_empty());
}

#[tokio::test]
async fn fallback_without_primary_goes_straight_to_feed() {
    let (fallback, fallback_calls) = FakeSource::boxed(Behaviour::Items, "feed");
    let source = FallbackSource::new(None, fallback);

    let items = source.list_recent(&channel(), 10).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    assert!(source.quota_usage().await.is_none());
}

//! RSS / Atom feed source over HTTP

use async_trait::async_trait;
use chrono::SecondsFormat;
use newsroom_domain::{FeedEntry, FeedError, FeedSource, FetchedFeed};
use reqwest::Client;
use std::time::Duration;

const USER_AGENT: &str = concat!("newsroom/", env!("CARGO_PKG_VERSION"));

/// Fetches feeds with `reqwest` and parses them with `feed-rs`
pub struct HttpFeedSource {
    client: Client,
}

impl HttpFeedSource {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to build HTTP client");

        Self { client }
    }
}

impl Default for HttpFeedSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a parsed feed into port types
pub fn parse_feed(body: &[u8]) -> Result<FetchedFeed, FeedError> {
    let parsed = feed_rs::parser::parse(body).map_err(|e| FeedError::Parse(e.to_string()))?;

    let entries = parsed
        .entries
        .into_iter()
        .map(|entry| {
            let published = entry
                .published
                .or(entry.updated)
                .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true))
                .unwrap_or_default();
            let summary = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default();

            FeedEntry {
                id: entry.id,
                title: entry.title.map(|t| t.content).unwrap_or_default(),
                link: entry
                    .links
                    .first()
                    .map(|l| l.href.clone())
                    .unwrap_or_default(),
                published,
                summary,
            }
        })
        .collect();

    Ok(FetchedFeed {
        title: parsed.title.map(|t| t.content),
        entries,
    })
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str) -> Result<FetchedFeed, FeedError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FeedError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FeedError::Api {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FeedError::Network(e.to_string()))?;

        let feed = parse_feed(&body)?;
        tracing::debug!(url, entries = feed.entries.len(), "Fetched feed");
        Ok(feed)
    }
}

/// Feed source returning fixed feeds keyed by URL (for testing and offline mode)
#[derive(Default)]
pub struct StubFeedSource {
    feeds: std::collections::HashMap<String, FetchedFeed>,
}

impl StubFeedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(mut self, url: impl Into<String>, feed: FetchedFeed) -> Self {
        self.feeds.insert(url.into(), feed);
        self
    }
}

#[async_trait]
impl FeedSource for StubFeedSource {
    async fn fetch(&self, url: &str) -> Result<FetchedFeed, FeedError> {
        self.feeds.get(url).cloned().ok_or_else(|| FeedError::Api {
            status: 404,
            url: url.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>OpenAI News</title>
    <item>
      <guid>urn:openai:1</guid>
      <title>New agent SDK</title>
      <link>https://openai.com/news/agent-sdk/?utm_source=rss</link>
      <pubDate>Wed, 01 Jul 2026 10:00:00 GMT</pubDate>
      <description>&lt;p&gt;Build &lt;b&gt;agents&lt;/b&gt;&lt;/p&gt;</description>
    </item>
    <item>
      <title>Second</title>
      <link>https://openai.com/news/second</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_rss_entries() {
        let feed = parse_feed(RSS.as_bytes()).unwrap();

        assert_eq!(feed.title.as_deref(), Some("OpenAI News"));
        assert_eq!(feed.entries.len(), 2);

        let first = &feed.entries[0];
        assert_eq!(first.id, "urn:openai:1");
        assert_eq!(first.title, "New agent SDK");
        assert_eq!(first.link, "https://openai.com/news/agent-sdk/?utm_source=rss");
        assert_eq!(first.published, "2026-07-01T10:00:00Z");
        assert!(first.summary.contains("agents"));

        assert_eq!(feed.entries[1].published, "");
    }

    #[test]
    fn test_parse_garbage_is_error() {
        assert!(matches!(
            parse_feed(b"definitely not xml"),
            Err(FeedError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_over_http() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
            .mount(&mock_server)
            .await;

        let source = HttpFeedSource::new();
        let feed = source
            .fetch(&format!("{}/feed.xml", mock_server.uri()))
            .await
            .unwrap();

        assert_eq!(feed.entries.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_http_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let source = HttpFeedSource::new();
        let result = source.fetch(&format!("{}/feed.xml", mock_server.uri())).await;

        assert!(matches!(result, Err(FeedError::Api { status: 503, .. })));
    }
}

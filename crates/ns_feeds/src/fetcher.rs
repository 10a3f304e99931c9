use std::time::Duration;

use async_trait::async_trait;
use ns_core::{Error, FeedEntry, FeedFetcher, Result};
use reqwest::Client;
use tracing::debug;
use url::Url;

/// Fetches RSS/Atom feeds over HTTP.
#[derive(Debug, Clone)]
pub struct RssFetcher {
    client: Client,
}

impl RssFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ns/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

pub fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| Error::Feed(format!("Invalid feed URL {}: {}", url, e)))
}

/// Maps a raw feed document to entries. Entries without a link cannot be
/// deduplicated and are dropped.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<FeedEntry>> {
    let feed = feed_rs::parser::parse(bytes)
        .map_err(|e| Error::Feed(format!("Failed to parse feed: {}", e)))?;

    let total = feed.entries.len();
    let entries: Vec<FeedEntry> = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let link = entry.links.first().map(|l| l.href.trim().to_string())?;
            if link.is_empty() {
                return None;
            }
            Some(FeedEntry {
                title: entry.title.map(|t| t.content.trim().to_string()).unwrap_or_default(),
                link,
                published: entry.published.or(entry.updated).map(|d| d.to_rfc3339()),
                summary: entry
                    .summary
                    .map(|s| s.content.trim().to_string())
                    .filter(|s| !s.is_empty()),
            })
        })
        .collect();

    if entries.len() < total {
        debug!("Skipped {} feed entries without a link", total - entries.len());
    }
    Ok(entries)
}

#[async_trait]
impl FeedFetcher for RssFetcher {
    async fn fetch(&self, feed_url: &str) -> Result<Vec<FeedEntry>> {
        let url = parse_url(feed_url)?;
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body = response.bytes().await?;
        parse_feed(&body)
    }
}

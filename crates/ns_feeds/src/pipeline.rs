use std::sync::Arc;

use futures::stream::{self, StreamExt};
use ns_core::{Article, ArticleStorage, Config, FeedFetcher, FeedSource, MergeReport, Result};
use serde::Serialize;

use crate::logging::Logger;

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestionReport {
    pub fetched: usize,
    pub failed_feeds: Vec<String>,
    pub flushes: usize,
    pub merge: MergeReport,
}

/// Fetches every configured feed, stages the articles in fixed-size slices
/// and finishes each run with a dedup merge into the dataset.
pub struct IngestionPipeline {
    fetcher: Arc<dyn FeedFetcher>,
    storage: Arc<dyn ArticleStorage>,
    batch_size: usize,
    concurrency: usize,
}

impl IngestionPipeline {
    pub fn new(fetcher: Arc<dyn FeedFetcher>, storage: Arc<dyn ArticleStorage>, config: &Config) -> Self {
        Self {
            fetcher,
            storage,
            batch_size: config.batch_size.max(1),
            concurrency: config.fetch_concurrency.max(1),
        }
    }

    async fn flush(&self, slice: &[Article], logger: &Logger) -> Result<()> {
        self.storage.append_staged(slice).await?;
        logger.info(&format!("Flushed {} articles to staging", slice.len()));
        Ok(())
    }

    pub async fn run(&self, sources: &[FeedSource]) -> Result<IngestionReport> {
        let logger = Logger::new().with_prefix("[ingest]");
        let mut report = IngestionReport::default();

        let jobs: Vec<(String, String)> = sources
            .iter()
            .flat_map(|s| s.urls.iter().map(move |url| (s.site.clone(), url.clone())))
            .collect();
        logger.info(&format!("Fetching {} feeds from {} sites", jobs.len(), sources.len()));

        // Fetches overlap, results arrive in configured order.
        let mut fetches = stream::iter(jobs)
            .map(|(site, url)| {
                let fetcher = self.fetcher.clone();
                async move {
                    let result = fetcher.fetch(&url).await;
                    (site, url, result)
                }
            })
            .buffered(self.concurrency);

        let mut buffer: Vec<Article> = Vec::new();
        while let Some((site, url, result)) = fetches.next().await {
            let site_logger = logger.clone().with_prefix(format!("[{}]", site));
            match result {
                Ok(entries) => {
                    site_logger.info(&format!("Fetched {} entries from {}", entries.len(), url));
                    report.fetched += entries.len();
                    buffer.extend(entries.into_iter().map(|e| e.into_article(&url, &site)));

                    while buffer.len() >= self.batch_size {
                        let rest = buffer.split_off(self.batch_size);
                        self.flush(&buffer, &site_logger).await?;
                        report.flushes += 1;
                        buffer = rest;
                    }
                }
                Err(e) => {
                    site_logger.error(&format!("Error fetching articles from {}: {}", url, e));
                    report.failed_feeds.push(url);
                }
            }
        }

        if !buffer.is_empty() {
            self.flush(&buffer, &logger).await?;
            report.flushes += 1;
        }

        // Always merge, so staging left by an interrupted run is reconciled.
        report.merge = self.storage.merge_staged_into_final().await?;
        logger.info(&format!(
            "Run complete: {} fetched, {} new, {} feeds failed",
            report.fetched,
            report.merge.added,
            report.failed_feeds.len()
        ));
        Ok(report)
    }
}

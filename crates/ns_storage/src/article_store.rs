use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ns_core::{Article, ArticleStorage, Config, Error, MergeReport, Result};
use tracing::{debug, info};

use crate::dataset::{self, ARTICLE_COLUMNS};

/// File-backed article collection: one permanent CSV dataset plus an
/// append-only staging file that is folded into it by [`ArticleStore::merge`].
#[derive(Debug, Clone)]
pub struct ArticleStore {
    dataset_path: PathBuf,
    staging_path: PathBuf,
    batch_size: usize,
}

impl ArticleStore {
    pub fn new(config: &Config) -> Self {
        Self::with_paths(config.dataset_path(), config.staging_path(), config.batch_size)
    }

    pub fn with_paths(dataset_path: PathBuf, staging_path: PathBuf, batch_size: usize) -> Self {
        Self {
            dataset_path,
            staging_path,
            batch_size: batch_size.max(1),
        }
    }

    pub fn dataset_path(&self) -> &Path {
        &self.dataset_path
    }

    pub fn staging_path(&self) -> &Path {
        &self.staging_path
    }

    /// Appends `articles` to the staging file in `batch_size` chunks.
    /// Returns the number of chunks written.
    pub fn stage(&self, articles: &[Article]) -> Result<usize> {
        if articles.is_empty() {
            debug!("No articles to stage");
            return Ok(0);
        }
        let mut batches = 0;
        for chunk in articles.chunks(self.batch_size) {
            dataset::append_rows(&self.staging_path, ARTICLE_COLUMNS, chunk)?;
            batches += 1;
            info!("Staged {} articles to {}", chunk.len(), self.staging_path.display());
        }
        Ok(batches)
    }

    /// Unions the staging file into the dataset, keeping the staged version of
    /// any duplicated link. The dataset is replaced atomically and the staging
    /// file removed afterwards.
    pub fn merge(&self) -> Result<MergeReport> {
        if !self.staging_path.exists() {
            info!(
                "Staging file {} does not exist, nothing to merge",
                self.staging_path.display()
            );
            let total = self.load()?.map(|a| a.len()).unwrap_or(0);
            return Ok(MergeReport { added: 0, total, merged: false });
        }

        // An interrupted append may have left a partial row behind.
        dataset::truncate_torn_tail(&self.staging_path)?;
        let staged = dataset::read_articles_lenient(&self.staging_path)?;
        let existing = self.load()?.unwrap_or_default();
        let before = existing.len();

        let mut combined = existing;
        combined.extend(staged);
        let merged = dedup_by_link(combined);

        dataset::write_rows(&self.dataset_path, ARTICLE_COLUMNS, &merged)?;
        fs::remove_file(&self.staging_path)?;

        let report = MergeReport {
            added: merged.len().saturating_sub(before),
            total: merged.len(),
            merged: true,
        };
        info!(
            "Saved {} new articles to {} ({} total)",
            report.added,
            self.dataset_path.display(),
            report.total
        );
        Ok(report)
    }

    /// Reads the whole dataset. `None` when it has not been created yet.
    pub fn load(&self) -> Result<Option<Vec<Article>>> {
        if !self.dataset_path.exists() {
            return Ok(None);
        }
        dataset::read_articles(&self.dataset_path).map(Some)
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(ArticleStore) -> Result<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(store))
            .await
            .map_err(|e| Error::External(e.into()))?
    }
}

/// Last-write-wins deduplication on `link`. Each surviving record sits at the
/// position of its last occurrence.
pub(crate) fn dedup_by_link(articles: Vec<Article>) -> Vec<Article> {
    let last_seen: HashMap<String, usize> = articles
        .iter()
        .enumerate()
        .map(|(i, a)| (a.link.clone(), i))
        .collect();
    articles
        .into_iter()
        .enumerate()
        .filter(|(i, a)| last_seen.get(&a.link) == Some(i))
        .map(|(_, a)| a)
        .collect()
}

#[async_trait]
impl ArticleStorage for ArticleStore {
    async fn append_staged(&self, articles: &[Article]) -> Result<usize> {
        let articles = articles.to_vec();
        self.blocking(move |store| store.stage(&articles)).await
    }

    async fn merge_staged_into_final(&self) -> Result<MergeReport> {
        self.blocking(|store| store.merge()).await
    }

    async fn snapshot(&self) -> Result<Option<Vec<Article>>> {
        self.blocking(|store| store.load()).await
    }

    async fn is_ready(&self) -> Result<bool> {
        Ok(self.dataset_path.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn article(link: &str, title: &str) -> Article {
        Article {
            title: title.to_string(),
            link: link.to_string(),
            published: None,
            summary: Some(format!("summary of {}", title)),
            source: "https://vsd.fr/societe/feed/".to_string(),
            site: "vsd.fr".to_string(),
        }
    }

    fn store_in(dir: &Path, batch_size: usize) -> ArticleStore {
        let config = Config {
            batch_size,
            ..Config::with_data_dir(dir)
        };
        ArticleStore::new(&config)
    }

    #[test]
    fn test_stage_splits_into_batches() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path(), 100);
        let articles: Vec<_> = (0..250).map(|i| article(&format!("l{}", i), "t")).collect();

        assert_eq!(store.stage(&articles).unwrap(), 3);
        assert_eq!(dataset::read_articles(store.staging_path()).unwrap().len(), 250);
    }

    #[test]
    fn test_stage_nothing_creates_nothing() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path(), 100);
        assert_eq!(store.stage(&[]).unwrap(), 0);
        assert!(!store.staging_path().exists());
    }

    #[test]
    fn test_merge_keeps_latest_version() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path(), 100);
        store.stage(&[article("1", "old")]).unwrap();
        store.merge().unwrap();

        store.stage(&[article("1", "new"), article("2", "B")]).unwrap();
        let report = store.merge().unwrap();

        assert_eq!(report.added, 1);
        assert_eq!(report.total, 2);
        let articles = store.load().unwrap().unwrap();
        assert_eq!(articles, vec![article("1", "new"), article("2", "B")]);
        assert!(!store.staging_path().exists());
    }

    #[test]
    fn test_merge_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path(), 100);
        let batch = vec![article("a", "A"), article("b", "B")];

        store.stage(&batch).unwrap();
        store.merge().unwrap();
        let once = store.load().unwrap();

        store.stage(&batch).unwrap();
        let report = store.merge().unwrap();
        assert_eq!(report.added, 0);
        assert_eq!(store.load().unwrap(), once);
    }

    #[test]
    fn test_merge_without_staging_is_noop() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path(), 100);
        let report = store.merge().unwrap();
        assert!(!report.merged);
        assert_eq!(report.added, 0);
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_merge_dedups_within_staging() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path(), 100);
        store
            .stage(&[article("x", "first"), article("y", "Y"), article("x", "second")])
            .unwrap();
        let report = store.merge().unwrap();
        assert_eq!(report.added, 2);
        let articles = store.load().unwrap().unwrap();
        assert_eq!(articles, vec![article("y", "Y"), article("x", "second")]);
    }

    #[test]
    fn test_merge_rejects_dataset_without_link() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path(), 100);
        fs::write(store.dataset_path(), "title,url\nA,https://x\n").unwrap();
        store.stage(&[article("1", "A")]).unwrap();

        assert!(matches!(store.merge(), Err(Error::Schema(_))));
        assert!(store.staging_path().exists());
    }

    #[test]
    fn test_merge_rejects_staging_without_link() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path(), 100);
        store.stage(&[article("1", "A")]).unwrap();
        store.merge().unwrap();
        let before = fs::read(store.dataset_path()).unwrap();

        fs::write(store.staging_path(), "title,url\nB,https://y\n").unwrap();
        assert!(matches!(store.merge(), Err(Error::Schema(_))));
        assert_eq!(fs::read(store.dataset_path()).unwrap(), before);
        assert!(store.staging_path().exists());
    }

    fn tear_staging(store: &ArticleStore) {
        use std::io::Write;
        let mut file = fs::OpenOptions::new().append(true).open(store.staging_path()).unwrap();
        file.write_all(b"half,https://x").unwrap();
    }

    #[test]
    fn test_torn_staging_row_does_not_block_later_runs() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path(), 100);
        store.stage(&[article("1", "A")]).unwrap();
        tear_staging(&store);

        store.stage(&[article("2", "B")]).unwrap();
        let report = store.merge().unwrap();
        assert_eq!(report.added, 2);
        assert_eq!(store.load().unwrap().unwrap(), vec![article("1", "A"), article("2", "B")]);
        assert!(!store.staging_path().exists());
    }

    #[test]
    fn test_merge_after_torn_append() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path(), 100);
        store.stage(&[article("1", "A")]).unwrap();
        tear_staging(&store);

        let report = store.merge().unwrap();
        assert_eq!(report.added, 1);
        assert_eq!(store.load().unwrap().unwrap(), vec![article("1", "A")]);
    }

    #[tokio::test]
    async fn test_article_storage_impl() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path(), 2);
        assert!(!store.is_ready().await.unwrap());
        assert!(store.snapshot().await.unwrap().is_none());

        let batches = store
            .append_staged(&[article("1", "A"), article("2", "B"), article("3", "C")])
            .await
            .unwrap();
        assert_eq!(batches, 2);

        let report = store.merge_staged_into_final().await.unwrap();
        assert_eq!(report.added, 3);
        assert!(store.is_ready().await.unwrap());
        assert_eq!(store.snapshot().await.unwrap().unwrap().len(), 3);
    }
}

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use ns_core::{Article, Config, Error, RankedArticle, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dataset;

const MAX_KEY_CHARS: usize = 128;

const CACHE_COLUMNS: &[&str] = &[
    "title", "link", "published", "summary", "source", "site", "similarity",
];

/// Maps query text to a filesystem-safe identifier. ASCII alphanumerics,
/// spaces, hyphens and underscores are kept, everything else becomes `_`.
/// Distinct queries may share a key.
pub fn key_for(query: &str) -> String {
    let key: String = query
        .chars()
        .take(MAX_KEY_CHARS)
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if key.is_empty() {
        "_".to_string()
    } else {
        key
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedRow {
    title: String,
    link: String,
    published: Option<String>,
    summary: Option<String>,
    #[serde(default)]
    source: String,
    #[serde(default)]
    site: String,
    similarity: f32,
}

impl From<&RankedArticle> for CachedRow {
    fn from(ranked: &RankedArticle) -> Self {
        let a = &ranked.article;
        Self {
            title: a.title.clone(),
            link: a.link.clone(),
            published: a.published.clone(),
            summary: a.summary.clone(),
            source: a.source.clone(),
            site: a.site.clone(),
            similarity: ranked.similarity,
        }
    }
}

impl From<CachedRow> for RankedArticle {
    fn from(row: CachedRow) -> Self {
        Self {
            article: Article {
                title: row.title,
                link: row.link,
                published: row.published,
                summary: row.summary,
                source: row.source,
                site: row.site,
            },
            similarity: row.similarity,
        }
    }
}

/// Raw query text to artifact file name. Persisted as pretty JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryIndex {
    entries: BTreeMap<String, String>,
}

impl QueryIndex {
    pub fn get(&self, query: &str) -> Option<&str> {
        self.entries.get(query).map(String::as_str)
    }

    pub fn insert(&mut self, query: &str, file_name: String) {
        self.entries.insert(query.to_string(), file_name);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct QueryCacheEntry {
    pub query: String,
    pub result_file: PathBuf,
    pub results: Vec<RankedArticle>,
    /// Modification time of the artifact
    pub created_at: SystemTime,
}

/// Per-query result artifacts plus the index that resolves a query to its
/// artifact. Artifacts are written before the index that references them.
#[derive(Debug)]
pub struct QueryCache {
    cache_dir: PathBuf,
    index_path: PathBuf,
    max_age: Option<Duration>,
    write_lock: Mutex<()>,
}

impl QueryCache {
    pub fn new(config: &Config) -> Self {
        Self::with_dir(config.cache_dir(), config.cache_ttl)
    }

    pub fn with_dir(cache_dir: PathBuf, max_age: Option<Duration>) -> Self {
        Self {
            index_path: cache_dir.join("query_map.json"),
            cache_dir,
            max_age,
            write_lock: Mutex::new(()),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Loads the index. A missing index is empty; an unparseable one is
    /// treated as empty and replaced on the next store.
    pub fn load_index(&self) -> Result<QueryIndex> {
        let text = match fs::read_to_string(&self.index_path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Query index not found, starting fresh");
                return Ok(QueryIndex::default());
            }
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&text) {
            Ok(index) => Ok(index),
            Err(e) => {
                warn!("Query index {} is unreadable ({}), ignoring it", self.index_path.display(), e);
                Ok(QueryIndex::default())
            }
        }
    }

    fn artifact_path(&self, file_name: &str) -> PathBuf {
        // Index values are bare file names; never follow a path out of the cache dir.
        let name = Path::new(file_name)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        self.cache_dir.join(name)
    }

    fn is_expired(&self, created_at: SystemTime) -> bool {
        match (self.max_age, SystemTime::now().duration_since(created_at)) {
            (Some(max_age), Ok(age)) => age > max_age,
            _ => false,
        }
    }

    /// Resolves `query` to a usable cached entry. Unknown queries, missing or
    /// unreadable artifacts, and expired artifacts are all misses.
    pub fn entry(&self, query: &str) -> Result<Option<QueryCacheEntry>> {
        let index = self.load_index()?;
        let Some(file_name) = index.get(query) else {
            debug!("Cache miss for query: {}", query);
            return Ok(None);
        };

        let path = self.artifact_path(file_name);
        let created_at = match fs::metadata(&path) {
            Ok(meta) => meta.modified()?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("Cached file {} not found for query: {}. Recomputing.", path.display(), query);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        if self.is_expired(created_at) {
            info!("Cached results for query '{}' are stale. Recomputing.", query);
            return Ok(None);
        }

        match dataset::read_rows::<CachedRow>(&path) {
            Ok(rows) => {
                debug!("Loaded {} cached results for query: {}", rows.len(), query);
                Ok(Some(QueryCacheEntry {
                    query: query.to_string(),
                    result_file: path,
                    results: rows.into_iter().map(RankedArticle::from).collect(),
                    created_at,
                }))
            }
            Err(e) => {
                warn!("Cached file {} is unreadable ({}). Recomputing.", path.display(), e);
                Ok(None)
            }
        }
    }

    pub fn lookup(&self, query: &str) -> Result<Option<Vec<RankedArticle>>> {
        Ok(self.entry(query)?.map(|entry| entry.results))
    }

    /// Writes `results` to the artifact named by [`key_for`], then rewrites the
    /// index to point `query` at it. Returns the artifact path.
    pub fn store(&self, query: &str, results: &[RankedArticle]) -> Result<PathBuf> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        fs::create_dir_all(&self.cache_dir)?;

        let file_name = format!("{}.csv", key_for(query));
        let path = self.cache_dir.join(&file_name);
        let rows: Vec<CachedRow> = results.iter().map(CachedRow::from).collect();
        dataset::write_rows(&path, CACHE_COLUMNS, &rows)?;

        let mut index = self.load_index()?;
        index.insert(query, file_name);
        dataset::write_atomic(&self.index_path, |file| {
            serde_json::to_writer_pretty(file, &index)?;
            Ok(())
        })?;

        info!("Cached {} results for query '{}' in {}", results.len(), query, path.display());
        Ok(path)
    }

    async fn blocking<T, F>(self: &Arc<Self>, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&QueryCache) -> Result<T> + Send + 'static,
    {
        let cache = Arc::clone(self);
        tokio::task::spawn_blocking(move || f(cache.as_ref()))
            .await
            .map_err(|e| Error::External(e.into()))?
    }

    /// [`QueryCache::lookup`] on the blocking pool.
    pub async fn lookup_async(self: &Arc<Self>, query: &str) -> Result<Option<Vec<RankedArticle>>> {
        let query = query.to_string();
        self.blocking(move |cache| cache.lookup(&query)).await
    }

    /// [`QueryCache::store`] on the blocking pool. The writer lock is taken
    /// there too, so waiting writers never hold up runtime threads.
    pub async fn store_async(self: &Arc<Self>, query: &str, results: Vec<RankedArticle>) -> Result<PathBuf> {
        let query = query.to_string();
        self.blocking(move |cache| cache.store(&query, &results)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    fn ranked(link: &str, similarity: f32) -> RankedArticle {
        RankedArticle {
            article: Article {
                title: format!("Article {}", link),
                link: format!("https://www.public.fr/{}", link),
                published: Some("Mon, 01 Jan 2024 10:00:00 +0000".to_string()),
                summary: Some("Résumé, \"cité\"\nsur deux lignes".to_string()),
                source: "https://www.public.fr/feed".to_string(),
                site: "public.fr".to_string(),
            },
            similarity,
        }
    }

    #[test]
    fn test_key_for_sanitizes() {
        let key = key_for("Météo & Co!");
        assert!(key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_')));
        assert_eq!(key, "M_t_o _ Co_");
        assert_eq!(key_for("Météo & Co!"), key);
        assert_eq!(key_for("../../etc/passwd"), "______etc_passwd");
        assert_eq!(key_for("real-time_news 2024"), "real-time_news 2024");
    }

    #[test]
    fn test_key_for_bounds_length() {
        let long = "a".repeat(1000);
        assert_eq!(key_for(&long).len(), MAX_KEY_CHARS);
        assert_eq!(key_for(""), "_");
    }

    #[test]
    fn test_store_then_lookup_round_trip() {
        let dir = tempdir().unwrap();
        let cache = QueryCache::with_dir(dir.path().join("old_queries"), None);
        let results = vec![ranked("b", 7.25), ranked("a", 3.5), ranked("c", -1.125)];

        assert!(cache.lookup("famille royale").unwrap().is_none());
        cache.store("famille royale", &results).unwrap();

        assert_eq!(cache.lookup("famille royale").unwrap(), Some(results));
        let index = cache.load_index().unwrap();
        assert_eq!(index.get("famille royale"), Some("famille royale.csv"));
    }

    #[test]
    fn test_store_empty_results() {
        let dir = tempdir().unwrap();
        let cache = QueryCache::with_dir(dir.path().to_path_buf(), None);
        cache.store("rien", &[]).unwrap();
        assert_eq!(cache.lookup("rien").unwrap(), Some(Vec::new()));
    }

    #[test]
    fn test_missing_artifact_is_a_miss_and_store_repairs() {
        let dir = tempdir().unwrap();
        let cache = QueryCache::with_dir(dir.path().to_path_buf(), None);
        let path = cache.store("mode", &[ranked("a", 1.0)]).unwrap();
        fs::remove_file(&path).unwrap();

        assert!(cache.lookup("mode").unwrap().is_none());

        let repaired = vec![ranked("z", 2.0)];
        cache.store("mode", &repaired).unwrap();
        assert_eq!(cache.lookup("mode").unwrap(), Some(repaired));
    }

    #[test]
    fn test_index_keeps_other_queries() {
        let dir = tempdir().unwrap();
        let cache = QueryCache::with_dir(dir.path().to_path_buf(), None);
        cache.store("tele", &[ranked("a", 1.0)]).unwrap();
        cache.store("people", &[ranked("b", 1.0)]).unwrap();

        let index = cache.load_index().unwrap();
        assert_eq!(index.len(), 2);
        assert!(cache.lookup("tele").unwrap().is_some());
        assert!(cache.lookup("people").unwrap().is_some());
    }

    #[test]
    fn test_corrupt_index_is_a_miss() {
        let dir = tempdir().unwrap();
        let cache = QueryCache::with_dir(dir.path().to_path_buf(), None);
        cache.store("culture", &[ranked("a", 1.0)]).unwrap();
        fs::write(cache.index_path(), "{ not json").unwrap();

        assert!(cache.lookup("culture").unwrap().is_none());
        cache.store("culture", &[ranked("a", 1.0)]).unwrap();
        assert!(cache.lookup("culture").unwrap().is_some());
    }

    #[test]
    fn test_expired_artifact_is_a_miss() {
        let dir = tempdir().unwrap();
        let cache = QueryCache::with_dir(dir.path().to_path_buf(), Some(Duration::from_secs(60)));
        let path = cache.store("loisirs", &[ranked("a", 1.0)]).unwrap();
        assert!(cache.lookup("loisirs").unwrap().is_some());

        let past = SystemTime::now() - Duration::from_secs(3600);
        File::options().write(true).open(&path).unwrap().set_modified(past).unwrap();
        assert!(cache.lookup("loisirs").unwrap().is_none());
    }

    #[test]
    fn test_entry_reports_creation_time() {
        let dir = tempdir().unwrap();
        let cache = QueryCache::with_dir(dir.path().to_path_buf(), None);
        let path = cache.store("societe", &[ranked("a", 0.5)]).unwrap();
        let entry = cache.entry("societe").unwrap().unwrap();
        assert_eq!(entry.result_file, path);
        assert_eq!(entry.created_at, fs::metadata(&path).unwrap().modified().unwrap());
    }

    #[test]
    fn test_empty_optional_fields_read_back_as_none() {
        let dir = tempdir().unwrap();
        let cache = QueryCache::with_dir(dir.path().to_path_buf(), None);
        let mut blank = ranked("a", 1.0);
        blank.article.summary = Some(String::new());
        blank.article.published = Some(String::new());
        cache.store("vide", &[blank.clone()]).unwrap();

        let mut expected = blank;
        expected.article.summary = None;
        expected.article.published = None;
        assert_eq!(cache.lookup("vide").unwrap(), Some(vec![expected]));
    }

    #[tokio::test]
    async fn test_async_round_trip() {
        let dir = tempdir().unwrap();
        let cache = Arc::new(QueryCache::with_dir(dir.path().to_path_buf(), None));
        let results = vec![ranked("b", 2.0), ranked("a", 1.0)];

        assert!(cache.lookup_async("cinema").await.unwrap().is_none());
        let path = cache.store_async("cinema", results.clone()).await.unwrap();
        assert!(path.exists());
        assert_eq!(cache.lookup_async("cinema").await.unwrap(), Some(results));
    }

    #[test]
    fn test_store_into_unwritable_dir_fails() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, "").unwrap();
        let cache = QueryCache::with_dir(blocker, None);
        assert!(cache.store("q", &[ranked("a", 1.0)]).is_err());
    }
}

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_TOP_K: usize = 20;
pub const DEFAULT_RANKING_MODEL: &str = "cross-encoder/stsb-distilroberta-base";
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";

/// Paths and model settings shared by every component. Built once by the
/// binary and handed to each component at construction.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    /// Defaults to `data_dir/old_queries` when unset
    pub cache_dir: Option<PathBuf>,
    pub dataset_name: String,
    pub enriched_name: String,
    pub batch_size: usize,
    pub top_k: usize,
    pub ranking_model: String,
    pub embedding_model: String,
    /// Base URL of a remote inference server. Offline models are used when unset.
    pub model_url: Option<String>,
    pub cache_ttl: Option<Duration>,
    pub score_timeout: Option<Duration>,
    pub fetch_concurrency: usize,
    pub fetch_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            cache_dir: None,
            dataset_name: "articles_dataset.csv".to_string(),
            enriched_name: "articles_with_embeddings.csv".to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            top_k: DEFAULT_TOP_K,
            ranking_model: DEFAULT_RANKING_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            model_url: None,
            cache_ttl: None,
            score_timeout: None,
            fetch_concurrency: 4,
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.data_dir.join(&self.dataset_name)
    }

    pub fn staging_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}_temp", self.dataset_name))
    }

    pub fn enriched_path(&self) -> PathBuf {
        self.data_dir.join(&self.enriched_name)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("old_queries"))
    }

    pub fn query_index_path(&self) -> PathBuf {
        self.cache_dir().join("query_map.json")
    }
}

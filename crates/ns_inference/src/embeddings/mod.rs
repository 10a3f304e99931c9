use std::path::PathBuf;
use std::sync::Arc;

use ns_core::{Article, ArticleStorage, Config, EmbeddingModel, Error, Result};
use ns_storage::dataset;
use tracing::info;

const EMBED_BATCH: usize = 64;

/// Text embedded for an article: title and summary, a missing summary as empty.
pub fn embedding_text(article: &Article) -> String {
    format!("{} {}", article.title, article.summary_text())
}

/// Writes a copy of the dataset with an `embedding` column appended.
pub struct EnrichmentStage {
    model: Arc<dyn EmbeddingModel>,
    storage: Arc<dyn ArticleStorage>,
    output_path: PathBuf,
}

impl EnrichmentStage {
    pub fn new(model: Arc<dyn EmbeddingModel>, storage: Arc<dyn ArticleStorage>, config: &Config) -> Self {
        Self {
            model,
            storage,
            output_path: config.enriched_path(),
        }
    }

    pub fn output_path(&self) -> &PathBuf {
        &self.output_path
    }

    /// Returns the number of articles written, 0 when there is no dataset yet.
    pub async fn run(&self) -> Result<usize> {
        let Some(articles) = self.storage.snapshot().await? else {
            info!("Dataset file not found. Run the article fetching step first.");
            return Ok(0);
        };

        info!("🔢 Embedding {} articles with {}", articles.len(), self.model.name());
        let texts: Vec<String> = articles.iter().map(embedding_text).collect();
        let mut embeddings = Vec::with_capacity(texts.len());
        for (i, batch) in texts.chunks(EMBED_BATCH).enumerate() {
            let vectors = self.model.embed(batch).await?;
            if vectors.len() != batch.len() {
                return Err(Error::Inference(format!(
                    "Embedding model returned {} vectors for {} texts",
                    vectors.len(),
                    batch.len()
                )));
            }
            embeddings.extend(vectors);
            info!("Embedded batch {}/{}", i + 1, texts.len().div_ceil(EMBED_BATCH));
        }

        let rows: Vec<(Article, Vec<f32>)> = articles.into_iter().zip(embeddings).collect();
        let count = rows.len();
        let path = self.output_path.clone();
        tokio::task::spawn_blocking(move || dataset::write_enriched(&path, &rows))
            .await
            .map_err(|e| Error::External(e.into()))??;

        info!("Dataset with embeddings saved to {}", self.output_path.display());
        Ok(count)
    }
}

use clap::Parser;
use ns_core::{ArticleStorage, Config, FeedSource, Result};
use ns_feeds::{FeedArgs, IngestionPipeline, RssFetcher};
use ns_inference::{create_embedder, create_ranker, EnrichmentStage, SearchOrchestrator};
use ns_storage::{ArticleStore, QueryCache};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq)]
struct HumanDuration(Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        const OVERFLOW: &str = "Duration is too large";
        let mut total_seconds = 0u64;
        let mut current_number = String::new();
        let mut has_unit = false;

        let mut add = |num: u64, scale: u64| -> std::result::Result<(), String> {
            total_seconds = num
                .checked_mul(scale)
                .and_then(|secs| total_seconds.checked_add(secs))
                .ok_or_else(|| OVERFLOW.to_string())?;
            Ok(())
        };

        for c in s.chars() {
            if c.is_ascii_digit() {
                current_number.push(c);
            } else if !current_number.is_empty() {
                let num = current_number.parse::<u64>().map_err(|_| OVERFLOW.to_string())?;
                match c {
                    's' => add(num, 1)?,
                    'm' => add(num, 60)?,
                    'h' => add(num, 3600)?,
                    'd' => add(num, 86400)?,
                    _ => return Err(format!("Invalid duration unit: {}", c)),
                }
                current_number.clear();
                has_unit = true;
            } else if !c.is_whitespace() {
                return Err(format!("Invalid character in duration: {}", c));
            }
        }

        // A trailing bare number counts as seconds
        if !current_number.is_empty() {
            let num = current_number.parse::<u64>().map_err(|_| OVERFLOW.to_string())?;
            add(num, 1)?;
            has_unit = true;
        }

        if !has_unit {
            return Err("Duration must include a number".to_string());
        }

        Ok(HumanDuration(Duration::from_secs(total_seconds)))
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "News article ingestion and semantic search", long_about = None)]
struct Cli {
    /// Directory holding the dataset files
    #[arg(long, env = "DIR_DATA", default_value = "data", global = true)]
    data_dir: PathBuf,
    /// Directory for cached query results (default: <data-dir>/old_queries)
    #[arg(long, env = "CACHE_DIR", global = true)]
    cache_dir: Option<PathBuf>,
    #[arg(long, env = "RAW_DATA_NAME", default_value = "articles_dataset.csv", global = true)]
    dataset_name: String,
    #[arg(long, env = "SENTENCE_TRANSFORMER_DATA_NAME", default_value = "articles_with_embeddings.csv", global = true)]
    enriched_name: String,
    /// Base URL of the inference server; offline models are used when unset
    #[arg(long, env = "MODEL_URL", global = true)]
    model_url: Option<String>,
    #[arg(long, env = "CROSS_ENCODER_MODEL", default_value = ns_core::config::DEFAULT_RANKING_MODEL, global = true)]
    ranking_model: String,
    #[arg(long, env = "SENTENCE_TRANSFORMER_MODEL", default_value = ns_core::config::DEFAULT_EMBEDDING_MODEL, global = true)]
    embedding_model: String,
    /// JSON file mapping site names to feed URLs
    #[arg(long, env = "FEEDS_FILE", global = true)]
    feeds: Option<PathBuf>,
    #[arg(long, default_value_t = ns_core::config::DEFAULT_TOP_K, global = true)]
    top_k: usize,
    #[arg(long, default_value_t = ns_core::config::DEFAULT_BATCH_SIZE, global = true)]
    batch_size: usize,
    /// Cached results older than this are recomputed (e.g. 6h)
    #[arg(long, env = "CACHE_TTL", global = true)]
    cache_ttl: Option<HumanDuration>,
    /// Abort scoring after this long (e.g. 30s)
    #[arg(long, global = true)]
    score_timeout: Option<HumanDuration>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Fetch all feeds, merge them into the dataset and embed it
    Ingest {
        /// Run in periodic mode with the specified interval (e.g. 1h, 30m, 1d, 1h15m30s)
        #[arg(long)]
        interval: Option<HumanDuration>,
        #[arg(long)]
        skip_enrich: bool,
    },
    /// Embed the current dataset
    Enrich,
    /// Rank the dataset against a query
    Search {
        query: String,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Serve the HTTP API
    Serve {
        #[arg(long, default_value = "0.0.0.0:5000")]
        addr: String,
    },
    /// Inspect feed sources
    Feeds(FeedArgs),
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            data_dir: self.data_dir.clone(),
            cache_dir: self.cache_dir.clone(),
            dataset_name: self.dataset_name.clone(),
            enriched_name: self.enriched_name.clone(),
            batch_size: self.batch_size,
            top_k: self.top_k,
            ranking_model: self.ranking_model.clone(),
            embedding_model: self.embedding_model.clone(),
            model_url: self.model_url.clone(),
            cache_ttl: self.cache_ttl.map(|d| d.0),
            score_timeout: self.score_timeout.map(|d| d.0),
            ..Config::default()
        }
    }

    fn sources(&self) -> Result<Vec<FeedSource>> {
        match &self.feeds {
            Some(path) => ns_feeds::load_feed_sources(path),
            None => Ok(ns_feeds::default_feed_sources()),
        }
    }
}

struct Components {
    storage: Arc<dyn ArticleStorage>,
    fetcher: Arc<RssFetcher>,
    ingestion: Arc<IngestionPipeline>,
    enrichment: Arc<EnrichmentStage>,
    search: Arc<SearchOrchestrator>,
}

fn build(config: &Config) -> Result<Components> {
    let storage: Arc<dyn ArticleStorage> = Arc::new(ArticleStore::new(config));
    let fetcher = Arc::new(RssFetcher::new(config.fetch_timeout)?);
    let ranker = create_ranker(config)?;
    let embedder = create_embedder(config)?;
    info!("🧠 Ranking with {}, embedding with {}", ranker.name(), embedder.name());

    Ok(Components {
        ingestion: Arc::new(IngestionPipeline::new(fetcher.clone(), storage.clone(), config)),
        enrichment: Arc::new(EnrichmentStage::new(embedder, storage.clone(), config)),
        search: Arc::new(SearchOrchestrator::new(
            storage.clone(),
            Arc::new(QueryCache::new(config)),
            ranker,
            config,
        )),
        fetcher,
        storage,
    })
}

async fn ingest_once(components: &Components, sources: &[FeedSource], skip_enrich: bool) -> Result<()> {
    let report = components.ingestion.run(sources).await?;
    info!(
        "📰 Fetched {} articles, {} new, {} in dataset",
        report.fetched, report.merge.added, report.merge.total
    );
    if !report.failed_feeds.is_empty() {
        info!("⚠️ {} feeds failed: {}", report.failed_feeds.len(), report.failed_feeds.join(", "));
    }
    if !skip_enrich {
        let enriched = components.enrichment.run().await?;
        info!("✨ Embedded {} articles", enriched);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    ns_feeds::init_logging();
    let cli = Cli::parse();
    let config = cli.config();
    let sources = cli.sources()?;
    let components = build(&config)?;

    match cli.command {
        Commands::Ingest { interval, skip_enrich } => {
            if let Some(interval) = interval {
                info!("Running in periodic mode with {}s interval", interval.0.as_secs());
                loop {
                    info!("Starting ingestion cycle");
                    if let Err(e) = ingest_once(&components, &sources, skip_enrich).await {
                        error!("Error during ingestion: {}", e);
                    }
                    info!("Waiting {}s before next ingestion", interval.0.as_secs());
                    tokio::time::sleep(interval.0).await;
                }
            } else {
                ingest_once(&components, &sources, skip_enrich).await?;
            }
        }
        Commands::Enrich => {
            let enriched = components.enrichment.run().await?;
            println!("Embedded {} articles into {}", enriched, components.enrichment.output_path().display());
        }
        Commands::Search { query, json } => {
            if !components.storage.is_ready().await? {
                return Err(ns_core::Error::DataNotReady(
                    "Required data file is missing. Run `ns ingest` first.".to_string(),
                ));
            }
            let outcome = components.search.search(&query).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("{} results ({:?})", outcome.results.len(), outcome.origin);
                for ranked in outcome.results {
                    println!("{:>8.4}  {} - {}", ranked.similarity, ranked.article.title, ranked.article.link);
                }
            }
        }
        Commands::Serve { addr } => {
            let state = ns_web::AppState::new(
                components.storage.clone(),
                components.search.clone(),
                components.ingestion.clone(),
                components.enrichment.clone(),
                sources,
            );
            ns_web::serve(&addr, state).await?;
        }
        Commands::Feeds(args) => {
            ns_feeds::handle_command(args, &sources, components.fetcher.as_ref()).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_duration() {
        assert_eq!("1h".parse::<HumanDuration>().unwrap().0, Duration::from_secs(3600));
        assert_eq!("1h15m30s".parse::<HumanDuration>().unwrap().0, Duration::from_secs(4530));
        assert_eq!("2d".parse::<HumanDuration>().unwrap().0, Duration::from_secs(172800));
        assert_eq!("45".parse::<HumanDuration>().unwrap().0, Duration::from_secs(45));
        assert!("1w".parse::<HumanDuration>().is_err());
        assert!("h".parse::<HumanDuration>().is_err());
        assert!("".parse::<HumanDuration>().is_err());
    }

    #[test]
    fn test_human_duration_rejects_overflow() {
        let max_days = u64::MAX / 86400;
        assert!(format!("{}d", max_days).parse::<HumanDuration>().is_ok());
        assert!(format!("{}d", max_days + 1).parse::<HumanDuration>().is_err());
        assert!(format!("{}h", u64::MAX).parse::<HumanDuration>().is_err());
        assert!(format!("{}s1s", u64::MAX).parse::<HumanDuration>().is_err());
        assert!("99999999999999999999999".parse::<HumanDuration>().is_err());
    }

    #[test]
    fn test_cli_builds_config() {
        let cli = Cli::parse_from([
            "ns",
            "--data-dir",
            "/srv/news",
            "--top-k",
            "5",
            "--cache-ttl",
            "6h",
            "search",
            "famille royale",
        ]);
        let config = cli.config();
        assert_eq!(config.dataset_path(), PathBuf::from("/srv/news/articles_dataset.csv"));
        assert_eq!(config.top_k, 5);
        assert_eq!(config.cache_ttl, Some(Duration::from_secs(6 * 3600)));
        assert!(matches!(cli.command, Commands::Search { ref query, json: false } if query == "famille royale"));
    }

    #[test]
    fn test_cli_ingest_interval() {
        let cli = Cli::parse_from(["ns", "ingest", "--interval", "30m", "--skip-enrich"]);
        match cli.command {
            Commands::Ingest { interval, skip_enrich } => {
                assert_eq!(interval, Some(HumanDuration(Duration::from_secs(1800))));
                assert!(skip_enrich);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}

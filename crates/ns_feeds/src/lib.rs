pub mod cli;
pub mod fetcher;
pub mod logging;
pub mod pipeline;
pub mod sources;

pub use cli::{handle_command, FeedArgs, FeedCommands};
pub use fetcher::RssFetcher;
pub use logging::{init_logging, Logger};
pub use pipeline::{IngestionPipeline, IngestionReport};
pub use sources::{default_feed_sources, load_feed_sources};

pub mod prelude {
    pub use super::pipeline::IngestionPipeline;
    pub use ns_core::{Article, Error, FeedFetcher, FeedSource, Result};
}

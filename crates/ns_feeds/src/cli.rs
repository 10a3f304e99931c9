use clap::{Args, Subcommand};
use ns_core::{FeedFetcher, FeedSource, Result};

#[derive(Args, Debug, Clone)]
pub struct FeedArgs {
    #[command(subcommand)]
    pub command: FeedCommands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum FeedCommands {
    /// List the configured feed sources
    List,
    /// Fetch a single feed and print its entries without storing them
    Check {
        url: String,
    },
}

pub async fn handle_command(args: FeedArgs, sources: &[FeedSource], fetcher: &dyn FeedFetcher) -> Result<()> {
    match args.command {
        FeedCommands::List => {
            for source in sources {
                println!("{}:", source.site);
                for url in &source.urls {
                    println!("  - {}", url);
                }
            }
        }
        FeedCommands::Check { url } => {
            let entries = fetcher.fetch(&url).await?;
            println!("Found {} entries", entries.len());
            for entry in entries {
                println!("- {} ({})", entry.title, entry.link);
            }
        }
    }
    Ok(())
}

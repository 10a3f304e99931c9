use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use ns_core::{FeedSource, Result};

/// The feeds ingested when no sources file is given.
pub fn default_feed_sources() -> Vec<FeedSource> {
    vec![
        FeedSource::new(
            "public.fr",
            &[
                "https://www.public.fr/feed",
                "https://www.public.fr/people/feed",
                "https://www.public.fr/tele/feed",
                "https://www.public.fr/mode/feed",
                "https://www.public.fr/people/familles-royales/feed",
            ],
        ),
        FeedSource::new(
            "vsd.fr",
            &[
                "https://vsd.fr/actu-people/feed/",
                "https://vsd.fr/tele/feed/",
                "https://vsd.fr/societe/feed/",
                "https://vsd.fr/culture/feed/",
                "https://vsd.fr/loisirs/feed/",
            ],
        ),
    ]
}

/// Parses `{"site": ["feed url", ...]}`. Sites come back sorted by name.
pub fn parse_feed_sources(json: &str) -> Result<Vec<FeedSource>> {
    let map: BTreeMap<String, Vec<String>> = serde_json::from_str(json)?;
    Ok(map
        .into_iter()
        .map(|(site, urls)| FeedSource { site, urls })
        .collect())
}

pub fn load_feed_sources(path: &Path) -> Result<Vec<FeedSource>> {
    parse_feed_sources(&fs::read_to_string(path)?)
}

use serde::{Deserialize, Serialize};

/// A news article as kept in the dataset. `link` is the identity key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub link: String,
    pub published: Option<String>,
    pub summary: Option<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub site: String,
}

impl Article {
    /// Text handed to the ranking model. Missing summaries score as empty text.
    pub fn summary_text(&self) -> &str {
        self.summary.as_deref().unwrap_or("")
    }
}

/// One entry as produced by a feed, before it is attributed to a site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub published: Option<String>,
    pub summary: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl FeedEntry {
    /// Attributes the entry to a site. Blank `published`/`summary` become
    /// `None`, which is how the dataset files store them.
    pub fn into_article(self, source: &str, site: &str) -> Article {
        Article {
            title: self.title,
            link: self.link,
            published: non_empty(self.published),
            summary: non_empty(self.summary),
            source: source.to_string(),
            site: site.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedArticle {
    pub article: Article,
    pub similarity: f32,
}

/// Outcome of folding the staging area into the dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    /// Net-new records, `len(merged) - len(final_before)`.
    pub added: usize,
    pub total: usize,
    /// False when there was no staging artifact to merge.
    pub merged: bool,
}

/// A named site and the feeds that belong to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSource {
    pub site: String,
    pub urls: Vec<String>,
}

impl FeedSource {
    pub fn new(site: impl Into<String>, urls: &[&str]) -> Self {
        Self {
            site: site.into(),
            urls: urls.iter().map(|u| u.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_article_drops_blank_fields() {
        let entry = FeedEntry {
            title: "Titre".to_string(),
            link: "https://www.public.fr/a".to_string(),
            published: Some(String::new()),
            summary: Some("  ".to_string()),
        };
        let article = entry.into_article("https://www.public.fr/feed", "public.fr");
        assert_eq!(article.published, None);
        assert_eq!(article.summary, None);
        assert_eq!(article.site, "public.fr");
        assert_eq!(article.source, "https://www.public.fr/feed");
    }
}

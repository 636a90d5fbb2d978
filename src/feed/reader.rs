//! Feed Reader — fetches a syndication source and yields ordered articles.
//!
//! No retry policy lives here; a failed fetch is reported and the caller
//! decides whether to try again.

use std::time::Duration;

use chrono::{DateTime, Utc};
use feed_rs::parser;

use crate::error::FeedError;
use crate::feed::article::{ArticleId, ArticleRecord};

pub struct FeedReader {
    client: reqwest::Client,
    timeout: Duration,
}

impl FeedReader {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("feed-curator/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { client, timeout }
    }

    /// Fetch a feed and return its articles in source order, truncated to
    /// `max` when given.
    pub async fn fetch(
        &self,
        url: &str,
        max: Option<usize>,
    ) -> Result<Vec<ArticleRecord>, FeedError> {
        tracing::debug!(feed = %url, "Fetching feed");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_transport_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Unavailable {
                url: url.to_string(),
                reason: format!("HTTP {status}"),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.map_transport_error(url, e))?;

        let articles = parse_articles(bytes.as_ref(), url, max)?;
        tracing::info!(feed = %url, count = articles.len(), "Fetched feed");
        Ok(articles)
    }

    /// Fetch a feed and keep only articles published within the last
    /// `window_days` days. Articles with no date are excluded.
    pub async fn fetch_recent(
        &self,
        url: &str,
        window_days: i64,
        max: Option<usize>,
    ) -> Result<Vec<ArticleRecord>, FeedError> {
        let articles = self.fetch(url, None).await?;
        let mut recent = filter_recent(articles, window_days, Utc::now());
        if let Some(max) = max {
            recent.truncate(max);
        }
        Ok(recent)
    }

    fn map_transport_error(&self, url: &str, e: reqwest::Error) -> FeedError {
        if e.is_timeout() {
            FeedError::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            }
        } else {
            FeedError::Unavailable {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

/// Parse feed content into article records, preserving source order.
fn parse_articles(
    content: &[u8],
    url: &str,
    max: Option<usize>,
) -> Result<Vec<ArticleRecord>, FeedError> {
    let feed = parser::parse(content).map_err(|e| FeedError::Unavailable {
        url: url.to_string(),
        reason: format!("parse failure: {e}"),
    })?;

    // Feed title labels the source; fall back to the URL when absent.
    let source = feed
        .title
        .map(|t| t.content)
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| url.to_string());

    let mut articles = Vec::new();
    for entry in feed.entries {
        let Some(link) = entry.links.first().map(|l| l.href.clone()) else {
            tracing::debug!(feed = %url, "Skipping entry without link");
            continue;
        };

        let title = entry
            .title
            .map(|t| collapse_whitespace(&t.content))
            .unwrap_or_else(|| "Untitled".to_string());

        articles.push(ArticleRecord {
            id: ArticleId::from_link(&link),
            title,
            authors: entry.authors.into_iter().map(|a| a.name).collect(),
            abstract_text: entry.summary.map(|s| s.content).unwrap_or_default(),
            link,
            published: entry.published.or(entry.updated),
            source: source.clone(),
        });

        if let Some(max) = max {
            if articles.len() >= max {
                break;
            }
        }
    }

    Ok(articles)
}

/// Keep articles published within the last `window_days` days of `now`.
fn filter_recent(
    articles: Vec<ArticleRecord>,
    window_days: i64,
    now: DateTime<Utc>,
) -> Vec<ArticleRecord> {
    let cutoff = now - chrono::Duration::days(window_days);
    articles
        .into_iter()
        .filter(|a| match a.published {
            Some(date) => date >= cutoff,
            None => {
                tracing::debug!(article = %a.id, "Excluding undated article from recency window");
                false
            }
        })
        .collect()
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel>
  <title>arXiv cs.LG</title>
  <item>
    <title>Deep Sets,
 Revisited</title>
    <link>https://arxiv.org/abs/2401.00001</link>
    <description>We revisit permutation-invariant architectures.</description>
    <author>a.author@example.com (Ada Author)</author>
    <pubDate>Tue, 04 Aug 2026 06:00:00 GMT</pubDate>
  </item>
  <item>
    <title>Old Result</title>
    <link>https://arxiv.org/abs/2301.00002</link>
    <description>An older paper.</description>
    <pubDate>Mon, 06 Feb 2023 06:00:00 GMT</pubDate>
  </item>
</channel></rss>"#;

    #[test]
    fn test_parse_preserves_source_order() {
        let articles = parse_articles(RSS.as_bytes(), "https://example.com/rss", None).unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "Deep Sets, Revisited");
        assert_eq!(articles[1].title, "Old Result");
        assert_eq!(articles[0].source, "arXiv cs.LG");
        assert_eq!(
            articles[0].id.as_str(),
            "https://arxiv.org/abs/2401.00001"
        );
    }

    #[test]
    fn test_parse_respects_max() {
        let articles = parse_articles(RSS.as_bytes(), "https://example.com/rss", Some(1)).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Deep Sets, Revisited");
    }

    #[test]
    fn test_parse_rejects_non_feed_content() {
        let err = parse_articles(b"<html>not a feed</html>", "https://example.com/rss", None)
            .unwrap_err();
        assert!(matches!(err, FeedError::Unavailable { .. }));
    }

    #[test]
    fn test_filter_recent_window() {
        let articles = parse_articles(RSS.as_bytes(), "https://example.com/rss", None).unwrap();
        let now = "2026-08-05T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let recent = filter_recent(articles, 1, now);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].title, "Deep Sets, Revisited");
    }

    #[test]
    fn test_filter_recent_excludes_undated() {
        let articles = vec![ArticleRecord {
            id: ArticleId::from_link("https://example.com/a"),
            title: "Undated".to_string(),
            authors: vec![],
            abstract_text: String::new(),
            link: "https://example.com/a".to_string(),
            published: None,
            source: "test".to_string(),
        }];
        let now = Utc::now();
        assert!(filter_recent(articles, 1, now).is_empty());
    }
}

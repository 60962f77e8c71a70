use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

use super::parser::{parse_sitemap, SitemapDocument, SitemapEntry};
use super::robots::RobotsRules;
use crate::error::{AppError, Result};

const USER_AGENT_STRING: &str = "Mozilla/5.0 (compatible; MyBot/1.0)";
const CONCURRENT_REQUESTS: usize = 5;
const MAX_INDEX_DEPTH: usize = 3;

/// Title, meta description and readable text of one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageContent {
    pub title: Option<String>,
    pub meta_desc: Option<String>,
    pub body_text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CrawledPage {
    pub url: String,
    pub lastmod: Option<DateTime<Utc>>,
    pub content: PageContent,
}

pub struct SiteCrawler {
    client: Client,
}

impl SiteCrawler {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT_STRING)
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Failed to fetch {}: HTTP {}", url, response.status()).into());
        }

        Ok(response.text().await?)
    }

    /// Every page listed by a sitemap, following nested indexes.
    pub async fn sitemap_entries(&self, sitemap_url: &str) -> Result<Vec<SitemapEntry>> {
        let mut pages = Vec::new();
        let mut pending = vec![(sitemap_url.to_string(), 0usize)];

        while let Some((url, depth)) = pending.pop() {
            let xml = match self.client.get(&url).send().await {
                Ok(response) if response.status().is_success() => response.bytes().await?,
                Ok(response) => {
                    tracing::warn!("Skipping sitemap {}: HTTP {}", url, response.status());
                    continue;
                }
                Err(e) => {
                    tracing::warn!("Skipping sitemap {}: {}", url, e);
                    continue;
                }
            };

            match parse_sitemap(&xml) {
                Ok(SitemapDocument::Index(children)) if depth < MAX_INDEX_DEPTH => {
                    tracing::debug!("Sitemap index {} lists {} sitemaps", url, children.len());
                    pending.extend(children.into_iter().map(|c| (c.loc, depth + 1)));
                }
                Ok(SitemapDocument::Index(_)) => {
                    tracing::warn!("Sitemap index nesting too deep at {}", url);
                }
                Ok(SitemapDocument::UrlSet(entries)) => pages.extend(entries),
                Err(e) => tracing::warn!("Failed to parse sitemap {}: {}", url, e),
            }
        }

        if pages.is_empty() {
            return Err(AppError::Other(anyhow::anyhow!("No pages found in sitemap {}", sitemap_url)));
        }
        Ok(pages)
    }

    /// Fetch each page (5 at a time) and extract its content. Pages that
    /// robots.txt disallows or that fail to load are skipped.
    pub async fn crawl(&self, entries: Vec<SitemapEntry>) -> Vec<CrawledPage> {
        let mut robots: HashMap<String, RobotsRules> = HashMap::new();
        let mut allowed = Vec::new();

        for entry in entries {
            let Ok(url) = Url::parse(&entry.loc) else {
                tracing::warn!("Skipping invalid URL {}", entry.loc);
                continue;
            };
            let origin = url.origin().ascii_serialization();
            if !robots.contains_key(&origin) {
                let rules = self.robots_rules(&origin).await;
                robots.insert(origin.clone(), rules);
            }
            if robots[&origin].is_allowed(&robots_target(&url)) {
                allowed.push(entry);
            } else {
                tracing::debug!("robots.txt disallows {}", entry.loc);
            }
        }

        stream::iter(allowed)
            .map(|entry| async move {
                match self.fetch_text(&entry.loc).await {
                    Ok(html) => Some(CrawledPage {
                        content: extract_page(&html),
                        url: entry.loc,
                        lastmod: entry.lastmod,
                    }),
                    Err(e) => {
                        tracing::warn!("Failed to crawl {}: {}", entry.loc, e);
                        None
                    }
                }
            })
            .buffer_unordered(CONCURRENT_REQUESTS)
            .filter_map(|page| async { page })
            .collect()
            .await
    }

    async fn robots_rules(&self, origin: &str) -> RobotsRules {
        match self.fetch_text(&format!("{}/robots.txt", origin)).await {
            Ok(text) => RobotsRules::parse(&text),
            Err(e) => {
                tracing::debug!("No robots.txt for {}: {}", origin, e);
                RobotsRules::default()
            }
        }
    }
}

impl Default for SiteCrawler {
    fn default() -> Self {
        Self::new()
    }
}

/// Path plus query, the part of a URL robots.txt rules match against.
fn robots_target(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

/// Entries whose lastmod is at or after `cutoff`. Entries without a
/// lastmod are dropped.
pub fn recent_entries(entries: Vec<SitemapEntry>, cutoff: DateTime<Utc>) -> Vec<SitemapEntry> {
    entries
        .into_iter()
        .filter(|e| e.lastmod.is_some_and(|lastmod| lastmod >= cutoff))
        .collect()
}

pub fn extract_page(html: &str) -> PageContent {
    let document = Html::parse_document(html);

    let title = Selector::parse("title").ok().and_then(|sel| {
        document
            .select(&sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    });

    let meta_desc = Selector::parse(r#"meta[name="description"]"#).ok().and_then(|sel| {
        document
            .select(&sel)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
    });

    PageContent {
        title,
        meta_desc,
        body_text: html_to_text(html),
    }
}

/// Readable text of an HTML document, one non-empty line per block.
pub fn html_to_text(html: &str) -> Option<String> {
    let text = match html2text::from_read(html.as_bytes(), 100) {
        Ok(t) => t,
        Err(e) => {
            tracing::debug!("Failed to convert HTML to text: {}", e);
            return None;
        }
    };

    let cleaned: String = text
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const PAGE: &str = r#"<!DOCTYPE html>
        <html><head>
          <title> Image Annotation Services </title>
          <meta name="description" content="Human-labeled training data.">
        </head>
        <body>
          <h1>Image annotation</h1>
          <p>Bounding boxes and segmentation,   done by people.</p>
        </body></html>"#;

    #[test]
    fn test_extract_page() {
        let page = extract_page(PAGE);
        assert_eq!(page.title.as_deref(), Some("Image Annotation Services"));
        assert_eq!(page.meta_desc.as_deref(), Some("Human-labeled training data."));

        let body = page.body_text.unwrap();
        assert!(body.contains("Image annotation"));
        assert!(body.contains("Bounding boxes"));
    }

    #[test]
    fn test_extract_page_without_metadata() {
        let page = extract_page("<html><body></body></html>");
        assert_eq!(page, PageContent::default());
    }

    #[test]
    fn test_robots_target_keeps_query() {
        let url = Url::parse("https://www.example.com/search/?s=ai#top").unwrap();
        assert_eq!(robots_target(&url), "/search/?s=ai");
        let url = Url::parse("https://www.example.com").unwrap();
        assert_eq!(robots_target(&url), "/");
    }

    #[test]
    fn test_recent_entries_cutoff_is_inclusive() {
        let cutoff = Utc.with_ymd_and_hms(2024, 9, 1, 0, 0, 0).unwrap();
        let entry = |loc: &str, lastmod| SitemapEntry {
            loc: loc.to_string(),
            lastmod,
        };
        let entries = vec![
            entry("https://a/old", Some(cutoff - chrono::Duration::days(1))),
            entry("https://a/edge", Some(cutoff)),
            entry("https://a/new", Some(cutoff + chrono::Duration::days(30))),
            entry("https://a/undated", None),
        ];

        let kept: Vec<_> = recent_entries(entries, cutoff).into_iter().map(|e| e.loc).collect();
        assert_eq!(kept, vec!["https://a/edge", "https://a/new"]);
    }
}

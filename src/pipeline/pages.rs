use chrono::Utc;

use crate::db::Repository;
use crate::error::Result;
use crate::models::NewSitemapUrl;
use crate::sitemap::{recent_entries, CrawledPage, SiteCrawler};

/// Crawl the pages the sitemap lists as changed within `max_age_days` and
/// upsert them.
pub async fn sync_sitemap(
    repository: &Repository,
    crawler: &SiteCrawler,
    sitemap_url: &str,
    max_age_days: i64,
) -> Result<String> {
    tracing::info!("Syncing sitemap from {}", sitemap_url);

    let entries = crawler.sitemap_entries(sitemap_url).await?;
    let cutoff = Utc::now() - chrono::Duration::days(max_age_days);
    let recent = recent_entries(entries, cutoff);
    tracing::info!("Found {} URLs updated in last {} days", recent.len(), max_age_days);

    let pages = crawler.crawl(recent).await;
    let crawled = pages.len();
    let saved = store_crawled_pages(repository, pages).await;
    tracing::info!("Saved {} of {} crawled pages", saved, crawled);

    Ok(format!("Processed {} URLs", crawled))
}

pub async fn store_crawled_pages(repository: &Repository, pages: Vec<CrawledPage>) -> usize {
    let mut saved = 0;

    for page in pages {
        let url = page.url.clone();
        let row = NewSitemapUrl {
            url: page.url,
            title: page.content.title,
            meta_desc: page.content.meta_desc,
            lastmod: page.lastmod,
            content: page.content.body_text,
        };
        match repository.upsert_sitemap_url(row).await {
            Ok(_) => saved += 1,
            Err(e) => tracing::error!("Error saving URL {}: {}", url, e),
        }
    }

    saved
}

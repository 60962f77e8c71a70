mod crawler;
mod parser;
mod robots;

pub use crawler::{recent_entries, CrawledPage, SiteCrawler};

#[cfg(test)]
pub(crate) use crawler::PageContent;

mod fetcher;

pub use fetcher::{NewsClient, NewsResponse, RawStory};

#[cfg(test)]
pub(crate) use fetcher::tests;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitemapUrl {
    pub id: i64,
    pub url: String,
    pub title: Option<String>,
    pub meta_desc: Option<String>,
    pub lastmod: Option<DateTime<Utc>>,
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSitemapUrl {
    pub url: String,
    pub title: Option<String>,
    pub meta_desc: Option<String>,
    pub lastmod: Option<DateTime<Utc>>,
    pub content: Option<String>,
}

/// The slice of a page the matcher shows to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageCandidate {
    pub id: i64,
    pub title: Option<String>,
    pub description: Option<String>,
}

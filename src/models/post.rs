use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub story_id: i64,
    pub sitemap_url_id: i64,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub story_id: i64,
    pub sitemap_url_id: i64,
    pub content: Option<String>,
    pub image_url: Option<String>,
}

/// A post joined with the story title and page url, for listings.
#[derive(Debug, Clone)]
pub struct PostListing {
    pub post: Post,
    pub story_title: String,
    pub page_url: String,
}

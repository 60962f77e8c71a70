use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub source_id: String,
    pub name: String,
    pub url: String,
    pub icon: Option<String>,
    pub priority: i64,
}

#[derive(Debug, Clone)]
pub struct NewSource {
    pub source_id: String,
    pub name: String,
    pub url: String,
    pub icon: Option<String>,
    pub priority: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub id: i64,
    pub article_id: String,
    pub title: String,
    pub description: Option<String>,
    pub link: String,
    pub pub_date: DateTime<Utc>,
    pub pub_date_tz: String,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub language: String,
    pub duplicate: bool,
    pub relevance_score: i64,
    pub relevance_reason: String,
    pub source_id: i64,
}

/// A scored story ready to be written, along with the names of the
/// keywords, countries and categories to link once the row exists.
#[derive(Debug, Clone)]
pub struct NewStory {
    pub article_id: String,
    pub title: String,
    pub description: Option<String>,
    pub link: String,
    pub pub_date: DateTime<Utc>,
    pub pub_date_tz: String,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub language: String,
    pub duplicate: bool,
    pub relevance_score: i64,
    pub relevance_reason: String,
    pub keywords: Vec<String>,
    pub countries: Vec<String>,
    pub categories: Vec<String>,
}

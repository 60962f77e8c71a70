use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Remixable {
    pub id: i64,
    pub url: String,
    pub title: Option<String>,
    pub markdown_content: Option<String>,
    pub is_video: bool,
    pub remixed_as: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewRemixable {
    pub url: String,
    pub title: Option<String>,
    pub markdown_content: Option<String>,
    pub is_video: bool,
    pub remixed_as: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemixableImage {
    pub id: i64,
    pub remixable_id: i64,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

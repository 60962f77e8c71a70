use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{NewSource, NewStory};

const NEWSDATA_API_URL: &str = "https://newsdata.io/api/1/news";
const CACHE_MAX_AGE_SECS: i64 = 3600;

#[derive(Debug, Clone)]
pub struct NewsResponse {
    pub status: String,
    pub total_results: i64,
    pub results: Vec<RawStory>,
}

/// The response envelope. `results` stays untyped; stories are decoded one
/// at a time and error bodies carry an object there.
#[derive(Debug, Deserialize)]
struct ResponseBody {
    status: String,
    #[serde(rename = "totalResults", default)]
    total_results: i64,
    #[serde(default)]
    results: serde_json::Value,
}

/// One article as the news API returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawStory {
    pub article_id: String,
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "pubDate")]
    pub pub_date: String,
    #[serde(rename = "pubDateTZ", default = "default_tz")]
    pub pub_date_tz: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    pub source_id: String,
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub source_icon: Option<String>,
    #[serde(default)]
    pub source_priority: Option<i64>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub country: Option<Vec<String>>,
    #[serde(default)]
    pub category: Option<Vec<String>>,
    #[serde(default)]
    pub duplicate: bool,
}

fn default_tz() -> String {
    "UTC".to_string()
}

impl RawStory {
    pub fn to_new_source(&self) -> NewSource {
        NewSource {
            source_id: self.source_id.clone(),
            name: self.source_name.clone().unwrap_or_else(|| self.source_id.clone()),
            url: self.source_url.clone().unwrap_or_default(),
            icon: self.source_icon.clone(),
            priority: self.source_priority.unwrap_or_default(),
        }
    }

    /// Map the raw fields onto a story row. Fails when the publish date
    /// can't be read.
    pub fn to_new_story(&self, relevance_score: i64, relevance_reason: String) -> Result<NewStory> {
        let pub_date = parse_pub_date(&self.pub_date).ok_or_else(|| {
            AppError::NewsApi(format!("Unreadable pubDate {:?}", self.pub_date))
        })?;

        Ok(NewStory {
            article_id: self.article_id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            link: self.link.clone(),
            pub_date,
            pub_date_tz: self.pub_date_tz.clone(),
            image_url: self.image_url.clone(),
            video_url: self.video_url.clone(),
            language: self.language.clone().unwrap_or_default(),
            duplicate: self.duplicate,
            relevance_score,
            relevance_reason,
            keywords: self.keywords.clone().unwrap_or_default(),
            countries: self.country.clone().unwrap_or_default(),
            categories: self.category.clone().unwrap_or_default(),
        })
    }
}

fn parse_pub_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // newsdata.io format (e.g., "2024-11-20 10:15:00"), always UTC
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

pub struct NewsClient {
    client: Client,
    api_key: String,
}

impl NewsClient {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("newsposter/0.1")
            .build()
            .expect("Failed to create HTTP client");

        Self { client, api_key }
    }

    /// Fetch the latest stories for a query. Responses are reused from the
    /// database for up to an hour.
    pub async fn fetch_latest(
        &self,
        repository: &Repository,
        query: &str,
        language: &str,
    ) -> Result<NewsResponse> {
        let cache_key = format!("newsdata:{}:{}", query, language);

        if let Some(body) = repository.cached_response(&cache_key, CACHE_MAX_AGE_SECS).await? {
            tracing::debug!("Using cached news response for {:?}", query);
            return parse_response(&body);
        }

        let url = format!(
            "{}?apikey={}&q={}&language={}",
            NEWSDATA_API_URL,
            urlencoding::encode(&self.api_key),
            urlencoding::encode(query),
            urlencoding::encode(language)
        );

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(AppError::NewsApi(format!("HTTP {}: {}", status, error_text)));
        }

        let body = response.text().await?;
        let news = parse_response(&body)?;
        repository.store_response(&cache_key, body).await?;

        tracing::info!(
            "Fetched {} of {} stories for {:?}",
            news.results.len(),
            news.total_results,
            query
        );
        Ok(news)
    }
}

fn parse_response(body: &str) -> Result<NewsResponse> {
    let body: ResponseBody = serde_json::from_str(body)?;
    if body.status != "success" {
        return Err(AppError::NewsApi(format!("status {:?}", body.status)));
    }

    let items = match body.results {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Null => Vec::new(),
        other => {
            return Err(AppError::NewsApi(format!(
                "results is {}, expected a list",
                crate::services::json_type_name(&other)
            )))
        }
    };

    let mut results = Vec::with_capacity(items.len());
    for item in items {
        let article_id = item
            .get("article_id")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("<unknown>")
            .to_string();
        match serde_json::from_value::<RawStory>(item) {
            Ok(story) => results.push(story),
            Err(e) => tracing::warn!("Skipping malformed story {}: {}", article_id, e),
        }
    }

    Ok(NewsResponse {
        status: body.status,
        total_results: body.total_results,
        results,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    const SAMPLE: &str = r#"{
        "status": "success",
        "totalResults": 2,
        "results": [
            {
                "article_id": "3f1c",
                "title": "Lab releases open model",
                "link": "https://news.example.com/open-model",
                "keywords": ["ai ", "open source"],
                "creator": ["Jane"],
                "video_url": null,
                "description": "Weights are public.",
                "content": "ONLY AVAILABLE IN PAID PLANS",
                "pubDate": "2024-11-20 10:15:00",
                "pubDateTZ": "UTC",
                "image_url": "https://news.example.com/img.jpg",
                "source_id": "examplenews",
                "source_priority": 12345,
                "source_name": "Example News",
                "source_url": "https://news.example.com",
                "source_icon": null,
                "language": "english",
                "country": ["united states of america"],
                "category": ["technology"],
                "duplicate": false
            },
            {
                "article_id": "9ab0",
                "title": "Bare story",
                "link": "https://other.example.com/bare",
                "pubDate": "2024-11-21 08:00:00",
                "source_id": "other"
            }
        ],
        "nextPage": "1732"
    }"#;

    pub(crate) fn raw_story(article_id: &str) -> RawStory {
        RawStory {
            article_id: article_id.to_string(),
            title: format!("Story {}", article_id),
            link: format!("https://news.example.com/{}", article_id),
            keywords: Some(vec!["ai".to_string()]),
            description: Some("Something happened".to_string()),
            pub_date: "2024-11-20 10:15:00".to_string(),
            pub_date_tz: "UTC".to_string(),
            image_url: None,
            video_url: None,
            source_id: "examplenews".to_string(),
            source_name: Some("Example News".to_string()),
            source_url: Some("https://news.example.com".to_string()),
            source_icon: None,
            source_priority: Some(100),
            language: Some("english".to_string()),
            country: Some(vec!["germany".to_string()]),
            category: Some(vec!["technology".to_string()]),
            duplicate: false,
        }
    }

    #[test]
    fn test_parse_sample_response() {
        let news = parse_response(SAMPLE).unwrap();
        assert_eq!(news.total_results, 2);
        assert_eq!(news.results.len(), 2);

        let first = &news.results[0];
        assert_eq!(first.keywords.as_ref().unwrap()[0], "ai ");
        assert_eq!(first.source_priority, Some(12345));

        let bare = &news.results[1];
        assert!(bare.description.is_none());
        assert!(bare.category.is_none());
        assert_eq!(bare.pub_date_tz, "UTC");
    }

    #[test]
    fn test_error_status_rejected() {
        let err = parse_response(r#"{"status": "error", "results": []}"#).unwrap_err();
        assert!(matches!(err, AppError::NewsApi(_)));

        // error bodies carry an object in `results`
        let err = parse_response(r#"{"status": "error", "results": {"message": "bad key"}}"#)
            .unwrap_err();
        assert!(matches!(err, AppError::NewsApi(_)));
    }

    #[test]
    fn test_malformed_story_is_skipped() {
        let news = parse_response(
            r#"{
                "status": "success",
                "totalResults": 2,
                "results": [
                    {"article_id": "bad", "title": null, "link": "https://x/1",
                     "pubDate": "2024-11-20 10:15:00", "source_id": "x"},
                    {"article_id": "good", "title": "Fine", "link": "https://x/2",
                     "pubDate": "2024-11-20 10:15:00", "source_id": "x"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(news.total_results, 2);
        assert_eq!(news.results.len(), 1);
        assert_eq!(news.results[0].article_id, "good");
    }

    #[test]
    fn test_to_new_story_maps_fields() {
        let news = parse_response(SAMPLE).unwrap();
        let story = news.results[0].to_new_story(88, "real research".to_string()).unwrap();

        assert_eq!(story.pub_date.year(), 2024);
        assert_eq!(story.pub_date.hour(), 10);
        assert_eq!(story.relevance_score, 88);
        assert_eq!(story.countries, vec!["united states of america"]);
        assert_eq!(story.language, "english");

        let source = news.results[1].to_new_source();
        assert_eq!(source.name, "other");
        assert_eq!(source.priority, 0);
    }

    #[test]
    fn test_bad_pub_date_is_rejected() {
        let mut story = raw_story("x");
        story.pub_date = "yesterday".to_string();
        assert!(story.to_new_story(80, String::new()).is_err());
    }
}

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::models::{NewRemixable, Remixable, RemixableImage};

const AIRTABLE_API_URL: &str = "https://api.airtable.com/v0";

#[derive(Debug, Clone, Deserialize)]
pub struct AirtableRecord {
    pub id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    records: Vec<AirtableRecord>,
    offset: Option<String>,
}

#[derive(Debug, Serialize)]
struct FieldsRequest<'a> {
    fields: &'a Map<String, Value>,
}

pub struct AirtableClient {
    client: Client,
    api_key: String,
    base_id: String,
    table_id: String,
}

impl AirtableClient {
    pub fn new(api_key: String, base_id: String, table_id: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            api_key,
            base_id,
            table_id,
        }
    }

    fn table_url(&self) -> String {
        format!("{}/{}/{}", AIRTABLE_API_URL, self.base_id, self.table_id)
    }

    /// List records, following `offset` pagination until exhausted or
    /// `max_records` is reached.
    pub async fn list_records(
        &self,
        formula: Option<&str>,
        max_records: Option<usize>,
    ) -> Result<Vec<AirtableRecord>> {
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let mut query: Vec<(&str, String)> = Vec::new();
            if let Some(formula) = formula {
                query.push(("filterByFormula", formula.to_string()));
            }
            if let Some(max) = max_records {
                query.push(("maxRecords", max.to_string()));
            }
            if let Some(offset) = &offset {
                query.push(("offset", offset.clone()));
            }

            let response = self
                .client
                .get(self.table_url())
                .bearer_auth(&self.api_key)
                .query(&query)
                .send()
                .await?;

            if !response.status().is_success() {
                let error_text = response.text().await?;
                return Err(AppError::AirtableApi(format!("API error: {}", error_text)));
            }

            let page: ListResponse = response.json().await?;
            records.extend(page.records);

            let reached_max = max_records.is_some_and(|max| records.len() >= max);
            match page.offset {
                Some(next) if !reached_max => offset = Some(next),
                _ => break,
            }
        }

        if let Some(max) = max_records {
            records.truncate(max);
        }
        Ok(records)
    }

    pub async fn create_record(&self, fields: &Map<String, Value>) -> Result<String> {
        let response = self
            .client
            .post(self.table_url())
            .bearer_auth(&self.api_key)
            .json(&FieldsRequest { fields })
            .send()
            .await?;
        self.record_id(response).await
    }

    pub async fn update_record(&self, record_id: &str, fields: &Map<String, Value>) -> Result<String> {
        let response = self
            .client
            .patch(format!("{}/{}", self.table_url(), record_id))
            .bearer_auth(&self.api_key)
            .json(&FieldsRequest { fields })
            .send()
            .await?;
        self.record_id(response).await
    }

    async fn record_id(&self, response: reqwest::Response) -> Result<String> {
        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AppError::AirtableApi(format!("API error: {}", error_text)));
        }
        let record: AirtableRecord = response.json().await?;
        Ok(record.id)
    }
}

/// `{video_url}='…'` with the value escaped for an Airtable string literal.
pub fn video_url_formula(url: &str) -> String {
    let escaped = url.replace('\\', "\\\\").replace('\'', "\\'");
    format!("{{video_url}}='{}'", escaped)
}

pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn text_field(fields: &Map<String, Value>, name: &str) -> Option<String> {
    fields
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Map a video record onto a Remixable plus its image URLs. Records
/// without `video_url` are not importable.
pub fn remixable_from_fields(fields: &Map<String, Value>) -> Option<(NewRemixable, Vec<String>)> {
    let url = text_field(fields, "video_url").filter(|u| !u.trim().is_empty())?;

    // plain URL lists and attachment objects both occur
    let images = fields
        .get("image")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(obj) => obj.get("url").and_then(Value::as_str).map(str::to_string),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    let remixable = NewRemixable {
        url,
        title: text_field(fields, "video_title"),
        markdown_content: text_field(fields, "transcript"),
        is_video: true,
        remixed_as: text_field(fields, "post"),
    };
    Some((remixable, images))
}

pub fn fields_from_remixable(remixable: &Remixable, images: &[RemixableImage]) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("video_url".to_string(), Value::from(remixable.url.clone()));
    fields.insert("video_title".to_string(), Value::from(remixable.title.clone()));
    fields.insert("post".to_string(), Value::from(remixable.remixed_as.clone()));
    fields.insert("transcript".to_string(), Value::from(remixable.markdown_content.clone()));
    if !images.is_empty() {
        let attachments = images
            .iter()
            .map(|image| serde_json::json!({ "url": image.image_url }))
            .collect();
        fields.insert("image".to_string(), Value::Array(attachments));
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_formula_escapes_quotes() {
        assert_eq!(
            video_url_formula("https://youtu.be/x?t='1'"),
            r#"{video_url}='https://youtu.be/x?t=\'1\''"#
        );
    }

    #[test]
    fn test_remixable_from_record() {
        let record = fields(json!({
            "video_url": "https://www.youtube.com/watch?v=abc",
            "video_title": "Shipping agents",
            "post": "Remixed text",
            "transcript": "hello world",
            "image": ["https://img/1.png", {"id": "att1", "url": "https://img/2.png"}, 3]
        }));

        let (remixable, images) = remixable_from_fields(&record).unwrap();
        assert!(remixable.is_video);
        assert_eq!(remixable.title.as_deref(), Some("Shipping agents"));
        assert_eq!(remixable.remixed_as.as_deref(), Some("Remixed text"));
        assert_eq!(remixable.markdown_content.as_deref(), Some("hello world"));
        assert_eq!(images, vec!["https://img/1.png", "https://img/2.png"]);
    }

    #[test]
    fn test_record_without_video_url_is_skipped() {
        assert!(remixable_from_fields(&fields(json!({"video_title": "x"}))).is_none());
        assert!(remixable_from_fields(&fields(json!({"video_url": " "}))).is_none());
    }

    #[test]
    fn test_fields_from_remixable() {
        let remixable = Remixable {
            id: 1,
            url: "https://www.youtube.com/watch?v=abc".to_string(),
            title: None,
            markdown_content: Some("transcript".to_string()),
            is_video: true,
            remixed_as: Some("post".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let fields = fields_from_remixable(&remixable, &[]);
        assert_eq!(fields["video_title"], Value::Null);
        assert_eq!(fields["post"], json!("post"));
        assert!(!fields.contains_key("image"));

        let image = RemixableImage {
            id: 1,
            remixable_id: 1,
            image_url: "https://img/1.png".to_string(),
            created_at: Utc::now(),
        };
        let fields = fields_from_remixable(&remixable, &[image]);
        assert_eq!(fields["image"], json!([{"url": "https://img/1.png"}]));
    }

    #[test]
    fn test_list_response_offset() {
        let page: ListResponse = serde_json::from_str(
            r#"{"records": [{"id": "rec1", "createdTime": "2024-01-01T00:00:00.000Z", "fields": {"video_url": "u"}}], "offset": "itr1"}"#,
        )
        .unwrap();
        assert_eq!(page.records[0].id, "rec1");
        assert_eq!(page.offset.as_deref(), Some("itr1"));
        assert_eq!(json_type_name(&page.records[0].fields["video_url"]), "string");
        assert_eq!(json_type_name(&json!(3)), "integer");
        assert_eq!(json_type_name(&json!(["a"])), "array");
    }
}

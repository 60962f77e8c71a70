use serde::Deserialize;

use super::client::{lenient_int, parse_json_reply, ChatModel, ChatRequest};
use crate::error::Result;
use crate::models::{PageCandidate, Story};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PageMatch {
    #[serde(deserialize_with = "lenient_int")]
    pub url_id: i64,
    #[serde(default)]
    pub reason: String,
}

/// Ask the model which page best fits the story. The returned id is
/// whatever the model said; callers check it against the database.
pub async fn choose_page(
    model: &impl ChatModel,
    story: &Story,
    pages: &[PageCandidate],
) -> Result<PageMatch> {
    let system = "You are a social media manager that matches news stories to the most relevant pages on a website.";

    let user = format!(
        "Here is the news story: {}\n{}\n\nHere are the URLs and their metadata: {}. Please return the ID of the most relevant URL in the following JSON format: {{\"url_id\": <id>, \"reason\": <reason>}}",
        story.title,
        story.description.as_deref().unwrap_or(""),
        serde_json::to_string(pages)?
    );

    let reply = model.complete(ChatRequest::new(system, user).json()).await?;
    parse_json_reply(&reply)
}

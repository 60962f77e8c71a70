use serde::Deserialize;

use super::client::{lenient_int, parse_json_reply, ChatModel, ChatRequest};
use crate::error::Result;
use crate::news::RawStory;

const AUDIENCE: &str = r#"Corporate executives with a focus on AI, and AI enthusiasts.
They are interested in genuine AI innovations, not corporate mergers or deals (for example, 'GS Group, Notion to team up on AI capabilities'), or general PR like 'How China plans to rule the world in AI'"#;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RelevanceScore {
    #[serde(deserialize_with = "lenient_int")]
    pub score: i64,
    #[serde(default)]
    pub reason: String,
}

/// A raw story together with the score the model gave it.
#[derive(Debug, Clone)]
pub struct ScoredStory {
    pub story: RawStory,
    pub relevance: RelevanceScore,
}

pub async fn assign_relevance_score(
    model: &impl ChatModel,
    title: &str,
    description: Option<&str>,
) -> Result<RelevanceScore> {
    let system = r#"You are a helpful assistant that assigns a relevance score to a news story based on its title and description. Output in the following JSON format: {"score": 0, "reason": ""}"#;

    let user = format!(
        "Assign a relevance score between 0 and 100 to the following news story based on its title and description for an audience of {}:\nTitle: {}\nDescription: {}",
        AUDIENCE,
        title,
        description.unwrap_or("")
    );

    let reply = model
        .complete(ChatRequest::new(system, user).max_tokens(500).json())
        .await?;

    let mut relevance: RelevanceScore = parse_json_reply(&reply)?;
    relevance.score = relevance.score.clamp(0, 100);
    Ok(relevance)
}

/// Score every story and keep the ones at or above `threshold`. Stories the
/// model fails to score are logged and dropped.
pub async fn assign_relevance_scores(
    model: &impl ChatModel,
    stories: Vec<RawStory>,
    threshold: i64,
) -> Vec<ScoredStory> {
    let total = stories.len();
    let mut kept = Vec::new();
    tracing::info!("Scoring {} stories with {}", total, model.model_version());

    for story in stories {
        match assign_relevance_score(model, &story.title, story.description.as_deref()).await {
            Ok(relevance) => {
                tracing::debug!(
                    article_id = %story.article_id,
                    score = relevance.score,
                    "Scored story"
                );
                if relevance.score >= threshold {
                    kept.push(ScoredStory { story, relevance });
                }
            }
            Err(e) => {
                tracing::error!("Failed to score story {}: {}", story.article_id, e);
            }
        }
    }

    tracing::info!("{} of {} stories scored at or above {}", kept.len(), total, threshold);
    kept
}

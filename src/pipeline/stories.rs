use crate::ai::{assign_relevance_scores, ChatModel, ScoredStory};
use crate::db::Repository;
use crate::error::Result;
use crate::models::Story;
use crate::news::NewsResponse;

/// Score the fetched stories, then persist the ones that pass. Returns only
/// stories that were new to the database.
pub async fn process_stories(
    repository: &Repository,
    model: &impl ChatModel,
    news: NewsResponse,
    threshold: i64,
) -> Vec<Story> {
    let scored = assign_relevance_scores(model, news.results, threshold).await;
    let mut processed = Vec::new();

    for story in scored {
        match persist_story(repository, &story).await {
            Ok(Some(saved)) => processed.push(saved),
            Ok(None) => {
                tracing::debug!("Story {} already stored", story.story.article_id);
            }
            Err(e) => {
                tracing::error!("Error processing story {}: {}", story.story.article_id, e);
            }
        }
    }

    tracing::info!("Processed {} new stories", processed.len());
    processed
}

async fn persist_story(repository: &Repository, scored: &ScoredStory) -> Result<Option<Story>> {
    let new_story = scored
        .story
        .to_new_story(scored.relevance.score, scored.relevance.reason.clone())?;

    let (source, _) = repository
        .get_or_create_source(scored.story.to_new_source())
        .await?;
    let (story, created) = repository.get_or_create_story(source.id, new_story).await?;

    Ok(created.then_some(story))
}

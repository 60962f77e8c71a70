use crate::ai::{choose_page, generate_post_content, poster_prompt, ChatModel, ImageGenerator};
use crate::db::Repository;
use crate::error::Result;
use crate::models::{NewPost, Post, SitemapUrl, Story};

/// Let the model pick the best page for a story and, if it names a real
/// page, write the post. Returns `None` when there was nothing to match.
pub async fn find_relevant_page_for_story(
    repository: &Repository,
    matcher: &impl ChatModel,
    writer: &impl ChatModel,
    images: &impl ImageGenerator,
    story: &Story,
) -> Result<Option<Post>> {
    let pages = repository.page_candidates().await?;
    if pages.is_empty() {
        tracing::warn!("No sitemap pages to match against; run sync-sitemap first");
        return Ok(None);
    }

    let found = choose_page(matcher, story, &pages).await?;

    let Some(page) = repository.get_sitemap_url(found.url_id).await? else {
        tracing::warn!(
            "Model picked unknown page id {} for story {}",
            found.url_id,
            story.article_id
        );
        return Ok(None);
    };

    let post = create_post(repository, writer, images, story, &page).await?;
    tracing::info!("Found relevant page: {} - {}", page.url, found.reason);

    Ok(Some(post))
}

/// Write the post text and its illustration. A failed illustration does
/// not block the post.
pub async fn create_post(
    repository: &Repository,
    writer: &impl ChatModel,
    images: &impl ImageGenerator,
    story: &Story,
    page: &SitemapUrl,
) -> Result<Post> {
    let content = generate_post_content(writer, story, page).await?;

    let image_url = match images.generate(&poster_prompt(story, page)).await {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::warn!("Failed to generate image for story {}: {}", story.article_id, e);
            None
        }
    };

    repository
        .create_post(NewPost {
            story_id: story.id,
            sitemap_url_id: page.id,
            content: Some(content),
            image_url,
        })
        .await
}

/// Match and write a post for every story that doesn't have one yet.
/// Returns how many posts were created.
pub async fn generate_post_for_all_stories(
    repository: &Repository,
    matcher: &impl ChatModel,
    writer: &impl ChatModel,
    images: &impl ImageGenerator,
) -> Result<usize> {
    let stories = repository.stories_without_post().await?;
    tracing::info!("{} stories waiting for a post", stories.len());

    let mut created = 0;
    for story in &stories {
        match find_relevant_page_for_story(repository, matcher, writer, images, story).await {
            Ok(Some(_)) => created += 1,
            Ok(None) => {}
            Err(e) => {
                tracing::error!("Error creating post for story {}: {}", story.article_id, e);
            }
        }
    }

    tracing::info!("Created {} posts", created);
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{FakeImages, ScriptedModel};
    use crate::db::fixtures::{new_page, new_source, new_story, test_repo};
    use crate::error::AppError;

    async fn seed_story(repo: &Repository, article_id: &str) -> Story {
        let (source, _) = repo.get_or_create_source(new_source("wired")).await.unwrap();
        repo.get_or_create_story(source.id, new_story(article_id, 5))
            .await
            .unwrap()
            .0
    }

    #[tokio::test]
    async fn test_match_creates_post_with_image() {
        let (repo, _dir) = test_repo().await;
        let story = seed_story(&repo, "a1").await;
        let page_id = repo
            .upsert_sitemap_url(new_page("https://site.example.com/labeling", "Data labeling"))
            .await
            .unwrap();

        let matcher = ScriptedModel::ok(&[format!(r#"{{"url_id": {}, "reason": "labeling"}}"#, page_id).as_str()]);
        let writer = ScriptedModel::ok(&["Learn more: https://site.example.com/labeling"]);
        let images = FakeImages::new(false);

        let post = find_relevant_page_for_story(&repo, &matcher, &writer, &images, &story)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(post.story_id, story.id);
        assert_eq!(post.sitemap_url_id, page_id);
        assert_eq!(post.content.as_deref(), Some("Learn more: https://site.example.com/labeling"));
        assert_eq!(post.image_url.as_deref(), Some("https://images.example.com/1.png"));
        assert!(images.prompts.lock().unwrap()[0].contains("Story a1"));
    }

    #[tokio::test]
    async fn test_unknown_page_id_skips() {
        let (repo, _dir) = test_repo().await;
        let story = seed_story(&repo, "a1").await;
        repo.upsert_sitemap_url(new_page("https://site.example.com/a", "A"))
            .await
            .unwrap();

        let matcher = ScriptedModel::ok(&[r#"{"url_id": 4242, "reason": "made up"}"#]);
        let writer = ScriptedModel::ok(&[]);

        let post = find_relevant_page_for_story(&repo, &matcher, &writer, &FakeImages::new(false), &story)
            .await
            .unwrap();

        assert!(post.is_none());
        assert_eq!(writer.request_count(), 0);
        assert_eq!(repo.stories_without_post().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_no_pages_skips_without_calling_model() {
        let (repo, _dir) = test_repo().await;
        let story = seed_story(&repo, "a1").await;
        let matcher = ScriptedModel::ok(&[]);

        let post = find_relevant_page_for_story(
            &repo,
            &matcher,
            &ScriptedModel::ok(&[]),
            &FakeImages::new(false),
            &story,
        )
        .await
        .unwrap();

        assert!(post.is_none());
        assert_eq!(matcher.request_count(), 0);
    }

    #[tokio::test]
    async fn test_image_failure_still_saves_post() {
        let (repo, _dir) = test_repo().await;
        let story = seed_story(&repo, "a1").await;
        let page_id = repo
            .upsert_sitemap_url(new_page("https://site.example.com/a", "A"))
            .await
            .unwrap();
        let page = repo.get_sitemap_url(page_id).await.unwrap().unwrap();

        let post = create_post(
            &repo,
            &ScriptedModel::ok(&["text"]),
            &FakeImages::new(true),
            &story,
            &page,
        )
        .await
        .unwrap();

        assert_eq!(post.content.as_deref(), Some("text"));
        assert!(post.image_url.is_none());
    }

    #[tokio::test]
    async fn test_generate_for_all_continues_after_failure() {
        let (repo, _dir) = test_repo().await;
        seed_story(&repo, "first").await;
        seed_story(&repo, "second").await;
        let page_id = repo
            .upsert_sitemap_url(new_page("https://site.example.com/a", "A"))
            .await
            .unwrap();

        let matcher = ScriptedModel::new(vec![
            Err(AppError::LlmApi("timeout".to_string())),
            Ok(format!(r#"{{"url_id": {}, "reason": "fits"}}"#, page_id)),
        ]);
        let writer = ScriptedModel::ok(&["post for second"]);

        let created = generate_post_for_all_stories(&repo, &matcher, &writer, &FakeImages::new(false))
            .await
            .unwrap();

        assert_eq!(created, 1);
        let pending = repo.stories_without_post().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].article_id, "first");

        // a second run only retries the story that failed
        let matcher = ScriptedModel::ok(&[format!(r#"{{"url_id": {}, "reason": "fits"}}"#, page_id).as_str()]);
        let writer = ScriptedModel::ok(&["post for first"]);
        let created = generate_post_for_all_stories(&repo, &matcher, &writer, &FakeImages::new(false))
            .await
            .unwrap();
        assert_eq!(created, 1);
        assert_eq!(matcher.request_count(), 1);
        assert!(repo.stories_without_post().await.unwrap().is_empty());
    }
}

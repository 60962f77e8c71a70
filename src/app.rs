use crate::ai::{AzureImageClient, AzureOpenAi};
use crate::cli::Command;
use crate::config::Config;
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{PostListing, Story};
use crate::news::NewsClient;
use crate::pipeline;
use crate::services::AirtableClient;
use crate::sitemap::SiteCrawler;

const PAGE_SIZE: usize = 20;

pub struct App {
    repository: Repository,
    config: Config,
}

impl App {
    pub async fn new(config: Config) -> Result<Self> {
        let repository = Repository::new(&config.db_path).await?;
        Ok(Self { repository, config })
    }

    pub async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::GetNews => {
                let stories = self.get_news().await?;
                println!("Stored {} new stories", stories.len());
            }
            Command::SyncSitemap => {
                let summary = self.sync_sitemap().await?;
                println!("{}", summary);
            }
            Command::MatchNews { story_id } => self.match_news(story_id).await?,
            Command::GeneratePosts => {
                let created = self.generate_posts().await?;
                println!("Created {} posts", created);
            }
            Command::Run => {
                let stories = self.get_news().await?;
                println!("Stored {} new stories", stories.len());
                let created = self.generate_posts().await?;
                println!("Created {} posts", created);
            }
            Command::Scrape { skip_crawl } => self.scrape(skip_crawl).await?,
            Command::SyncAirtable => {
                let imported = pipeline::sync_airtable_remixables(&self.repository, &self.airtable()?).await?;
                println!("Imported {} Airtable records", imported);
            }
            Command::SyncToAirtable => {
                let synced = pipeline::sync_remixables_to_airtable(&self.repository, &self.airtable()?).await?;
                println!("Synced {} remixables to Airtable", synced);
            }
            Command::AirtableSchema => self.print_airtable_schema().await?,
            Command::Stories { page } => {
                let stories = self
                    .repository
                    .list_stories(PAGE_SIZE as i64, page_offset(page))
                    .await?;
                self.print_stories(&stories).await?;
            }
            Command::Posts { page } => {
                let posts = self
                    .repository
                    .list_posts(PAGE_SIZE as i64, page_offset(page))
                    .await?;
                print_posts(&posts);
            }
        }
        Ok(())
    }

    fn chat_model(&self, deployment: &str) -> Result<AzureOpenAi> {
        let (endpoint, key) = self.config.require_azure()?;
        Ok(AzureOpenAi::new(endpoint, key.to_string(), deployment.to_string()))
    }

    fn image_client(&self) -> Result<AzureImageClient> {
        let (endpoint, key) = self.config.require_azure()?;
        Ok(AzureImageClient::new(
            endpoint,
            key.to_string(),
            self.config.image_deployment.clone(),
        ))
    }

    fn airtable(&self) -> Result<AirtableClient> {
        Ok(AirtableClient::new(
            self.config.require_airtable_key()?.to_string(),
            self.config.airtable_base_id.clone(),
            self.config.airtable_table_id.clone(),
        ))
    }

    pub async fn get_news(&self) -> Result<Vec<Story>> {
        let news_client = NewsClient::new(self.config.require_newsdata_key()?.to_string());
        let scorer = self.chat_model(&self.config.chat_deployment)?;

        let news = news_client
            .fetch_latest(
                &self.repository,
                &self.config.news_query,
                &self.config.news_language,
            )
            .await?;

        Ok(pipeline::process_stories(
            &self.repository,
            &scorer,
            news,
            self.config.relevance_threshold,
        )
        .await)
    }

    pub async fn sync_sitemap(&self) -> Result<String> {
        pipeline::sync_sitemap(
            &self.repository,
            &SiteCrawler::new(),
            &self.config.sitemap_url,
            self.config.sitemap_max_age_days,
        )
        .await
    }

    async fn match_news(&self, story_id: i64) -> Result<()> {
        let story = self
            .repository
            .get_story(story_id)
            .await?
            .ok_or_else(|| AppError::Other(anyhow::anyhow!("Story {} not found", story_id)))?;

        let matcher = self.chat_model(&self.config.chat_deployment)?;
        let writer = self.chat_model(&self.config.writer_deployment)?;
        let images = self.image_client()?;

        match pipeline::find_relevant_page_for_story(&self.repository, &matcher, &writer, &images, &story)
            .await?
        {
            Some(post) => {
                println!("Created post {} for \"{}\"", post.id, story.title);
                if let Some(content) = &post.content {
                    println!("\n{}", wrap(content));
                }
            }
            None => println!("No matching page for \"{}\"", story.title),
        }
        Ok(())
    }

    pub async fn generate_posts(&self) -> Result<usize> {
        let matcher = self.chat_model(&self.config.chat_deployment)?;
        let writer = self.chat_model(&self.config.writer_deployment)?;
        let images = self.image_client()?;
        pipeline::generate_post_for_all_stories(&self.repository, &matcher, &writer, &images).await
    }

    async fn scrape(&self, skip_crawl: bool) -> Result<()> {
        if !skip_crawl {
            let count = pipeline::crawl_llm_examples(
                &self.repository,
                &SiteCrawler::new(),
                &self.config.remixable_sitemap_url,
                &self.config.remixable_path_filter,
            )
            .await?;
            println!("{} remixables in database", count);
        }

        let writer = self.chat_model(&self.config.writer_deployment)?;
        let remixed = pipeline::generate_posts_for_all_remixables(&self.repository, &writer).await?;
        println!("Remixed {} case studies", remixed);
        Ok(())
    }

    async fn print_stories(&self, stories: &[Story]) -> Result<()> {
        if stories.is_empty() {
            println!("No stories on this page");
            return Ok(());
        }
        for story in stories {
            println!(
                "[{}] {}  {}  (score {})",
                story.id,
                story.pub_date.format("%Y-%m-%d %H:%M"),
                story.title,
                story.relevance_score
            );
            println!("    {}", story.link);

            let terms = self.repository.story_terms(story.id).await?;
            if !terms.keywords.is_empty() {
                println!("    keywords: {}", terms.keywords.join(", "));
            }
            if !terms.countries.is_empty() || !terms.categories.is_empty() {
                println!(
                    "    {} / {}",
                    terms.countries.join(", "),
                    terms.categories.join(", ")
                );
            }
        }
        Ok(())
    }

    async fn print_airtable_schema(&self) -> Result<()> {
        match pipeline::airtable_schema(&self.airtable()?).await? {
            Some(fields) => {
                println!("Table schema:");
                for (name, kind) in fields {
                    println!("- {}: {}", name, kind);
                }
            }
            None => println!("No records found in table"),
        }
        Ok(())
    }
}

fn page_offset(page: usize) -> i64 {
    (page.max(1) - 1) as i64 * PAGE_SIZE as i64
}

fn wrap(text: &str) -> String {
    textwrap::fill(text, textwrap::termwidth().min(100))
}

fn print_posts(posts: &[PostListing]) {
    if posts.is_empty() {
        println!("No posts on this page");
        return;
    }
    for listing in posts {
        println!(
            "#{} {}  {}",
            listing.post.id,
            listing.post.created_at.format("%Y-%m-%d %H:%M"),
            listing.story_title
        );
        println!("Page: {}", listing.page_url);
        if let Some(image) = &listing.post.image_url {
            println!("Image: {}", image);
        }
        if let Some(content) = &listing.post.content {
            println!("{}", wrap(content));
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(0), 0);
        assert_eq!(page_offset(1), 0);
        assert_eq!(page_offset(3), 40);
    }

    #[tokio::test]
    async fn test_commands_without_keys_fail_before_network() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config {
            db_path: dir.path().join("test.db").to_string_lossy().to_string(),
            newsdata_key: None,
            azure_openai_endpoint: None,
            azure_openai_api_key: None,
            airtable_api_key: None,
            ..Config::default()
        };
        let app = App::new(config).await.unwrap();

        assert!(matches!(app.get_news().await, Err(AppError::Config(_))));
        assert!(matches!(app.generate_posts().await, Err(AppError::Config(_))));
        assert!(matches!(app.run(Command::SyncAirtable).await, Err(AppError::Config(_))));
        assert!(app.run(Command::Stories { page: 1 }).await.is_ok());
    }
}

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection as SqliteConnection, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{
    NewPost, NewRemixable, NewSitemapUrl, NewSource, NewStory, PageCandidate, Post, PostListing,
    Remixable, RemixableImage, SitemapUrl, Source, Story,
};

use super::schema::SCHEMA;

const STORY_COLUMNS: &str = "id, article_id, title, description, link, pub_date, pub_date_tz, \
     image_url, video_url, language, duplicate, relevance_score, relevance_reason, source_id";

const SITEMAP_URL_COLUMNS: &str =
    "id, url, title, meta_desc, lastmod, content, created_at, updated_at";

const REMIXABLE_COLUMNS: &str =
    "id, url, title, markdown_content, is_video, remixed_as, created_at, updated_at";

/// Names linked to a story through the many-to-many tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoryTerms {
    pub keywords: Vec<String>,
    pub countries: Vec<String>,
    pub categories: Vec<String>,
}

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Source operations

    /// Get or create a source by its publisher id. Existing rows are left
    /// untouched. Returns the row and whether it was created.
    pub async fn get_or_create_source(&self, source: NewSource) -> Result<(Source, bool)> {
        let result = self
            .conn
            .call(move |conn| {
                let inserted = conn.execute(
                    r#"INSERT INTO sources (source_id, name, url, icon, priority)
                       VALUES (?1, ?2, ?3, ?4, ?5)
                       ON CONFLICT(source_id) DO NOTHING"#,
                    params![
                        source.source_id,
                        source.name,
                        source.url,
                        source.icon,
                        source.priority
                    ],
                )?;
                let row = conn.query_row(
                    "SELECT id, source_id, name, url, icon, priority FROM sources WHERE source_id = ?1",
                    params![source.source_id],
                    source_from_row,
                )?;
                Ok((row, inserted > 0))
            })
            .await?;
        Ok(result)
    }

    // Story operations

    /// Get or create a story by `article_id`. Keywords, countries and
    /// categories are linked only when the story is new.
    pub async fn get_or_create_story(
        &self,
        source_pk: i64,
        story: NewStory,
    ) -> Result<(Story, bool)> {
        let result = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let inserted = tx.execute(
                    r#"INSERT INTO stories (article_id, title, description, link, pub_date, pub_date_tz,
                                            image_url, video_url, language, duplicate,
                                            relevance_score, relevance_reason, source_id)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                       ON CONFLICT(article_id) DO NOTHING"#,
                    params![
                        story.article_id,
                        story.title,
                        story.description,
                        story.link,
                        story.pub_date.to_rfc3339(),
                        story.pub_date_tz,
                        story.image_url,
                        story.video_url,
                        story.language,
                        story.duplicate,
                        story.relevance_score,
                        story.relevance_reason,
                        source_pk,
                    ],
                )?;
                let row = tx.query_row(
                    &format!("SELECT {} FROM stories WHERE article_id = ?1", STORY_COLUMNS),
                    params![story.article_id],
                    story_from_row,
                )?;

                let created = inserted > 0;
                if created {
                    for name in story.keywords.iter().map(|k| k.trim()).filter(|k| !k.is_empty()) {
                        link_term(&tx, "keywords", "story_keywords", "keyword_id", row.id, name)?;
                    }
                    for name in &story.countries {
                        link_term(&tx, "countries", "story_countries", "country_id", row.id, name)?;
                    }
                    for name in &story.categories {
                        link_term(&tx, "categories", "story_categories", "category_id", row.id, name)?;
                    }
                }
                tx.commit()?;
                Ok((row, created))
            })
            .await?;
        Ok(result)
    }

    pub async fn get_story(&self, id: i64) -> Result<Option<Story>> {
        let story = self
            .conn
            .call(move |conn| {
                let story = conn
                    .query_row(
                        &format!("SELECT {} FROM stories WHERE id = ?1", STORY_COLUMNS),
                        params![id],
                        story_from_row,
                    )
                    .optional()?;
                Ok(story)
            })
            .await?;
        Ok(story)
    }

    pub async fn story_terms(&self, story_id: i64) -> Result<StoryTerms> {
        let terms = self
            .conn
            .call(move |conn| {
                Ok(StoryTerms {
                    keywords: linked_terms(conn, "keywords", "story_keywords", "keyword_id", story_id)?,
                    countries: linked_terms(conn, "countries", "story_countries", "country_id", story_id)?,
                    categories: linked_terms(conn, "categories", "story_categories", "category_id", story_id)?,
                })
            })
            .await?;
        Ok(terms)
    }

    /// Stories that have not been turned into a post yet, oldest first.
    pub async fn stories_without_post(&self) -> Result<Vec<Story>> {
        let stories = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(&format!(
                    r#"SELECT {} FROM stories s
                       WHERE NOT EXISTS (SELECT 1 FROM posts p WHERE p.story_id = s.id)
                       ORDER BY s.id"#,
                    STORY_COLUMNS
                ))?;
                let stories = stmt
                    .query_map([], story_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(stories)
            })
            .await?;
        Ok(stories)
    }

    /// Newest stories first.
    pub async fn list_stories(&self, limit: i64, offset: i64) -> Result<Vec<Story>> {
        let stories = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM stories ORDER BY pub_date DESC, id DESC LIMIT ?1 OFFSET ?2",
                    STORY_COLUMNS
                ))?;
                let stories = stmt
                    .query_map(params![limit, offset], story_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(stories)
            })
            .await?;
        Ok(stories)
    }

    // Sitemap operations

    /// Update-or-create a page by url. Returns the row id.
    pub async fn upsert_sitemap_url(&self, page: NewSitemapUrl) -> Result<i64> {
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO sitemap_urls (url, title, meta_desc, lastmod, content)
                       VALUES (?1, ?2, ?3, ?4, ?5)
                       ON CONFLICT(url) DO UPDATE SET
                           title = excluded.title,
                           meta_desc = excluded.meta_desc,
                           lastmod = excluded.lastmod,
                           content = excluded.content,
                           updated_at = datetime('now')"#,
                    params![
                        page.url,
                        page.title,
                        page.meta_desc,
                        page.lastmod.map(|dt| dt.to_rfc3339()),
                        page.content,
                    ],
                )?;
                let id = conn.query_row(
                    "SELECT id FROM sitemap_urls WHERE url = ?1",
                    params![page.url],
                    |row| row.get(0),
                )?;
                Ok(id)
            })
            .await?;
        Ok(id)
    }

    pub async fn get_sitemap_url(&self, id: i64) -> Result<Option<SitemapUrl>> {
        let page = self
            .conn
            .call(move |conn| {
                let page = conn
                    .query_row(
                        &format!("SELECT {} FROM sitemap_urls WHERE id = ?1", SITEMAP_URL_COLUMNS),
                        params![id],
                        sitemap_url_from_row,
                    )
                    .optional()?;
                Ok(page)
            })
            .await?;
        Ok(page)
    }

    pub async fn page_candidates(&self) -> Result<Vec<PageCandidate>> {
        let pages = self
            .conn
            .call(|conn| {
                let mut stmt =
                    conn.prepare("SELECT id, title, meta_desc FROM sitemap_urls ORDER BY id")?;
                let pages = stmt
                    .query_map([], |row| {
                        Ok(PageCandidate {
                            id: row.get(0)?,
                            title: row.get(1)?,
                            description: row.get(2)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(pages)
            })
            .await?;
        Ok(pages)
    }

    // Post operations

    pub async fn create_post(&self, post: NewPost) -> Result<Post> {
        let post = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO posts (sitemap_url_id, story_id, content, image_url) VALUES (?1, ?2, ?3, ?4)",
                    params![post.sitemap_url_id, post.story_id, post.content, post.image_url],
                )?;
                let id = conn.last_insert_rowid();
                let post = conn.query_row(
                    r#"SELECT id, story_id, sitemap_url_id, content, image_url, created_at, updated_at
                       FROM posts WHERE id = ?1"#,
                    params![id],
                    post_from_row,
                )?;
                Ok(post)
            })
            .await?;
        Ok(post)
    }

    /// Newest posts first, joined with their story and page.
    pub async fn list_posts(&self, limit: i64, offset: i64) -> Result<Vec<PostListing>> {
        let posts = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT p.id, p.story_id, p.sitemap_url_id, p.content, p.image_url,
                              p.created_at, p.updated_at, s.title, u.url
                       FROM posts p
                       JOIN stories s ON p.story_id = s.id
                       JOIN sitemap_urls u ON p.sitemap_url_id = u.id
                       ORDER BY p.created_at DESC, p.id DESC
                       LIMIT ?1 OFFSET ?2"#,
                )?;
                let posts = stmt
                    .query_map(params![limit, offset], |row| {
                        Ok(PostListing {
                            post: post_from_row(row)?,
                            story_title: row.get(7)?,
                            page_url: row.get(8)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(posts)
            })
            .await?;
        Ok(posts)
    }

    // Remixable operations

    pub async fn get_or_create_remixable(&self, remixable: NewRemixable) -> Result<(Remixable, bool)> {
        let result = self
            .conn
            .call(move |conn| {
                let inserted = conn.execute(
                    r#"INSERT INTO remixables (url, title, markdown_content, is_video, remixed_as)
                       VALUES (?1, ?2, ?3, ?4, ?5)
                       ON CONFLICT(url) DO NOTHING"#,
                    params![
                        remixable.url,
                        remixable.title,
                        remixable.markdown_content,
                        remixable.is_video,
                        remixable.remixed_as,
                    ],
                )?;
                let row = conn.query_row(
                    &format!("SELECT {} FROM remixables WHERE url = ?1", REMIXABLE_COLUMNS),
                    params![remixable.url],
                    remixable_from_row,
                )?;
                Ok((row, inserted > 0))
            })
            .await?;
        Ok(result)
    }

    pub async fn update_remixable(
        &self,
        id: i64,
        title: Option<String>,
        markdown_content: Option<String>,
        remixed_as: Option<String>,
    ) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"UPDATE remixables
                       SET title = ?1, markdown_content = ?2, remixed_as = ?3, updated_at = datetime('now')
                       WHERE id = ?4"#,
                    params![title, markdown_content, remixed_as, id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn set_remixed_as(&self, id: i64, remixed_as: String) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE remixables SET remixed_as = ?1, updated_at = datetime('now') WHERE id = ?2",
                    params![remixed_as, id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Returns true when the image was not attached yet.
    pub async fn add_remixable_image(&self, remixable_id: i64, image_url: String) -> Result<bool> {
        let inserted = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    "INSERT OR IGNORE INTO remixable_images (remixable_id, image_url) VALUES (?1, ?2)",
                    params![remixable_id, image_url],
                )?;
                Ok(n > 0)
            })
            .await?;
        Ok(inserted)
    }

    pub async fn remixable_images(&self, remixable_id: i64) -> Result<Vec<RemixableImage>> {
        let images = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT id, remixable_id, image_url, created_at FROM remixable_images
                       WHERE remixable_id = ?1 ORDER BY id"#,
                )?;
                let images = stmt
                    .query_map(params![remixable_id], |row| {
                        Ok(RemixableImage {
                            id: row.get(0)?,
                            remixable_id: row.get(1)?,
                            image_url: row.get(2)?,
                            created_at: timestamp(row, 3)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(images)
            })
            .await?;
        Ok(images)
    }

    /// Remixables with source content but no remixed post.
    pub async fn remixables_pending_remix(&self) -> Result<Vec<Remixable>> {
        self.query_remixables(
            r#"WHERE markdown_content IS NOT NULL AND markdown_content <> ''
               AND (remixed_as IS NULL OR remixed_as = '')"#,
        )
        .await
    }

    /// Remixables that have been rewritten and still carry their source content.
    pub async fn remixables_with_remix(&self) -> Result<Vec<Remixable>> {
        self.query_remixables(
            r#"WHERE remixed_as IS NOT NULL AND remixed_as <> ''
               AND markdown_content IS NOT NULL"#,
        )
        .await
    }

    async fn query_remixables(&self, filter: &'static str) -> Result<Vec<Remixable>> {
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM remixables {} ORDER BY id",
                    REMIXABLE_COLUMNS, filter
                ))?;
                let rows = stmt
                    .query_map([], remixable_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    pub async fn count_remixables(&self) -> Result<i64> {
        let count = self
            .conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM remixables", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count)
    }

    // Response cache

    pub async fn cached_response(&self, key: &str, max_age_secs: i64) -> Result<Option<String>> {
        let key = key.to_string();
        let body = self
            .conn
            .call(move |conn| {
                let body = conn
                    .query_row(
                        r#"SELECT body FROM http_cache
                           WHERE cache_key = ?1 AND fetched_at >= datetime('now', ?2)"#,
                        params![key, format!("-{} seconds", max_age_secs)],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(body)
            })
            .await?;
        Ok(body)
    }

    pub async fn store_response(&self, key: &str, body: String) -> Result<()> {
        let key = key.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO http_cache (cache_key, body) VALUES (?1, ?2)
                       ON CONFLICT(cache_key) DO UPDATE SET
                           body = excluded.body,
                           fetched_at = datetime('now')"#,
                    params![key, body],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

fn link_term(
    conn: &SqliteConnection,
    table: &str,
    join_table: &str,
    column: &str,
    story_id: i64,
    name: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        &format!("INSERT INTO {} (name) VALUES (?1) ON CONFLICT(name) DO NOTHING", table),
        params![name],
    )?;
    let term_id: i64 = conn.query_row(
        &format!("SELECT id FROM {} WHERE name = ?1", table),
        params![name],
        |row| row.get(0),
    )?;
    conn.execute(
        &format!("INSERT OR IGNORE INTO {} (story_id, {}) VALUES (?1, ?2)", join_table, column),
        params![story_id, term_id],
    )?;
    Ok(())
}

fn linked_terms(
    conn: &SqliteConnection,
    table: &str,
    join_table: &str,
    column: &str,
    story_id: i64,
) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT t.name FROM {t} t JOIN {j} j ON j.{c} = t.id WHERE j.story_id = ?1 ORDER BY t.name",
        t = table,
        j = join_table,
        c = column
    ))?;
    let names = stmt
        .query_map(params![story_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names)
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn timestamp(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    Ok(row
        .get::<_, String>(idx)
        .ok()
        .and_then(|s| parse_datetime(&s))
        .unwrap_or_else(Utc::now))
}

fn optional_timestamp(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    Ok(row
        .get::<_, Option<String>>(idx)?
        .and_then(|s| parse_datetime(&s)))
}

fn source_from_row(row: &Row) -> rusqlite::Result<Source> {
    Ok(Source {
        id: row.get(0)?,
        source_id: row.get(1)?,
        name: row.get(2)?,
        url: row.get(3)?,
        icon: row.get(4)?,
        priority: row.get(5)?,
    })
}

fn story_from_row(row: &Row) -> rusqlite::Result<Story> {
    Ok(Story {
        id: row.get(0)?,
        article_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        link: row.get(4)?,
        pub_date: timestamp(row, 5)?,
        pub_date_tz: row.get(6)?,
        image_url: row.get(7)?,
        video_url: row.get(8)?,
        language: row.get(9)?,
        duplicate: row.get::<_, i64>(10)? != 0,
        relevance_score: row.get(11)?,
        relevance_reason: row.get(12)?,
        source_id: row.get(13)?,
    })
}

fn sitemap_url_from_row(row: &Row) -> rusqlite::Result<SitemapUrl> {
    Ok(SitemapUrl {
        id: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        meta_desc: row.get(3)?,
        lastmod: optional_timestamp(row, 4)?,
        content: row.get(5)?,
        created_at: timestamp(row, 6)?,
        updated_at: timestamp(row, 7)?,
    })
}

fn post_from_row(row: &Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        story_id: row.get(1)?,
        sitemap_url_id: row.get(2)?,
        content: row.get(3)?,
        image_url: row.get(4)?,
        created_at: timestamp(row, 5)?,
        updated_at: timestamp(row, 6)?,
    })
}

fn remixable_from_row(row: &Row) -> rusqlite::Result<Remixable> {
    Ok(Remixable {
        id: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        markdown_content: row.get(3)?,
        is_video: row.get::<_, i64>(4)? != 0,
        remixed_as: row.get(5)?,
        created_at: timestamp(row, 6)?,
        updated_at: timestamp(row, 7)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    pub(crate) async fn test_repo() -> (Repository, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let repo = Repository::new(path.to_str().unwrap()).await.unwrap();
        (repo, dir)
    }

    pub(crate) fn new_source(source_id: &str) -> NewSource {
        NewSource {
            source_id: source_id.to_string(),
            name: format!("{} news", source_id),
            url: format!("https://{}.example.com", source_id),
            icon: None,
            priority: 1000,
        }
    }

    pub(crate) fn new_story(article_id: &str, day: u32) -> NewStory {
        NewStory {
            article_id: article_id.to_string(),
            title: format!("Story {}", article_id),
            description: Some("A model did a thing".to_string()),
            link: format!("https://news.example.com/{}", article_id),
            pub_date: Utc.with_ymd_and_hms(2024, 11, day, 9, 0, 0).unwrap(),
            pub_date_tz: "UTC".to_string(),
            image_url: None,
            video_url: None,
            language: "english".to_string(),
            duplicate: false,
            relevance_score: 85,
            relevance_reason: "Genuine research result".to_string(),
            keywords: vec![" llm ".to_string(), "robotics".to_string()],
            countries: vec!["germany".to_string()],
            categories: vec!["technology".to_string()],
        }
    }

    pub(crate) fn new_page(url: &str, title: &str) -> NewSitemapUrl {
        NewSitemapUrl {
            url: url.to_string(),
            title: Some(title.to_string()),
            meta_desc: Some(format!("About {}", title)),
            lastmod: None,
            content: Some(format!("{} body text", title)),
        }
    }

    #[tokio::test]
    async fn test_source_get_or_create_keeps_first_row() {
        let (repo, _dir) = test_repo().await;

        let (first, created) = repo.get_or_create_source(new_source("wired")).await.unwrap();
        assert!(created);

        let mut changed = new_source("wired");
        changed.name = "Renamed".to_string();
        let (second, created) = repo.get_or_create_source(changed).await.unwrap();

        assert!(!created);
        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "wired news");
    }

    #[tokio::test]
    async fn test_story_terms_linked_only_on_create() {
        let (repo, _dir) = test_repo().await;
        let (source, _) = repo.get_or_create_source(new_source("wired")).await.unwrap();

        let (story, created) = repo
            .get_or_create_story(source.id, new_story("a1", 3))
            .await
            .unwrap();
        assert!(created);

        let mut again = new_story("a1", 3);
        again.keywords = vec!["ignored".to_string()];
        let (same, created) = repo.get_or_create_story(source.id, again).await.unwrap();
        assert!(!created);
        assert_eq!(same.id, story.id);

        let terms = repo.story_terms(story.id).await.unwrap();
        assert_eq!(terms.keywords, vec!["llm", "robotics"]);
        assert_eq!(terms.countries, vec!["germany"]);
        assert_eq!(terms.categories, vec!["technology"]);
    }

    #[tokio::test]
    async fn test_terms_shared_between_stories() {
        let (repo, _dir) = test_repo().await;
        let (source, _) = repo.get_or_create_source(new_source("wired")).await.unwrap();

        let (a, _) = repo.get_or_create_story(source.id, new_story("a1", 3)).await.unwrap();
        let (b, _) = repo.get_or_create_story(source.id, new_story("a2", 4)).await.unwrap();

        let keyword_rows = repo
            .conn
            .call(|conn| {
                let n: i64 = conn.query_row("SELECT COUNT(*) FROM keywords", [], |r| r.get(0))?;
                Ok(n)
            })
            .await
            .unwrap();
        assert_eq!(keyword_rows, 2);
        assert_eq!(repo.story_terms(a.id).await.unwrap(), repo.story_terms(b.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_stories_without_post_and_listing_order() {
        let (repo, _dir) = test_repo().await;
        let (source, _) = repo.get_or_create_source(new_source("wired")).await.unwrap();
        let (older, _) = repo.get_or_create_story(source.id, new_story("old", 1)).await.unwrap();
        let (newer, _) = repo.get_or_create_story(source.id, new_story("new", 20)).await.unwrap();
        let page_id = repo
            .upsert_sitemap_url(new_page("https://site.example.com/a", "Data labeling"))
            .await
            .unwrap();

        repo.create_post(NewPost {
            story_id: older.id,
            sitemap_url_id: page_id,
            content: Some("post".to_string()),
            image_url: None,
        })
        .await
        .unwrap();

        let pending = repo.stories_without_post().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, newer.id);

        let listed = repo.list_stories(20, 0).await.unwrap();
        assert_eq!(listed[0].article_id, "new");
        assert_eq!(listed[1].article_id, "old");
        assert_eq!(repo.list_stories(20, 1).await.unwrap().len(), 1);

        let posts = repo.list_posts(20, 0).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].story_title, "Story old");
        assert_eq!(posts[0].page_url, "https://site.example.com/a");
    }

    #[tokio::test]
    async fn test_sitemap_upsert_updates_in_place() {
        let (repo, _dir) = test_repo().await;

        let id = repo
            .upsert_sitemap_url(new_page("https://site.example.com/a", "Old title"))
            .await
            .unwrap();
        let again = repo
            .upsert_sitemap_url(new_page("https://site.example.com/a", "New title"))
            .await
            .unwrap();
        assert_eq!(id, again);

        let page = repo.get_sitemap_url(id).await.unwrap().unwrap();
        assert_eq!(page.title.as_deref(), Some("New title"));

        let candidates = repo.page_candidates().await.unwrap();
        assert_eq!(
            candidates,
            vec![PageCandidate {
                id,
                title: Some("New title".to_string()),
                description: Some("About New title".to_string()),
            }]
        );
        assert!(repo.get_sitemap_url(id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_post_requires_existing_story() {
        let (repo, _dir) = test_repo().await;
        let page_id = repo
            .upsert_sitemap_url(new_page("https://site.example.com/a", "A"))
            .await
            .unwrap();

        let result = repo
            .create_post(NewPost {
                story_id: 999,
                sitemap_url_id: page_id,
                content: None,
                image_url: None,
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_remixable_lifecycle() {
        let (repo, _dir) = test_repo().await;

        let (remixable, created) = repo
            .get_or_create_remixable(NewRemixable {
                url: "https://example.com/case".to_string(),
                title: Some("Case".to_string()),
                markdown_content: Some("# Case".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(created);

        assert!(repo.add_remixable_image(remixable.id, "https://img/1.png".into()).await.unwrap());
        assert!(!repo.add_remixable_image(remixable.id, "https://img/1.png".into()).await.unwrap());
        assert_eq!(repo.remixable_images(remixable.id).await.unwrap().len(), 1);

        assert_eq!(repo.remixables_pending_remix().await.unwrap().len(), 1);
        assert!(repo.remixables_with_remix().await.unwrap().is_empty());

        repo.set_remixed_as(remixable.id, "Remixed post".to_string()).await.unwrap();

        assert!(repo.remixables_pending_remix().await.unwrap().is_empty());
        let done = repo.remixables_with_remix().await.unwrap();
        assert_eq!(done[0].remixed_as.as_deref(), Some("Remixed post"));
        assert_eq!(repo.count_remixables().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_response_cache() {
        let (repo, _dir) = test_repo().await;

        assert!(repo.cached_response("news:ai:en", 3600).await.unwrap().is_none());
        repo.store_response("news:ai:en", "{}".to_string()).await.unwrap();
        assert_eq!(
            repo.cached_response("news:ai:en", 3600).await.unwrap().as_deref(),
            Some("{}")
        );
        assert!(repo.cached_response("news:other:en", 3600).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_response_cache_expires() {
        let (repo, _dir) = test_repo().await;
        repo.store_response("news:ai:en", "{}".to_string()).await.unwrap();

        repo.conn
            .call(|conn| {
                conn.execute(
                    "UPDATE http_cache SET fetched_at = datetime('now', '-2 hours')",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        assert!(repo.cached_response("news:ai:en", 3600).await.unwrap().is_none());
        assert_eq!(
            repo.cached_response("news:ai:en", 3 * 3600).await.unwrap().as_deref(),
            Some("{}")
        );

        // storing again refreshes the timestamp
        repo.store_response("news:ai:en", "[]".to_string()).await.unwrap();
        assert_eq!(
            repo.cached_response("news:ai:en", 3600).await.unwrap().as_deref(),
            Some("[]")
        );
    }
}

//! The fetch → score → persist → match → generate steps. Each function runs
//! one step to completion; per-record failures are logged and skipped.

mod pages;
mod posts;
mod remixables;
mod stories;

pub use pages::sync_sitemap;
pub use posts::{find_relevant_page_for_story, generate_post_for_all_stories};
pub use remixables::{
    airtable_schema, crawl_llm_examples, generate_posts_for_all_remixables, sync_airtable_remixables,
    sync_remixables_to_airtable,
};
pub use stories::process_stories;

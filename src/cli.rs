use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Turn AI news into LinkedIn posts that point at pages of a website.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to config.toml (defaults to the user config directory)
    #[arg(short, long, env = "NEWSPOSTER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Fetch, score and store the latest news
    GetNews,
    /// Crawl recently changed sitemap pages into the database
    SyncSitemap,
    /// Match one stored story against the crawled pages and write a post
    MatchNews {
        /// Database id of the story
        story_id: i64,
    },
    /// Write posts for every story that doesn't have one yet
    GeneratePosts,
    /// get-news followed by generate-posts
    Run,
    /// Collect LLM case studies and remix them into posts
    Scrape {
        /// Only remix what is already stored
        #[arg(long)]
        skip_crawl: bool,
    },
    /// Import video records from Airtable
    SyncAirtable,
    /// Push remixed posts back to Airtable
    SyncToAirtable,
    /// Print the field names and types of the Airtable table
    AirtableSchema,
    /// List stored stories, newest first
    Stories {
        #[arg(short, long, default_value_t = 1)]
        page: usize,
    },
    /// List generated posts, newest first
    Posts {
        #[arg(short, long, default_value_t = 1)]
        page: usize,
    },
}

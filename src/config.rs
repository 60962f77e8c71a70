use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    pub newsdata_key: Option<String>,
    pub azure_openai_endpoint: Option<String>,
    pub azure_openai_api_key: Option<String>,
    pub airtable_api_key: Option<String>,

    /// Deployment used for scoring and matching.
    #[serde(default = "default_chat_deployment")]
    pub chat_deployment: String,

    /// Deployment used for writing post copy.
    #[serde(default = "default_writer_deployment")]
    pub writer_deployment: String,

    #[serde(default = "default_image_deployment")]
    pub image_deployment: String,

    #[serde(default = "default_news_query")]
    pub news_query: String,

    #[serde(default = "default_news_language")]
    pub news_language: String,

    #[serde(default = "default_relevance_threshold")]
    pub relevance_threshold: i64,

    #[serde(default = "default_sitemap_url")]
    pub sitemap_url: String,

    #[serde(default = "default_sitemap_max_age_days")]
    pub sitemap_max_age_days: i64,

    #[serde(default = "default_remixable_sitemap_url")]
    pub remixable_sitemap_url: String,

    #[serde(default = "default_remixable_path_filter")]
    pub remixable_path_filter: String,

    #[serde(default = "default_airtable_base_id")]
    pub airtable_base_id: String,

    #[serde(default = "default_airtable_table_id")]
    pub airtable_table_id: String,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("newsposter");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("newsposter.db").to_string_lossy().to_string()
}

fn default_chat_deployment() -> String {
    "gpt-4o-mini".to_string()
}

fn default_writer_deployment() -> String {
    "gpt4turbo".to_string()
}

fn default_image_deployment() -> String {
    "dall-e-3".to_string()
}

fn default_news_query() -> String {
    "artificial intelligence".to_string()
}

fn default_news_language() -> String {
    "en".to_string()
}

fn default_relevance_threshold() -> i64 {
    70
}

fn default_sitemap_url() -> String {
    "https://www.clickworker.com/sitemap_index.xml/".to_string()
}

fn default_sitemap_max_age_days() -> i64 {
    90
}

fn default_remixable_sitemap_url() -> String {
    "https://www.zenml.io/sitemap.xml".to_string()
}

fn default_remixable_path_filter() -> String {
    "llmops-database".to_string()
}

fn default_airtable_base_id() -> String {
    "app1qC1c10uiW1DRr".to_string()
}

fn default_airtable_table_id() -> String {
    "tbllQR6GmaJD579oS".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            newsdata_key: None,
            azure_openai_endpoint: None,
            azure_openai_api_key: None,
            airtable_api_key: None,
            chat_deployment: default_chat_deployment(),
            writer_deployment: default_writer_deployment(),
            image_deployment: default_image_deployment(),
            news_query: default_news_query(),
            news_language: default_news_language(),
            relevance_threshold: default_relevance_threshold(),
            sitemap_url: default_sitemap_url(),
            sitemap_max_age_days: default_sitemap_max_age_days(),
            remixable_sitemap_url: default_remixable_sitemap_url(),
            remixable_path_filter: default_remixable_path_filter(),
            airtable_base_id: default_airtable_base_id(),
            airtable_table_id: default_airtable_table_id(),
        }
    }
}

impl Config {
    /// Load the config file (creating it on first run), then apply `.env`
    /// and environment overrides for secrets.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = path.unwrap_or_else(Self::config_path);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            let config = Config::default();
            config.save_to(&config_path)?;
            config
        };

        dotenvy::dotenv().ok();
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("NEWSDATA_KEY") {
            self.newsdata_key = Some(v);
        }
        if let Some(v) = non_empty("AZURE_OPENAI_ENDPOINT") {
            self.azure_openai_endpoint = Some(v);
        }
        if let Some(v) = non_empty("AZURE_OPENAI_API_KEY") {
            self.azure_openai_api_key = Some(v);
        }
        if let Some(v) = non_empty("AZURE_OPENAI_DEPLOYMENT_NAME") {
            self.chat_deployment = v;
        }
        if let Some(v) = non_empty("AIRTABLE_API_KEY") {
            self.airtable_api_key = Some(v);
        }
    }

    pub fn save_to(&self, config_path: &std::path::Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("newsposter")
            .join("config.toml")
    }

    pub fn require_newsdata_key(&self) -> Result<&str> {
        require(&self.newsdata_key, "NEWSDATA_KEY")
    }

    pub fn require_azure(&self) -> Result<(&str, &str)> {
        let endpoint = require(&self.azure_openai_endpoint, "AZURE_OPENAI_ENDPOINT")?;
        let key = require(&self.azure_openai_api_key, "AZURE_OPENAI_API_KEY")?;
        Ok((endpoint, key))
    }

    pub fn require_airtable_key(&self) -> Result<&str> {
        require(&self.airtable_api_key, "AIRTABLE_API_KEY")
    }
}

fn require<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| AppError::Config(format!("{} is not set", name)))
}

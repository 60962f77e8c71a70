use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

const IMAGE_API_VERSION: &str = "2024-02-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const IMAGE_SIZE: &str = "1024x1024";

pub trait ImageGenerator {
    /// Generate one image and return its URL.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    prompt: &'a str,
    n: u32,
    size: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
}

/// Image generation against an Azure OpenAI DALL-E deployment.
pub struct AzureImageClient {
    client: Client,
    endpoint: String,
    api_key: String,
    deployment: String,
}

impl AzureImageClient {
    pub fn new(endpoint: &str, api_key: String, deployment: String) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            deployment,
        }
    }
}

impl ImageGenerator for AzureImageClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/openai/deployments/{}/images/generations?api-version={}",
            self.endpoint, self.deployment, IMAGE_API_VERSION
        );

        let response = self
            .client
            .post(url)
            .header("api-key", &self.api_key)
            .json(&ImageRequest {
                prompt,
                n: 1,
                size: IMAGE_SIZE,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AppError::ImageApi(format!("API error: {}", error_text)));
        }

        let images: ImageResponse = response.json().await?;

        images
            .data
            .into_iter()
            .find_map(|image| image.url)
            .ok_or_else(|| AppError::ImageApi("No image returned from API".to_string()))
    }
}

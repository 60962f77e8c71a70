use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

const AZURE_API_VERSION: &str = "2024-08-01-preview";

/// One chat completion: a system prompt, a user prompt and sampling knobs.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the model for a single JSON object.
    pub json: bool,
}

impl ChatRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: 0.3,
            max_tokens: 2000,
            json: false,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }
}

pub trait ChatModel {
    async fn complete(&self, request: ChatRequest) -> Result<String>;

    fn model_version(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
    n: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Chat completions against an Azure OpenAI deployment.
pub struct AzureOpenAi {
    client: Client,
    endpoint: String,
    api_key: String,
    deployment: String,
}

impl AzureOpenAi {
    pub fn new(endpoint: &str, api_key: String, deployment: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            deployment,
        }
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, AZURE_API_VERSION
        )
    }
}

impl ChatModel for AzureOpenAi {
    async fn complete(&self, request: ChatRequest) -> Result<String> {
        let body = CompletionRequest {
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: request.system,
                },
                Message {
                    role: "user".to_string(),
                    content: request.user,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            n: 1,
            response_format: request.json.then(|| ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        };

        let response = self
            .client
            .post(self.completions_url())
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(AppError::LlmApi(format!("{}: {}", status, error_text)));
        }

        let completion: CompletionResponse = response.json().await?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::LlmApi("Empty completion".to_string()))
    }

    fn model_version(&self) -> &str {
        &self.deployment
    }
}

/// Decode a model reply that should hold one JSON object. Tolerates code
/// fences and chatter around the object.
pub fn parse_json_reply<T: DeserializeOwned>(reply: &str) -> Result<T> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    let fence = FENCE.get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").ok());

    let body = fence
        .as_ref()
        .and_then(|re| re.captures(reply))
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str())
        .unwrap_or(reply)
        .trim();

    match serde_json::from_str(body) {
        Ok(value) => Ok(value),
        Err(e) => {
            let object = body
                .find('{')
                .zip(body.rfind('}'))
                .filter(|(start, end)| start < end)
                .map(|(start, end)| &body[start..=end]);
            match object {
                Some(object) => Ok(serde_json::from_str(object)?),
                None => Err(e.into()),
            }
        }
    }
}

/// Accepts `42`, `42.0` or `"42"` where the model was asked for an integer.
pub(crate) fn lenient_int<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Number {
        Int(i64),
        Float(f64),
        Text(String),
    }

    match Number::deserialize(deserializer)? {
        Number::Int(n) => Ok(n),
        Number::Float(f) => Ok(f.round() as i64),
        Number::Text(s) => s
            .trim()
            .parse::<f64>()
            .map(|f| f.round() as i64)
            .map_err(serde::de::Error::custom),
    }
}

//! Chat-completions client for an OpenAI-compatible extraction endpoint.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{parse, ExtractionClient, ExtractionError};
use crate::config::ExtractionConfig;
use crate::sanitize::excerpt;
use crate::secrets::SecretSource;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

const PROMPT: &str = r#"Read the text below, extracted from an employee's CV and certificates, and list the skills it mentions.

Respond with a single JSON object and nothing else, in this shape:
{"skills": [{"name": "<skill>", "category": "<category>", "level": "<optional proficiency>", "certified": <true if a certificate proves it>}]}

Use short categories such as "Technical", "Soft Skills", "Programming" or "Languages".

Text:
"#;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct HttpExtractionClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: SecretString,
    timeout_secs: u64,
    max_retries: u32,
}

impl HttpExtractionClient {
    /// Builds a client from config, resolving the API key from its
    /// configured source.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ExtractionError> {
        let api_key = SecretSource::from(config).resolve()?;
        Self::new(config, api_key)
    }

    pub fn new(config: &ExtractionConfig, api_key: SecretString) -> Result<Self, ExtractionError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExtractionError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
        })
    }

    fn send_once(&self, request: &ChatRequest<'_>) -> Result<String, ExtractionError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(request)
            .send()
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ExtractionError::Status {
                code: status.as_u16(),
                body: excerpt(&body, 200),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| ExtractionError::Unparsable(format!("chat response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ExtractionError::EmptyResponse)
    }

    fn transport_error(&self, err: reqwest::Error) -> ExtractionError {
        if err.is_timeout() {
            ExtractionError::Timeout {
                secs: self.timeout_secs,
            }
        } else if err.is_connect() {
            ExtractionError::Connect(err.to_string())
        } else {
            ExtractionError::Transport(err.to_string())
        }
    }
}

impl ExtractionClient for HttpExtractionClient {
    fn extract(&self, corpus: &str) -> Result<Value, ExtractionError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: format!("{}{}", PROMPT, corpus),
            }],
            temperature: 0.1,
        };

        let content = with_retries(self.max_retries, || self.send_once(&request))?;
        log::debug!("Extraction response: {}", excerpt(&content, 300));
        parse::extract_json_payload(&content)
    }
}

/// Runs `attempt` once, then up to `max_retries` more times while it fails
/// transiently, doubling the pause between attempts.
fn with_retries<T, F>(max_retries: u32, mut attempt: F) -> Result<T, ExtractionError>
where
    F: FnMut() -> Result<T, ExtractionError>,
{
    let mut backoff = INITIAL_BACKOFF;
    let mut tries = 0;
    loop {
        match attempt() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && tries < max_retries => {
                tries += 1;
                log::warn!(
                    "Extraction attempt {} failed ({}), retrying in {:?}",
                    tries,
                    e,
                    backoff
                );
                std::thread::sleep(backoff);
                backoff *= 2;
            }
            Err(e) => return Err(e),
        }
    }
}

//! Text-completion seam. The model is strictly a text translator; every
//! decision that matters (validation, routing guards, preconditions) is
//! made deterministically by the orchestrator.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use terraloom_core::config::LlmConfig;

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("llm returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("llm response contained no candidate text")]
    EmptyResponse,
    #[error("llm api key is not configured")]
    MissingApiKey,
}

/// Gemini `generateContent` client. One request per completion, no
/// streaming, no retries; the configured timeout bounds every call.
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: SecretString,
}

impl GeminiClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key.clone().ok_or(LlmError::MissingApiKey)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part { text: prompt.to_string() }],
            }],
            generation_config: GenerationConfig { temperature: 0.1 },
        };

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(LlmError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status: status.as_u16(), body }.into());
        }

        let parsed: GenerateContentResponse =
            response.json().await.map_err(LlmError::Transport)?;
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .ok_or(LlmError::EmptyResponse)?;

        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

pub mod scripted {
    //! Deterministic `LlmClient` double used by pipeline and router tests.

    use std::collections::VecDeque;

    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::LlmClient;

    /// Replays a fixed queue of responses; completing past the end of the
    /// script is a test failure surfaced as an error.
    #[derive(Default)]
    pub struct ScriptedLlm {
        responses: Mutex<VecDeque<Result<String, String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn push_response(&self, response: impl Into<String>) {
            self.responses.lock().await.push_back(Ok(response.into()));
        }

        pub async fn push_error(&self, message: impl Into<String>) {
            self.responses.lock().await.push_back(Err(message.into()));
        }

        /// Prompts seen so far, in call order.
        pub async fn prompts(&self) -> Vec<String> {
            self.prompts.lock().await.clone()
        }

        pub async fn calls(&self) -> usize {
            self.prompts.lock().await.len()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().await.push(prompt.to_string());
            match self.responses.lock().await.pop_front() {
                Some(Ok(response)) => Ok(response),
                Some(Err(message)) => bail!("{message}"),
                None => bail!("scripted llm exhausted (unexpected completion call)"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use terraloom_core::config::LlmConfig;

    use super::{scripted::ScriptedLlm, GeminiClient, LlmClient, LlmError};

    fn config(api_key: Option<SecretString>) -> LlmConfig {
        LlmConfig {
            api_key,
            base_url: "https://generativelanguage.googleapis.com/".to_string(),
            model: "gemini-1.5-flash".to_string(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn missing_api_key_is_a_construction_error() {
        let result = GeminiClient::from_config(&config(None));
        assert!(matches!(result, Err(LlmError::MissingApiKey)));
    }

    #[test]
    fn endpoint_joins_base_url_without_double_slash() {
        let client =
            GeminiClient::from_config(&config(Some("k".into()))).expect("client");
        assert_eq!(
            client.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn scripted_llm_replays_in_order_and_records_prompts() {
        let llm = ScriptedLlm::new();
        llm.push_response("first").await;
        llm.push_error("boom").await;

        assert_eq!(llm.complete("p1").await.expect("first"), "first");
        assert!(llm.complete("p2").await.is_err());
        assert!(llm.complete("p3").await.is_err());
        assert_eq!(llm.prompts().await, vec!["p1", "p2", "p3"]);
    }
}

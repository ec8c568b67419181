//! Refinement engine for any OpenAI-compatible chat-completions endpoint.
//!
//! [`ApiRefiner`] posts to `{base_url}/v1/chat/completions` — Ollama (OpenAI
//! mode), OpenAI, Groq, LM Studio, vLLM, anything speaking that wire format.
//! All connection details come from [`RefinementConfig`]; nothing is
//! hardcoded.  The instruction prompt arrives per call from the
//! orchestrator, so a settings change applies to the next gesture without
//! rebuilding the engine.

use async_trait::async_trait;

use crate::config::RefinementConfig;

use super::{RefineError, RefinementEngine};

impl From<reqwest::Error> for RefineError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RefineError::Timeout
        } else {
            RefineError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// ApiRefiner
// ---------------------------------------------------------------------------

/// Calls an OpenAI-compatible chat-completions endpoint to clean up a raw
/// transcript.
pub struct ApiRefiner {
    client: reqwest::Client,
    config: RefinementConfig,
}

impl ApiRefiner {
    /// Build an `ApiRefiner` from refinement settings.
    ///
    /// The HTTP client carries the per-request timeout from
    /// `config.timeout_secs` — the engine's own ceiling, independent of the
    /// stage timeout the orchestrator races against it.
    pub fn from_config(config: &RefinementConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }
}

#[async_trait]
impl RefinementEngine for ApiRefiner {
    /// Send `text` to the configured endpoint with `instruction` as the
    /// system message.
    ///
    /// The `Authorization: Bearer …` header is attached only when
    /// `config.api_key` is a non-empty string — local providers like Ollama
    /// need no authentication.
    async fn refine(&self, text: &str, instruction: &str) -> Result<String, RefineError> {
        let url = format!("{}/v1/chat/completions", self.config.base_url);

        let body = serde_json::json!({
            "model":       self.config.model,
            "messages": [
                { "role": "system", "content": instruction },
                { "role": "user",   "content": text        }
            ],
            "stream":      false,
            "temperature": self.config.temperature,
            "max_tokens":  1024
        });

        let mut req = self.client.post(&url).json(&body);

        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RefineError::Parse(e.to_string()))?;

        let refined = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(RefineError::EmptyResponse)?
            .trim()
            .to_string();

        if refined.is_empty() {
            return Err(RefineError::EmptyResponse);
        }

        Ok(refined)
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

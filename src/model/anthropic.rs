//! Anthropic Messages API backend.
//!
//! Blocking client: every pipeline runs on its own rayon worker and a model
//! call is one of the two places a pipeline waits (the other is the renderer
//! subprocess). A per-request timeout is applied when configured.

use super::backend::{ModelBackend, ModelError, ModelRequest};
use crate::config::ModelConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_VERSION: &str = "2023-06-01";

pub struct AnthropicBackend {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl AnthropicBackend {
    /// Build a backend from config, reading the API key from the configured
    /// environment variable.
    pub fn from_config(config: &ModelConfig) -> Result<Self, ModelError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ModelError::MissingApiKey(config.api_key_env.clone()))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &ModelConfig, api_key: String) -> Result<Self, ModelError> {
        let mut builder = reqwest::blocking::Client::builder();
        // reqwest's blocking client defaults to a 30s timeout; code generation
        // routinely takes longer, so 0 really means "none".
        builder = if config.timeout_secs > 0 {
            builder.timeout(Duration::from_secs(config.timeout_secs))
        } else {
            builder.timeout(None::<Duration>)
        };
        Ok(Self {
            client: builder.build()?,
            api_key,
            model: config.model.clone(),
            endpoint: format!("{}/v1/messages", config.base_url.trim_end_matches('/')),
        })
    }
}

impl ModelBackend for AnthropicBackend {
    #[tracing::instrument(skip_all, fields(model = %self.model, max_tokens = request.max_tokens))]
    fn complete(&self, request: &ModelRequest) -> Result<String, ModelError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: &request.system,
            messages: [Message {
                role: "user",
                content: &request.user,
            }],
        };

        tracing::debug!(user = %request.user, "model request");
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()?;

        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(ModelError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: MessagesResponse = serde_json::from_str(&text)
            .map_err(|e| ModelError::MalformedResponse(e.to_string()))?;
        collect_text(parsed)
    }
}

/// Concatenate the text blocks of a reply.
fn collect_text(response: MessagesResponse) -> Result<String, ModelError> {
    let text: String = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .map(|block| block.text)
        .collect();
    if text.is_empty() {
        return Err(ModelError::MalformedResponse(
            "response contained no text blocks".into(),
        ));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let body = MessagesRequest {
            model: "m",
            max_tokens: 10,
            temperature: 0.5,
            system: "sys",
            messages: [Message {
                role: "user",
                content: "hello",
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["system"], "sys");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hello");
        assert_eq!(json["max_tokens"], 10);
    }

    #[test]
    fn collect_text_joins_text_blocks() {
        let response: MessagesResponse = serde_json::from_str(
            r#"{"content": [
                {"type": "text", "text": "from manim "},
                {"type": "tool_use", "id": "x"},
                {"type": "text", "text": "import *"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(collect_text(response).unwrap(), "from manim import *");
    }

    #[test]
    fn collect_text_empty_is_malformed() {
        let response: MessagesResponse = serde_json::from_str(r#"{"content": []}"#).unwrap();
        assert!(matches!(
            collect_text(response),
            Err(ModelError::MalformedResponse(_))
        ));
    }

    #[test]
    fn missing_key_reported_with_variable_name() {
        let config = ModelConfig {
            api_key_env: "EXPLAINER_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..Default::default()
        };
        let err = AnthropicBackend::from_config(&config).err().unwrap();
        assert!(err.to_string().contains("EXPLAINER_TEST_KEY_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let config = ModelConfig {
            base_url: "http://localhost:9999/".into(),
            ..Default::default()
        };
        let backend = AnthropicBackend::with_api_key(&config, "k".into()).unwrap();
        assert_eq!(backend.endpoint, "http://localhost:9999/v1/messages");
    }
}

use crate::config::Settings;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::{ChatClient, ChatMessage, ChatRequest};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const USER_AGENT: &str = concat!("finhub/", env!("CARGO_PKG_VERSION"));
const HTML_MARKER: &str = "<!DOCTYPE html>";

/// Client for any endpoint speaking the OpenAI chat-completions protocol.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_openai_api_key()?.to_string();
        Self::new(
            api_key,
            &settings.api_base_url,
            settings.ai_model.clone(),
            settings.llm_timeout,
        )
    }

    pub fn new(
        api_key: String,
        base_url: &str,
        model: String,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url: normalize_base_url(base_url),
            model,
        })
    }

    fn headers(&self) -> anyhow::Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .context("OPENAI_API_KEY is not a valid header value")?,
        );
        Ok(headers)
    }

    fn diagnostics(
        &self,
        stage: &'static str,
        status: Option<u16>,
        detail: String,
        raw_output: Option<String>,
    ) -> LlmDiagnosticsError {
        let raw_response_json = raw_output
            .as_deref()
            .and_then(|text| serde_json::from_str::<serde_json::Value>(text).ok());
        LlmDiagnosticsError {
            model: self.model.clone(),
            stage,
            status,
            detail,
            raw_output,
            raw_response_json,
        }
    }

    async fn create_completion(
        &self,
        req: CreateCompletionRequest<'_>,
    ) -> anyhow::Result<CreateCompletionResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let res = self
            .http
            .post(url)
            .headers(self.headers()?)
            .json(&req)
            .send()
            .await
            .context("chat completion request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read chat completion response body")?;
        if !status.is_success() {
            let detail = if text.contains(HTML_MARKER) {
                format!("status={status}; blocked by an HTML interstitial; check API_BASE_URL")
            } else {
                let preview: String = text.chars().take(80).collect();
                format!("status={status}: {preview}")
            };
            return Err(self
                .diagnostics("http", Some(status.as_u16()), detail, Some(text))
                .into());
        }

        serde_json::from_str::<CreateCompletionResponse>(&text).map_err(|err| {
            anyhow::Error::from(self.diagnostics(
                "decode",
                Some(status.as_u16()),
                err.to_string(),
                Some(text),
            ))
        })
    }
}

#[async_trait::async_trait]
impl ChatClient for OpenAiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, req: ChatRequest) -> anyhow::Result<String> {
        let body = CreateCompletionRequest {
            model: &self.model,
            messages: &req.messages,
            temperature: req.temperature,
            response_format: req.json_object.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let res = self.create_completion(body).await?;
        res.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| {
                anyhow::Error::from(self.diagnostics(
                    "content",
                    None,
                    "response has no message content".to_string(),
                    None,
                ))
            })
    }
}

/// Trims trailing slashes and appends `/v1` when the base carries no version segment.
pub fn normalize_base_url(base_url: &str) -> String {
    let mut base = base_url.trim().trim_end_matches('/').to_string();
    if !base.contains("/v1") {
        base.push_str("/v1");
    }
    base
}

#[derive(Debug, Serialize)]
struct CreateCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct CreateCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

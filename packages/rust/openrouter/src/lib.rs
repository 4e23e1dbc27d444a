//! [`ModelTransport`] over the OpenRouter chat-completions API.
//!
//! Every call is a single user message whose content is an ordered list of
//! parts: the stage instructions first, then the document content. Media parts
//! are read from disk and inlined as base64 data URLs (`image_url` parts for
//! images, `file` parts for PDFs).
//!
//! Failures are classified for the caller's retry policy:
//! - 408, 429, 5xx, timeouts and connection errors → [`DocSkillError::Transient`]
//! - 401 → [`DocSkillError::Config`] (bad credential)
//! - other 4xx and `content_filter` finishes → [`DocSkillError::ContentRejected`]

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use docskill_shared::{
    AppConfig, ContentPart, DocSkillError, MediaRef, ModelTransport, PromptSpec, Result,
    resolve_api_key,
};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("docskill/", env!("CARGO_PKG_VERSION"));

/// Attribution headers OpenRouter shows on its dashboard.
const APP_TITLE: &str = "docskill";
const APP_REFERER: &str = "https://github.com/docskill/docskill";

/// Longest error body excerpt carried into an error message.
const MAX_ERROR_BODY_CHARS: usize = 500;

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<WirePart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WirePart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
    File { file: FileData },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct FileData {
    filename: String,
    file_data: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<ApiError>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ResponseMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// OpenRouter client. Cheap to share behind an `Arc`; the inner
/// `reqwest::Client` pools connections.
#[derive(Debug, Clone)]
pub struct OpenRouterTransport {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenRouterTransport {
    /// Build a transport for `model` against `base_url` (e.g. `https://openrouter.ai/api/v1`).
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| DocSkillError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Build from the app config, resolving the API key from its env var.
    ///
    /// `model_override` takes precedence over `openrouter.default_model`.
    pub fn from_config(config: &AppConfig, model_override: Option<&str>) -> Result<Self> {
        let api_key = resolve_api_key(config)?;
        let model = model_override.unwrap_or(&config.openrouter.default_model);
        Self::new(
            &config.openrouter.base_url,
            api_key,
            model,
            Duration::from_secs(config.openrouter.request_timeout_secs),
        )
    }

    /// Turn prompt + content into wire parts, inlining media files.
    async fn build_parts(&self, prompt: &PromptSpec, content: &[ContentPart]) -> Result<Vec<WirePart>> {
        let mut parts = Vec::with_capacity(content.len() + 1);
        parts.push(WirePart::Text {
            text: prompt.instructions.clone(),
        });

        for part in content {
            match part {
                ContentPart::Text { text } => parts.push(WirePart::Text { text: text.clone() }),
                ContentPart::Media { media } => parts.push(encode_media(media).await?),
            }
        }

        Ok(parts)
    }
}

#[async_trait]
impl ModelTransport for OpenRouterTransport {
    fn model_id(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(stage = %prompt.stage, model = %self.model))]
    async fn invoke(&self, prompt: &PromptSpec, content: &[ContentPart]) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: self.build_parts(prompt, content).await?,
            }],
        };

        let start = Instant::now();

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", APP_REFERER)
            .header("X-Title", APP_TITLE)
            .json(&request)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "OpenRouter returned an error status");
            return Err(classify_status(status, &body));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| DocSkillError::transient(format!("failed to decode response body: {e}")))?;

        if let Some(err) = body.error {
            let status = err
                .code
                .and_then(|c| StatusCode::from_u16(c).ok())
                .unwrap_or(StatusCode::BAD_GATEWAY);
            return Err(classify_status(status, &err.message));
        }

        if let Some(usage) = &body.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "token usage"
            );
        }

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| DocSkillError::transient("response contained no choices"))?;

        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(DocSkillError::rejected("response blocked by content filter"));
        }

        let text = choice
            .message
            .and_then(|m| m.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| DocSkillError::transient("response content was empty"))?;

        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            response_chars = text.len(),
            "model call complete"
        );

        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Read a media file and wrap it as a base64 data-URL part.
async fn encode_media(media: &MediaRef) -> Result<WirePart> {
    let bytes = tokio::fs::read(&media.path)
        .await
        .map_err(|e| DocSkillError::io(&media.path, e))?;
    let data_url = format!("data:{};base64,{}", media.mime_type, BASE64.encode(&bytes));

    if media.mime_type == "application/pdf" {
        let filename = media
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());
        Ok(WirePart::File {
            file: FileData {
                filename,
                file_data: data_url,
            },
        })
    } else {
        Ok(WirePart::ImageUrl {
            image_url: ImageUrl { url: data_url },
        })
    }
}

fn classify_send_error(e: reqwest::Error) -> DocSkillError {
    if e.is_timeout() {
        DocSkillError::transient(format!("request timed out: {e}"))
    } else if e.is_connect() {
        DocSkillError::transient(format!("connection failed: {e}"))
    } else {
        DocSkillError::transient(format!("request failed: {e}"))
    }
}

/// Map an HTTP status (and body excerpt) onto the failure taxonomy.
fn classify_status(status: StatusCode, body: &str) -> DocSkillError {
    let excerpt: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    let message = format!("HTTP {status}: {excerpt}");

    match status.as_u16() {
        401 => DocSkillError::config(format!("OpenRouter rejected the API key ({message})")),
        408 | 429 => DocSkillError::transient(message),
        s if s >= 500 => DocSkillError::transient(message),
        _ => DocSkillError::rejected(message),
    }
}

use log::debug;
use serde_json::{Value, json};

use crate::error::TailorError;
use crate::utils::config::{LlmMode, Settings};
use crate::utils::response::{GENERIC_LLM_TEXT_RULES, first_text};

const CHAT_COMPLETIONS: &str = "/chat/completions";
const TEMPERATURE: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    ExtractJob,
    Tailor,
}

impl Task {
    pub fn as_str(self) -> &'static str {
        match self {
            Task::ExtractJob => "extract",
            Task::Tailor => "tailor",
        }
    }
}

/// Everything a caller may need for one completion. Chat-style callers use
/// `system` and `prompt`; the generic caller posts `payload` as-is.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub task: Task,
    pub system: String,
    pub prompt: String,
    pub payload: Value,
}

/// One single-attempt LLM round trip returning the raw response text.
#[allow(async_fn_in_trait)]
pub trait LlmCaller {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, TailorError>;
}

/// OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiCaller {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl OpenAiCaller {
    pub fn new(settings: &Settings) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: settings.llm_endpoint.trim().to_string(),
            model: settings.llm_model.trim().to_string(),
            api_key: settings.llm_api_key.trim().to_string(),
        }
    }

    fn url(&self) -> String {
        let endpoint = self.endpoint.trim_end_matches('/');
        match endpoint.ends_with(CHAT_COMPLETIONS) {
            true => endpoint.to_string(),
            false => format!("{endpoint}{CHAT_COMPLETIONS}"),
        }
    }
}

impl LlmCaller for OpenAiCaller {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, TailorError> {
        if self.api_key.is_empty() {
            return Err(TailorError::InputValidation("llm_api_key is not set".to_string()));
        }

        let body = json!({
            "model": self.model,
            "temperature": TEMPERATURE,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.prompt },
            ],
        });

        let url = self.url();
        debug!("calling {} (model: {}, prompt: {} chars)", url, self.model, request.prompt.len());

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(TailorError::UpstreamCall {
                service: "openai",
                status: Some(status.as_u16()),
                message: error_message(&text),
            });
        }

        let body: Value = serde_json::from_str(&text)
            .map_err(|e| TailorError::upstream("openai", format!("malformed response body: {e}")))?;

        body.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .filter(|content| !content.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| TailorError::upstream("openai", "response contained no message content"))
    }
}

/// Endpoint that takes the task payload as JSON and answers with text in
/// one of several known shapes.
pub struct GenericCaller {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GenericCaller {
    pub fn new(settings: &Settings) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: settings.llm_endpoint.trim().to_string(),
            api_key: settings.llm_api_key.trim().to_string(),
        }
    }
}

impl LlmCaller for GenericCaller {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, TailorError> {
        if self.endpoint.is_empty() {
            return Err(TailorError::InputValidation("llm_endpoint is not set".to_string()));
        }

        debug!("calling generic endpoint {} (task: {})", self.endpoint, request.task.as_str());

        let mut builder = self.client.post(&self.endpoint).json(&request.payload);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(TailorError::UpstreamCall {
                service: "llm",
                status: Some(status.as_u16()),
                message: error_message(&text),
            });
        }

        generic_response_text(&text)
    }
}

/// Text of a generic endpoint response: the JSON shape rules first, the raw
/// body when it is not JSON at all.
pub fn generic_response_text(body: &str) -> Result<String, TailorError> {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => first_text(&value, GENERIC_LLM_TEXT_RULES)
            .ok_or_else(|| TailorError::Parse("no text field in llm response".to_string())),
        Err(_) if !body.trim().is_empty() => Ok(body.to_string()),
        Err(_) => Err(TailorError::upstream("llm", "empty response body")),
    }
}

/// `error.message` of an error body when present, else the body itself.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .or_else(|| value.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// The configured HTTP caller, picked once from `llm_mode`.
pub enum HttpCaller {
    OpenAi(OpenAiCaller),
    Generic(GenericCaller),
}

impl HttpCaller {
    pub fn from_settings(settings: &Settings) -> Self {
        match settings.llm_mode {
            LlmMode::OpenAi => HttpCaller::OpenAi(OpenAiCaller::new(settings)),
            LlmMode::Generic => HttpCaller::Generic(GenericCaller::new(settings)),
        }
    }
}

impl LlmCaller for HttpCaller {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, TailorError> {
        match self {
            HttpCaller::OpenAi(caller) => caller.complete(request).await,
            HttpCaller::Generic(caller) => caller.complete(request).await,
        }
    }
}

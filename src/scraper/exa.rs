use log::{debug, info};
use serde_json::{Value, json};

use crate::error::TailorError;
use crate::scraper::job::validate_url;
use crate::utils::response::{EXA_TEXT_RULES, first_text};

const EXA_CONTENTS_URL: &str = "https://api.exa.ai/contents";

/// Deep page-content extraction through Exa. There is no fallback: any
/// failure here is reported to the user as is.
pub struct ExaClient {
    client: reqwest::Client,
    endpoint: String,
}

impl Default for ExaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ExaClient {
    pub fn new() -> Self {
        Self::with_endpoint(EXA_CONTENTS_URL)
    }

    pub fn with_endpoint(endpoint: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
        }
    }

    pub async fn fetch_contents(&self, url: &str, api_key: &str) -> Result<String, TailorError> {
        if api_key.trim().is_empty() {
            return Err(TailorError::InputValidation("exa_api_key is not set".to_string()));
        }
        let url = validate_url(url)?;

        info!("fetching page contents through exa");
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", api_key.trim())
            .json(&json!({ "urls": [url.as_str()], "text": true }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(TailorError::UpstreamCall {
                service: "exa",
                status: Some(status.as_u16()),
                message: body.trim().to_string(),
            });
        }

        let text = contents_text(&body)?;
        debug!("exa returned {} chars", text.len());
        Ok(text)
    }
}

pub fn contents_text(body: &str) -> Result<String, TailorError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| TailorError::upstream("exa", format!("malformed response body: {e}")))?;

    first_text(&value, EXA_TEXT_RULES)
        .ok_or_else(|| TailorError::upstream("exa", "no text extracted from page"))
}

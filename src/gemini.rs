use std::time::Duration;

use anyhow::Context as _;

use crate::llm::{ContentError, SummarizeError};

pub fn generate_content_endpoint(base_url: &str, model: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/models/{model}:generateContent")
}

#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(
        api_key: String,
        model: String,
        base_url: String,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build Gemini http client")?;
        Ok(Self {
            endpoint: generate_content_endpoint(&base_url, &model),
            http,
            api_key,
            model,
        })
    }

    pub async fn generate(
        &self,
        prompt: &str,
        schema: &serde_json::Value,
    ) -> Result<String, SummarizeError> {
        let body = serde_json::json!({
            "contents": [
                { "role": "user", "parts": [{ "text": prompt }] }
            ],
            "generationConfig": {
                "temperature": 0.3,
                "topP": 0.95,
                "maxOutputTokens": 1024,
                "responseMimeType": "application/json",
                "responseSchema": schema,
            },
        });

        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {}", self.endpoint))?;

        let status = response.status();
        let raw = response.text().await.context("read Gemini response body")?;
        if !status.is_success() {
            let message = parse_error_message(&raw).unwrap_or_else(|| raw.clone());
            return Err(anyhow::anyhow!("Gemini API error ({status}): {message}").into());
        }

        let value: serde_json::Value =
            serde_json::from_str(&raw).context("parse Gemini response")?;
        Ok(extract_text(value)?)
    }
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    let message = value.get("error")?.get("message")?.as_str()?.to_owned();
    Some(message)
}

/// First non-empty text part across all candidates.
pub fn extract_text(payload: serde_json::Value) -> Result<String, ContentError> {
    let candidates = payload
        .get("candidates")
        .and_then(|v| v.as_array())
        .filter(|candidates| !candidates.is_empty());
    let Some(candidates) = candidates else {
        return Err(ContentError::new("Gemini returned no candidates", payload));
    };

    let text = candidates
        .iter()
        .filter_map(|candidate| candidate.pointer("/content/parts")?.as_array())
        .flatten()
        .filter_map(|part| part.get("text")?.as_str())
        .find(|text| !text.is_empty());
    if let Some(text) = text {
        return Ok(text.to_owned());
    }

    let mut details = Vec::new();
    if let Some(reason) = candidates[0].get("finishReason").and_then(|v| v.as_str()) {
        details.push(format!("finishReason={reason}"));
    }
    if let Some(reason) = payload
        .pointer("/promptFeedback/blockReason")
        .and_then(|v| v.as_str())
    {
        details.push(format!("blockReason={reason}"));
    }
    let mut message = "Gemini response had no text part".to_owned();
    if !details.is_empty() {
        message = format!("{message} ({})", details.join(", "));
    }
    Err(ContentError::new(message, payload))
}

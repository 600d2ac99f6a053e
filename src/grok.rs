use std::time::Duration;

use anyhow::Context as _;

use crate::llm::{ContentError, SummarizeError};

const SYSTEM_PROMPT: &str = "You convert crawl data into concise, actionable website summaries. \
Respond strictly with JSON.";

pub fn chat_completions_endpoint(base_url: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/chat/completions")
}

/// xAI chat completions client.
#[derive(Clone)]
pub struct GrokClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl std::fmt::Debug for GrokClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrokClient")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl GrokClient {
    pub fn new(
        api_key: String,
        model: String,
        base_url: String,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build Grok http client")?;
        Ok(Self {
            endpoint: chat_completions_endpoint(&base_url),
            http,
            api_key,
            model,
        })
    }

    pub async fn complete(
        &self,
        prompt: &str,
        schema: &serde_json::Value,
    ) -> Result<String, SummarizeError> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0.2,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": { "name": "website_report", "schema": schema },
            },
        });

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {}", self.endpoint))?;

        let status = response.status();
        let raw = response.text().await.context("read Grok response body")?;
        if !status.is_success() {
            let message = parse_error_message(&raw).unwrap_or_else(|| raw.clone());
            return Err(anyhow::anyhow!("Grok API error ({status}): {message}").into());
        }

        let value: serde_json::Value = serde_json::from_str(&raw).context("parse Grok response")?;
        Ok(extract_text(value)?)
    }
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    let error = value.get("error")?;
    let message = error
        .get("message")
        .and_then(|v| v.as_str())
        .or_else(|| error.as_str())?;
    Some(message.to_owned())
}

fn message_text(choice: &serde_json::Value) -> Option<String> {
    match choice.pointer("/message/content")? {
        serde_json::Value::String(text) => Some(text.clone()),
        serde_json::Value::Array(parts) => Some(
            parts
                .iter()
                .filter_map(|part| part.get("text")?.as_str())
                .collect(),
        ),
        _ => None,
    }
}

/// First non-blank message content across all choices.
pub fn extract_text(payload: serde_json::Value) -> Result<String, ContentError> {
    let choices = payload
        .get("choices")
        .and_then(|v| v.as_array())
        .filter(|choices| !choices.is_empty());
    let Some(choices) = choices else {
        return Err(ContentError::new("Grok returned no choices", payload));
    };

    if let Some(text) = choices
        .iter()
        .filter_map(message_text)
        .find(|text| !text.trim().is_empty())
    {
        return Ok(text);
    }

    let details = match choices[0].get("finish_reason").and_then(|v| v.as_str()) {
        Some(reason) => format!("finish_reason={reason}"),
        None => "no finish_reason provided".to_owned(),
    };
    Err(ContentError::new(
        format!("Grok response had no text part ({details})"),
        payload,
    ))
}

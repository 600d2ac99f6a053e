use std::time::Duration;

use anyhow::Context as _;
use serde_json::json;

use crate::config::{ProviderKind, Settings};
use crate::formats::{AnalysisSummary, CrawlResult, SiteSummary};
use crate::gemini::GeminiClient;
use crate::grok::GrokClient;

const PREVIEW_LIMIT: usize = 240;
const LLM_TIMEOUT: Duration = Duration::from_secs(60);

const INSTRUCTIONS: &str = "You are an analyst generating a concise website briefing. \
Blend the structured metadata with the raw text to produce actionable insight.";

const OUTPUT_SHAPE: &str = r#"Return **only** JSON with the following shape:
{
  "overview": <2-3 sentence synopsis>,
  "sections": [list of key sections and their purpose],
  "highlights": [bullet-level product/features/metrics insights],
  "recommendations": [next actions or opportunities]
}"#;

const FALLBACK_RECOMMENDATIONS: [&str; 2] = [
    "Review the crawler output manually because the LLM output was unavailable.",
    "Retry with sanitized text or a different site if you need an AI-authored summary.",
];

/// The backend answered, but with nothing a briefing can be built from.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ContentError {
    pub message: String,
    /// Raw response kept for diagnostics.
    pub payload: serde_json::Value,
}

impl ContentError {
    pub fn new(message: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            message: message.into(),
            payload,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SummarizeError {
    /// Recoverable: callers switch to [`build_fallback_summary`].
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

/// JSON schema both backends are asked to honor.
pub fn summary_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "overview": { "type": "string" },
            "sections": { "type": "array", "items": { "type": "string" } },
            "highlights": { "type": "array", "items": { "type": "string" } },
            "recommendations": { "type": "array", "items": { "type": "string" } },
        },
        "required": ["overview", "sections", "highlights", "recommendations"],
    })
}

pub fn build_summary_prompt(
    crawl: &CrawlResult,
    analysis: &AnalysisSummary,
    max_tokens: usize,
) -> anyhow::Result<String> {
    let context = crawl.aggregate_text(max_tokens).join("\n\n");
    let metadata = serde_json::to_string(&json!({
        "root_url": analysis.root_url,
        "pages": analysis.page_summaries,
        "keywords": analysis.keywords,
        "cta_links": analysis.ctas,
    }))
    .context("serialize prompt metadata")?;

    Ok(format!(
        "{INSTRUCTIONS}\n{OUTPUT_SHAPE}\nMetadata: {metadata}\nContent: \n{context}"
    ))
}

/// Returns the body of a leading fenced block, or the trimmed text when
/// there is no fence (or the fence is empty).
pub fn strip_code_block(text: &str) -> String {
    let stripped = text.trim();
    if !stripped.starts_with("```") {
        return stripped.to_owned();
    }
    let body = stripped
        .lines()
        .skip(1)
        .take_while(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>();
    if body.is_empty() {
        return stripped.to_owned();
    }
    body.join("\n").trim().to_owned()
}

pub fn parse_summary_text(provider: &str, text: &str) -> Result<SiteSummary, ContentError> {
    let cleaned = strip_code_block(text);
    serde_json::from_str(&cleaned).map_err(|err| {
        tracing::debug!(provider, %err, "summary text did not decode");
        ContentError::new(
            format!("{provider} returned invalid JSON: {}", preview(&cleaned)),
            json!({ "text": text }),
        )
    })
}

fn preview(text: &str) -> String {
    let flat = text.trim().replace('\n', " ");
    if flat.chars().count() <= PREVIEW_LIMIT {
        return flat;
    }
    let mut cut = flat.chars().take(PREVIEW_LIMIT - 3).collect::<String>();
    cut.push_str("...");
    cut
}

/// Backend chosen once from configuration.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    Gemini(GeminiClient),
    Grok(GrokClient),
}

impl LlmProvider {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        match settings.llm_provider {
            ProviderKind::Gemini => {
                let api_key = settings
                    .gemini_api_key
                    .clone()
                    .filter(|key| !key.trim().is_empty())
                    .ok_or_else(|| {
                        anyhow::anyhow!("GEMINI_API_KEY is required when LLM_PROVIDER=gemini")
                    })?;
                Ok(Self::Gemini(GeminiClient::new(
                    api_key,
                    settings.gemini_model.clone(),
                    settings.gemini_base_url.clone(),
                    LLM_TIMEOUT,
                )?))
            }
            ProviderKind::Grok => {
                let api_key = settings
                    .grok_api_key
                    .clone()
                    .filter(|key| !key.trim().is_empty())
                    .ok_or_else(|| {
                        anyhow::anyhow!("GROK_API_KEY is required when LLM_PROVIDER=grok")
                    })?;
                Ok(Self::Grok(GrokClient::new(
                    api_key,
                    settings.grok_model.clone(),
                    settings.grok_base_url.clone(),
                    LLM_TIMEOUT,
                )?))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Gemini(_) => ProviderKind::Gemini.display_name(),
            Self::Grok(_) => ProviderKind::Grok.display_name(),
        }
    }

    /// Raw model text for `prompt`, constrained to `schema` where supported.
    pub async fn summarize_site(
        &self,
        prompt: &str,
        schema: &serde_json::Value,
    ) -> Result<String, SummarizeError> {
        match self {
            Self::Gemini(client) => client.generate(prompt, schema).await,
            Self::Grok(client) => client.complete(prompt, schema).await,
        }
    }
}

pub async fn summarize(
    crawl: &CrawlResult,
    analysis: &AnalysisSummary,
    token_budget: usize,
    provider: &LlmProvider,
) -> Result<SiteSummary, SummarizeError> {
    let prompt = build_summary_prompt(crawl, analysis, token_budget)?;
    tracing::debug!(
        provider = provider.name(),
        prompt_chars = prompt.len(),
        "requesting summary"
    );
    let text = provider.summarize_site(&prompt, &summary_schema()).await?;
    Ok(parse_summary_text(provider.name(), &text)?)
}

/// Crawler-only briefing used when the model output is unusable.
pub fn build_fallback_summary(
    crawl: &CrawlResult,
    analysis: &AnalysisSummary,
    reason: &str,
) -> SiteSummary {
    let mut sections = analysis
        .page_summaries
        .iter()
        .take(3)
        .map(|page| {
            let snippet = if !page.description.is_empty() {
                page.description.clone()
            } else if !page.headings.is_empty() {
                page.headings.join(" / ")
            } else {
                format!("{} words (status {})", page.word_count, page.status)
            };
            format!("{}: {snippet}", page.title)
        })
        .collect::<Vec<_>>();

    if sections.is_empty()
        && let Some(first) = crawl.pages.first()
    {
        let label = if first.title.is_empty() {
            &first.url
        } else {
            &first.title
        };
        sections.push(format!("{label}: {}", first.description));
    }
    if sections.is_empty() {
        sections.push(analysis.root_url.clone());
    }

    let mut highlights = Vec::new();
    if !analysis.keywords.is_empty() {
        highlights.push(format!(
            "Top keywords: {}",
            analysis.keywords.iter().take(6).cloned().collect::<Vec<_>>().join(", ")
        ));
    }
    highlights.push(format!(
        "Internal links: {} · External links: {}",
        analysis.internal_links, analysis.external_links
    ));
    if !analysis.ctas.is_empty() {
        highlights.push(format!(
            "Detected CTAs: {}",
            analysis.ctas.iter().take(5).cloned().collect::<Vec<_>>().join(", ")
        ));
    }

    tracing::warn!(%reason, "using fallback summary");
    SiteSummary {
        overview: format!(
            "Crawled {} page(s) from {}. LLM output unavailable ({reason}); showing crawler-derived summary.",
            analysis.total_pages, analysis.root_url
        ),
        sections,
        highlights,
        recommendations: FALLBACK_RECOMMENDATIONS.into_iter().map(str::to_owned).collect(),
    }
}

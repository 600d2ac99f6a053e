use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome marker recorded on a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
    Http(u16),
    Unknown,
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(code) => write!(f, "{code}"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

impl Serialize for PageStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageSnapshot {
    pub url: String,
    pub title: String,
    pub description: String,
    pub headings: Vec<String>,
    pub links: Vec<String>,
    pub text: String,
    pub word_count: usize,
    pub token_estimate: usize,
    pub status: PageStatus,
}

impl PageSnapshot {
    /// Text cut down proportionally so it fits roughly `max_tokens`.
    pub fn trimmed_text(&self, max_tokens: usize) -> String {
        if self.token_estimate <= max_tokens {
            return self.text.clone();
        }
        let words = self.text.split_whitespace().collect::<Vec<_>>();
        let allowed = (max_tokens.saturating_mul(words.len()) / self.token_estimate.max(1)).max(1);
        let mut out = words
            .iter()
            .take(allowed)
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        out.push_str("...");
        out
    }
}

/// `ceil(words * 1.2)`, never below 1.
pub fn estimate_tokens(word_count: usize) -> usize {
    (word_count.saturating_mul(6).saturating_add(4) / 5).max(1)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrawlResult {
    pub root_url: String,
    pub pages: Vec<PageSnapshot>,
}

impl CrawlResult {
    pub fn new(root_url: impl Into<String>) -> Self {
        Self {
            root_url: root_url.into(),
            pages: Vec::new(),
        }
    }

    pub fn total_tokens(&self) -> usize {
        self.pages.iter().map(|page| page.token_estimate).sum()
    }

    /// Splits `max_tokens` across pages in visitation order. Pages past the
    /// point where the budget runs out get no allocation at all.
    pub fn allocate_tokens(&self, max_tokens: usize) -> Vec<(&PageSnapshot, usize)> {
        let mut remaining = max_tokens;
        let mut allocations = Vec::new();
        for page in &self.pages {
            if remaining == 0 {
                break;
            }
            let allowance = page.token_estimate.min(remaining);
            allocations.push((page, allowance));
            remaining -= allowance;
        }
        allocations
    }

    pub fn aggregate_text(&self, max_tokens: usize) -> Vec<String> {
        self.allocate_tokens(max_tokens)
            .into_iter()
            .map(|(page, allowance)| format!("URL: {}\n{}", page.url, page.trimmed_text(allowance)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageSummary {
    pub url: String,
    pub title: String,
    pub description: String,
    pub headings: Vec<String>,
    pub word_count: usize,
    pub status: PageStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisSummary {
    pub root_url: String,
    pub total_pages: usize,
    pub internal_links: usize,
    pub external_links: usize,
    pub top_headings: Vec<String>,
    pub keywords: Vec<String>,
    pub ctas: Vec<String>,
    pub page_summaries: Vec<PageSummary>,
}

/// Narrative briefing. Absent fields in LLM output decode as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSummary {
    pub overview: String,
    pub sections: Vec<String>,
    pub highlights: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarySource {
    Llm,
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportPayload {
    pub url: String,
    pub summary: SiteSummary,
    pub metrics: AnalysisSummary,
    pub generated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_path: Option<PathBuf>,
}

impl ReportPayload {
    pub fn new(url: impl Into<String>, summary: SiteSummary, metrics: AnalysisSummary) -> Self {
        Self {
            url: url.into(),
            summary,
            metrics,
            generated_at: Utc::now(),
            report_path: None,
        }
    }
}

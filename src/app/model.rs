use serde::{Deserialize, Serialize};

use crate::formats::{AnalysisSummary, SiteSummary, SummarySource};
use crate::pipeline::ServiceResult;

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRequest {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeResponse {
    pub url: String,
    pub summary: SiteSummary,
    pub metrics: AnalysisSummary,
    pub summary_source: SummarySource,
    /// Download route for the rendered report, not a filesystem path.
    pub report_path: String,
}

impl AnalyzeResponse {
    pub fn from_result(result: ServiceResult) -> Self {
        let file_name = result
            .report_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            url: result.url,
            summary: result.summary,
            metrics: result.analysis,
            summary_source: result.summary_source,
            report_path: format!("/api/reports/{file_name}"),
        }
    }
}

/// One server-sent event payload.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Status { message: String },
    Summary(AnalyzeResponse),
    Error { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use serde::Serialize;

use crate::cli::AnalyzeArgs;
use crate::config::Settings;
use crate::crawl::CrawlOptions;
use crate::fetch::PageFetcher;
use crate::formats::{AnalysisSummary, CrawlResult, ReportPayload, SiteSummary, SummarySource};
use crate::llm::{LlmProvider, SummarizeError};
use crate::progress::Progress;
use crate::report::{FileReportRenderer, ReportRenderer};

#[derive(Debug, Clone, Serialize)]
pub struct ServiceResult {
    pub url: String,
    pub crawl: CrawlResult,
    pub analysis: AnalysisSummary,
    pub summary: SiteSummary,
    pub summary_source: SummarySource,
    pub report_path: PathBuf,
}

/// Crawl, analyze, summarize and render one site.
///
/// Holds no per-run state; one service can drive many concurrent runs, each
/// with its own fetch session.
#[derive(Clone)]
pub struct BriefingService {
    crawl_options: CrawlOptions,
    token_budget: usize,
    llm: LlmProvider,
    fetcher: Arc<dyn PageFetcher>,
    renderer: Arc<dyn ReportRenderer>,
}

impl BriefingService {
    /// Fails before any crawl when the selected provider is not configured.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let llm = LlmProvider::from_settings(settings).context("configure LLM provider")?;
        let output_dir = settings.ensure_report_dir()?;
        Ok(Self::new(
            CrawlOptions::from_settings(settings),
            settings.crawl_max_tokens,
            llm,
            crate::fetch::fetcher_from_settings(settings),
            Arc::new(FileReportRenderer::new(output_dir, settings.report_format)),
        ))
    }

    pub fn new(
        crawl_options: CrawlOptions,
        token_budget: usize,
        llm: LlmProvider,
        fetcher: Arc<dyn PageFetcher>,
        renderer: Arc<dyn ReportRenderer>,
    ) -> Self {
        Self {
            crawl_options,
            token_budget,
            llm,
            fetcher,
            renderer,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.llm.name()
    }

    pub async fn run(&self, url: &str, progress: Progress) -> anyhow::Result<ServiceResult> {
        progress.emit("Launching browser session").await;
        let crawl = crate::crawl::crawl_with_fetcher(
            url,
            self.fetcher.as_ref(),
            &self.crawl_options,
            &progress,
        )
        .await
        .context("crawl site")?;

        progress.emit("Crawl complete; building metadata").await;
        let analysis = crate::analyze::analyze(&crawl);

        progress
            .emit(format!("Calling {} for summary", self.llm.name()))
            .await;
        let (summary, summary_source) =
            match crate::llm::summarize(&crawl, &analysis, self.token_budget, &self.llm).await {
                Ok(summary) => (summary, SummarySource::Llm),
                Err(SummarizeError::Content(err)) => {
                    tracing::debug!(payload = %err.payload, "unusable LLM response");
                    progress
                        .emit("LLM returned unusable content; using crawler-only summary")
                        .await;
                    let summary =
                        crate::llm::build_fallback_summary(&crawl, &analysis, &err.message);
                    (summary, SummarySource::Fallback)
                }
                Err(SummarizeError::Transport(err)) => {
                    return Err(err.context(format!("{} summary request", self.llm.name())));
                }
            };

        progress.emit("Generating report").await;
        let payload = ReportPayload::new(url.trim(), summary, analysis);
        let renderer = Arc::clone(&self.renderer);
        let (payload, report_path) = tokio::task::spawn_blocking(move || {
            let mut payload = payload;
            let path = renderer.render(&payload)?;
            payload.report_path = Some(path.clone());
            anyhow::Ok((payload, path))
        })
        .await
        .context("join report renderer")?
        .context("render report")?;
        progress.emit("Report saved").await;

        Ok(ServiceResult {
            url: payload.url,
            crawl,
            analysis: payload.metrics,
            summary: payload.summary,
            summary_source,
            report_path,
        })
    }
}

/// `sitebrief analyze`: full run, then a plain-text digest on stdout.
pub async fn run(args: AnalyzeArgs, mut settings: Settings) -> anyhow::Result<()> {
    args.apply(&mut settings)?;
    let service = BriefingService::from_settings(&settings)?;
    let result = service.run(&args.url, Progress::none()).await?;

    println!("{}", result.summary.overview);
    for section in &result.summary.sections {
        println!("- {section}");
    }
    if result.summary_source == SummarySource::Fallback {
        println!("(crawler-only summary; LLM output was unusable)");
    }

    match args.out {
        Some(out) => {
            if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create dir: {}", parent.display()))?;
            }
            std::fs::copy(&result.report_path, &out).with_context(|| {
                format!(
                    "copy report {} to {}",
                    result.report_path.display(),
                    out.display()
                )
            })?;
            println!("Report: {}", out.display());
        }
        None => println!("Report: {}", result.report_path.display()),
    }
    Ok(())
}

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::config::Settings;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Crawl, summarize and write a briefing report.
    Analyze(AnalyzeArgs),
    /// Crawl and analyze only; prints JSON. No LLM credentials needed.
    Crawl(CrawlArgs),
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Seed URL (must be http/https).
    #[arg(long)]
    pub url: String,

    /// Copy the rendered report here.
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Maximum pages to capture (overrides CRAWL_MAX_PAGES).
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Prompt token budget (overrides CRAWL_MAX_TOKENS).
    #[arg(long)]
    pub max_tokens: Option<usize>,

    /// Delay between pages in seconds (overrides CRAWL_DELAY_SECONDS).
    #[arg(long)]
    pub delay_secs: Option<f64>,
}

#[derive(Debug, Args)]
pub struct CrawlArgs {
    /// Seed URL (must be http/https).
    #[arg(long)]
    pub url: String,

    /// Maximum pages to capture (overrides CRAWL_MAX_PAGES).
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Delay between pages in seconds (overrides CRAWL_DELAY_SECONDS).
    #[arg(long)]
    pub delay_secs: Option<f64>,
}

impl AnalyzeArgs {
    pub fn apply(&self, settings: &mut Settings) -> anyhow::Result<()> {
        apply_crawl_overrides(settings, self.max_pages, self.delay_secs)?;
        if let Some(max_tokens) = self.max_tokens {
            if max_tokens < 1000 {
                anyhow::bail!("--max-tokens must be >= 1000");
            }
            settings.crawl_max_tokens = max_tokens;
        }
        Ok(())
    }
}

impl CrawlArgs {
    pub fn apply(&self, settings: &mut Settings) -> anyhow::Result<()> {
        apply_crawl_overrides(settings, self.max_pages, self.delay_secs)
    }
}

fn apply_crawl_overrides(
    settings: &mut Settings,
    max_pages: Option<usize>,
    delay_secs: Option<f64>,
) -> anyhow::Result<()> {
    if let Some(max_pages) = max_pages {
        if max_pages < 1 {
            anyhow::bail!("--max-pages must be >= 1");
        }
        settings.crawl_max_pages = max_pages;
    }
    if let Some(delay_secs) = delay_secs {
        settings.crawl_delay = Duration::try_from_secs_f64(delay_secs)
            .map_err(|_| anyhow::anyhow!("--delay-secs must be a non-negative number"))?;
    }
    Ok(())
}

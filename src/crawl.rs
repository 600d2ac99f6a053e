use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use anyhow::Context as _;
use url::Url;

use crate::cli::CrawlArgs;
use crate::config::Settings;
use crate::fetch::{FetchSession, PageFetcher};
use crate::formats::CrawlResult;
use crate::link::{self, Authority};
use crate::progress::Progress;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlOptions {
    pub max_pages: usize,
    /// Frontier is capped at `max_pages * max_queue_factor` entries.
    pub max_queue_factor: usize,
    pub delay: Duration,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_pages: 3,
            max_queue_factor: 3,
            delay: Duration::ZERO,
        }
    }
}

impl CrawlOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_pages: settings.crawl_max_pages,
            max_queue_factor: settings.crawl_queue_factor,
            delay: settings.crawl_delay,
        }
    }

    fn max_queue_len(&self) -> usize {
        self.max_pages.saturating_mul(self.max_queue_factor.max(1))
    }
}

/// Validates the seed and returns it with trailing slashes removed.
pub fn canonical_root(seed: &str) -> anyhow::Result<(String, Url)> {
    let root = seed.trim().trim_end_matches('/').to_owned();
    let url = Url::parse(&root).with_context(|| format!("parse seed url: {seed}"))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("seed url must be http/https: {seed}");
    }
    if url.host_str().is_none() {
        anyhow::bail!("seed url must have a host: {seed}");
    }
    Ok((root, url))
}

/// Opens a session, crawls, and closes the session on every exit path.
/// An invalid seed is rejected before any session is opened.
pub async fn crawl_with_fetcher(
    seed: &str,
    fetcher: &dyn PageFetcher,
    options: &CrawlOptions,
    progress: &Progress,
) -> anyhow::Result<CrawlResult> {
    canonical_root(seed)?;
    let mut session = fetcher.open().await.context("open fetch session")?;
    let crawled = crawl_site(seed, session.as_mut(), options, progress).await;
    if let Err(err) = session.close().await {
        tracing::warn!(?err, "failed to close fetch session");
    }
    crawled
}

/// Breadth-first crawl of pages sharing the seed's authority.
///
/// A page that fails to load is reported and skipped; it is never retried
/// and leaves no snapshot behind. Only an invalid seed is an error.
pub async fn crawl_site(
    seed: &str,
    session: &mut dyn FetchSession,
    options: &CrawlOptions,
    progress: &Progress,
) -> anyhow::Result<CrawlResult> {
    let (root, root_url) = canonical_root(seed)?;
    let scope = Authority::of(&root_url)
        .ok_or_else(|| anyhow::anyhow!("seed url must have a host: {seed}"))?;

    let mut result = CrawlResult::new(root);
    let mut discovered: HashSet<String> = HashSet::from([link::dedup_key(&root_url)]);
    let mut queue: VecDeque<Url> = VecDeque::from([root_url]);
    let max_queue_len = options.max_queue_len();

    while result.pages.len() < options.max_pages {
        let Some(current) = queue.pop_front() else {
            break;
        };
        progress.emit(format!("Visiting {current}")).await;

        let fetched = match session.fetch(current.as_str()).await {
            Ok(fetched) => fetched,
            Err(err) => {
                tracing::warn!(url = %current, %err, "page fetch failed; skipping");
                progress.emit(format!("Failed to load {current}: {err}")).await;
                continue;
            }
        };

        let mut snapshot = crate::extract::extract(
            &fetched.html,
            &fetched.visible_text,
            fetched.status,
            &current,
        );
        snapshot.url = link::dedup_key(&current);

        for candidate in &snapshot.links {
            if queue.len() >= max_queue_len {
                break;
            }
            let Ok(candidate) = Url::parse(candidate) else {
                continue;
            };
            if scope.contains(&candidate) && discovered.insert(link::dedup_key(&candidate)) {
                queue.push_back(candidate);
            }
        }

        tracing::debug!(
            url = %snapshot.url,
            words = snapshot.word_count,
            links = snapshot.links.len(),
            queued = queue.len(),
            "page captured"
        );
        result.pages.push(snapshot);

        if !options.delay.is_zero() {
            tokio::time::sleep(options.delay).await;
        }
    }

    Ok(result)
}

/// `sitebrief crawl`: crawl plus analysis, printed as JSON.
pub async fn run(args: CrawlArgs, mut settings: Settings) -> anyhow::Result<()> {
    args.apply(&mut settings)?;
    let fetcher = crate::fetch::fetcher_from_settings(&settings);
    let crawl = crawl_with_fetcher(
        &args.url,
        fetcher.as_ref(),
        &CrawlOptions::from_settings(&settings),
        &Progress::none(),
    )
    .await?;
    let analysis = crate::analyze::analyze(&crawl);

    let out = serde_json::to_string_pretty(&serde_json::json!({
        "crawl": crawl,
        "analysis": analysis,
    }))
    .context("serialize crawl output")?;
    println!("{out}");
    Ok(())
}

mod stubs;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sitebrief::config::{ReportFormat, Settings};
use sitebrief::crawl::CrawlOptions;
use sitebrief::fetch::{FetchError, FetchSession, FetchedPage, PageFetcher};
use sitebrief::formats::{PageStatus, SummarySource};
use sitebrief::llm::LlmProvider;
use sitebrief::pipeline::BriefingService;
use sitebrief::progress::Progress;
use sitebrief::report::FileReportRenderer;
use stubs::{LlmBehavior, LlmStub};

#[derive(Default)]
struct FakeSite {
    pages: HashMap<String, String>,
    failing: HashSet<String>,
    fetched: Vec<String>,
    opened: usize,
    closed: usize,
}

/// In-memory stand-in for a browser session.
#[derive(Clone, Default)]
struct FakeFetcher {
    site: Arc<Mutex<FakeSite>>,
    refuse_open: bool,
}

impl FakeFetcher {
    fn page(self, url: &str, html: &str) -> Self {
        self.site
            .lock()
            .unwrap()
            .pages
            .insert(url.to_owned(), html.to_owned());
        self
    }

    fn failing(self, url: &str) -> Self {
        self.site.lock().unwrap().failing.insert(url.to_owned());
        self
    }

    fn opened_and_closed(&self) -> (usize, usize) {
        let site = self.site.lock().unwrap();
        (site.opened, site.closed)
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn open(&self) -> anyhow::Result<Box<dyn FetchSession>> {
        if self.refuse_open {
            anyhow::bail!("browser unavailable");
        }
        self.site.lock().unwrap().opened += 1;
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl FetchSession for FakeFetcher {
    async fn fetch(&mut self, url: &str) -> Result<FetchedPage, FetchError> {
        let mut site = self.site.lock().unwrap();
        site.fetched.push(url.to_owned());
        if site.failing.contains(url) {
            return Err(FetchError::Timeout(Duration::from_secs(45)));
        }
        let html = site
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Navigation(format!("net::ERR_NAME_NOT_RESOLVED at {url}")))?;
        Ok(FetchedPage {
            visible_text: sitebrief::extract::visible_text(&html),
            html,
            status: PageStatus::Http(200),
        })
    }

    async fn close(self: Box<Self>) -> anyhow::Result<()> {
        self.site.lock().unwrap().closed += 1;
        Ok(())
    }
}

fn provider(stub: &LlmStub, name: &str) -> LlmProvider {
    let gemini_base = stub.gemini_base_url.clone();
    let grok_base = stub.grok_base_url.clone();
    let name = name.to_owned();
    let settings = Settings::from_lookup(move |key| match key {
        "LLM_PROVIDER" => Some(name.clone()),
        "GEMINI_API_KEY" => Some("gemini-test-key".to_owned()),
        "GEMINI_BASE_URL" => Some(gemini_base.clone()),
        "GROK_API_KEY" => Some("grok-test-key".to_owned()),
        "GROK_BASE_URL" => Some(grok_base.clone()),
        _ => None,
    })
    .unwrap();
    LlmProvider::from_settings(&settings).unwrap()
}

fn service(
    fetcher: FakeFetcher,
    llm: LlmProvider,
    max_pages: usize,
    report_dir: &std::path::Path,
) -> BriefingService {
    BriefingService::new(
        CrawlOptions {
            max_pages,
            max_queue_factor: 3,
            delay: Duration::ZERO,
        },
        4000,
        llm,
        Arc::new(fetcher),
        Arc::new(FileReportRenderer::new(report_dir, ReportFormat::Markdown)),
    )
}

async fn drain(mut rx: tokio::sync::mpsc::Receiver<String>) -> Vec<String> {
    let mut messages = Vec::new();
    while let Some(message) = rx.recv().await {
        messages.push(message);
    }
    messages
}

const HOME: &str = r#"<html>
  <head><title>Example Home</title><meta name="description" content="Example landing page"></head>
  <body>
    <h1>Welcome</h1>
    <p>Contact us for a demo of our widgets.</p>
    <a href="/about">About</a>
    <a href="https://external.com">Partner</a>
    <a href="/contact">Contact</a>
  </body>
</html>"#;

const ABOUT: &str = r#"<html>
  <head><title>About</title></head>
  <body><h1>About us</h1><p>We build widgets since forever.</p><a href="/">Home</a></body>
</html>"#;

fn example_site() -> FakeFetcher {
    FakeFetcher::default()
        .page("https://example.com/", HOME)
        .page("https://example.com/about", ABOUT)
        .page(
            "https://example.com/contact",
            "<html><head><title>Contact</title></head><body><p>Write to us.</p></body></html>",
        )
}

#[tokio::test]
async fn two_page_crawl_counts_internal_and_external_links() {
    let stub = LlmStub::spawn(LlmBehavior::Summary("Example sells widgets.".to_owned()));
    let dir = tempfile::tempdir().unwrap();
    let fetcher = example_site();
    let svc = service(fetcher.clone(), provider(&stub, "gemini"), 2, dir.path());

    let result = svc
        .run("https://example.com", Progress::none())
        .await
        .unwrap();

    assert_eq!(result.crawl.pages.len(), 2);
    assert_eq!(result.crawl.pages[0].url, "https://example.com");
    assert_eq!(result.crawl.pages[1].url, "https://example.com/about");
    assert!(result.analysis.internal_links >= 1);
    assert!(result.analysis.external_links >= 1);
    assert_eq!(result.summary_source, SummarySource::Llm);
    assert_eq!(result.summary.overview, "Example sells widgets.");
    assert!(result.report_path.starts_with(dir.path()));
    assert!(result.report_path.exists());
    assert_eq!(fetcher.opened_and_closed(), (1, 1));

    let requests = stub.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].path.contains("key=gemini-test-key"));
    let prompt = requests[0].body["contents"][0]["parts"][0]["text"]
        .as_str()
        .unwrap();
    assert!(prompt.contains("URL: https://example.com\n"));
    assert_eq!(
        requests[0].body["generationConfig"]["responseMimeType"],
        "application/json"
    );
}

#[tokio::test]
async fn contact_link_is_detected_as_cta() {
    let stub = LlmStub::spawn(LlmBehavior::Summary("ok".to_owned()));
    let dir = tempfile::tempdir().unwrap();
    let svc = service(example_site(), provider(&stub, "gemini"), 3, dir.path());

    let result = svc
        .run("https://example.com", Progress::none())
        .await
        .unwrap();

    assert!(
        result
            .analysis
            .ctas
            .contains(&"https://example.com/contact".to_owned())
    );
    assert!(result.crawl.pages.len() <= 3);
}

#[tokio::test]
async fn empty_candidates_fall_back_to_crawler_summary() {
    let stub = LlmStub::spawn(LlmBehavior::Empty);
    let dir = tempfile::tempdir().unwrap();
    let svc = service(example_site(), provider(&stub, "gemini"), 2, dir.path());
    let (progress, rx) = Progress::channel(64);

    let result = svc.run("https://example.com", progress).await.unwrap();
    let messages = drain(rx).await;

    assert_eq!(result.summary_source, SummarySource::Fallback);
    assert!(result.summary.overview.contains("LLM output unavailable"));
    assert!(
        result
            .summary
            .overview
            .contains("Gemini returned no candidates")
    );
    assert_eq!(
        result.summary.sections[0],
        "Example Home: Example landing page"
    );
    assert!(
        messages
            .iter()
            .any(|m| m == "LLM returned unusable content; using crawler-only summary")
    );
    assert!(result.report_path.exists());
}

#[tokio::test]
async fn failing_second_page_leaves_one_snapshot() {
    let stub = LlmStub::spawn(LlmBehavior::Summary("ok".to_owned()));
    let dir = tempfile::tempdir().unwrap();
    let fetcher = FakeFetcher::default()
        .page(
            "https://example.com/",
            r#"<html><body><a href="/broken">Broken</a></body></html>"#,
        )
        .failing("https://example.com/broken");
    let svc = service(fetcher.clone(), provider(&stub, "gemini"), 5, dir.path());
    let (progress, rx) = Progress::channel(64);

    let result = svc.run("https://example.com", progress).await.unwrap();
    let messages = drain(rx).await;

    assert_eq!(result.crawl.pages.len(), 1);
    assert_eq!(result.crawl.pages[0].url, "https://example.com");
    assert!(
        messages
            .iter()
            .any(|m| m.starts_with("Failed to load https://example.com/broken:"))
    );
    assert_eq!(fetcher.opened_and_closed(), (1, 1));
}

#[tokio::test]
async fn progress_messages_follow_pipeline_order() {
    let stub = LlmStub::spawn(LlmBehavior::FencedSummary("Fenced overview".to_owned()));
    let dir = tempfile::tempdir().unwrap();
    let svc = service(example_site(), provider(&stub, "grok"), 1, dir.path());
    let (progress, rx) = Progress::channel(64);

    let result = svc.run("https://example.com/", progress).await.unwrap();
    let messages = drain(rx).await;

    assert_eq!(result.summary.overview, "Fenced overview");
    assert_eq!(
        messages,
        vec![
            "Launching browser session",
            "Visiting https://example.com/",
            "Crawl complete; building metadata",
            "Calling Grok for summary",
            "Generating report",
            "Report saved",
        ]
    );

    let requests = stub.requests();
    assert_eq!(
        requests[0].authorization.as_deref(),
        Some("Bearer grok-test-key")
    );
    assert_eq!(
        requests[0].body["response_format"]["json_schema"]["name"],
        "website_report"
    );
}

#[tokio::test]
async fn unparseable_text_falls_back_with_preview() {
    let stub = LlmStub::spawn(LlmBehavior::Garbage);
    let dir = tempfile::tempdir().unwrap();
    let svc = service(example_site(), provider(&stub, "grok"), 1, dir.path());

    let result = svc
        .run("https://example.com", Progress::none())
        .await
        .unwrap();

    assert_eq!(result.summary_source, SummarySource::Fallback);
    assert!(
        result
            .summary
            .overview
            .contains("Grok returned invalid JSON: I cannot produce JSON today.")
    );
}

#[tokio::test]
async fn transport_failure_fails_the_run() {
    let stub = LlmStub::spawn(LlmBehavior::ServerError);
    let dir = tempfile::tempdir().unwrap();
    let svc = service(example_site(), provider(&stub, "gemini"), 1, dir.path());

    let err = svc
        .run("https://example.com", Progress::none())
        .await
        .unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("Gemini API error (500"), "{message}");
    assert!(message.contains("stub exploded"), "{message}");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn unavailable_browser_is_fatal() {
    let stub = LlmStub::spawn(LlmBehavior::Summary("never".to_owned()));
    let dir = tempfile::tempdir().unwrap();
    let fetcher = FakeFetcher {
        refuse_open: true,
        ..FakeFetcher::default()
    };
    let svc = service(fetcher, provider(&stub, "gemini"), 1, dir.path());

    let err = svc
        .run("https://example.com", Progress::none())
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("browser unavailable"));
    assert!(stub.requests().is_empty());
}

#[tokio::test]
async fn crawl_never_exceeds_budget_and_urls_are_distinct() {
    let stub = LlmStub::spawn(LlmBehavior::Summary("ok".to_owned()));
    let dir = tempfile::tempdir().unwrap();
    let mut fetcher = FakeFetcher::default();
    for i in 0..20 {
        let next = (i + 1) % 20;
        let prev = (i + 19) % 20;
        let path = if i == 0 {
            "https://example.com/".to_owned()
        } else {
            format!("https://example.com/p{i}")
        };
        fetcher = fetcher.page(
            &path,
            &format!(
                r#"<html><body><a href="/p{next}">n</a><a href="/p{prev}#x">p</a><a href="/">h</a></body></html>"#
            ),
        );
    }

    for max_pages in [1, 3, 7] {
        let svc = service(fetcher.clone(), provider(&stub, "gemini"), max_pages, dir.path());
        let result = svc
            .run("https://example.com", Progress::none())
            .await
            .unwrap();
        assert!(result.crawl.pages.len() <= max_pages);
        let urls = result
            .crawl
            .pages
            .iter()
            .map(|p| p.url.as_str())
            .collect::<HashSet<_>>();
        assert_eq!(urls.len(), result.crawl.pages.len());
        assert!(
            result
                .crawl
                .pages
                .iter()
                .all(|p| p.token_estimate >= 1 && !p.text.contains("  "))
        );
    }
}

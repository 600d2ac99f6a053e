use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use fantoccini::{Client, ClientBuilder, Locator};
use reqwest::header::{ACCEPT, USER_AGENT};

use crate::config::{FetchBackend, Settings};
use crate::formats::PageStatus;

const USER_AGENT_VALUE: &str = concat!("sitebrief/", env!("CARGO_PKG_VERSION"));

/// What a session hands back for one URL.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub html: String,
    pub visible_text: String,
    pub status: PageStatus,
}

/// A failure scoped to a single page. The crawl records it and moves on.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Opens page-fetching sessions. Failing to open is fatal for a run.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn open(&self) -> anyhow::Result<Box<dyn FetchSession>>;
}

/// One exclusively owned session. Must be closed by its owner.
#[async_trait]
pub trait FetchSession: Send {
    async fn fetch(&mut self, url: &str) -> Result<FetchedPage, FetchError>;
    async fn close(self: Box<Self>) -> anyhow::Result<()>;
}

pub fn fetcher_from_settings(settings: &Settings) -> Arc<dyn PageFetcher> {
    match settings.fetch_backend {
        FetchBackend::Http => Arc::new(HttpFetcher::new(settings.crawl_timeout)),
        FetchBackend::WebDriver => Arc::new(WebDriverFetcher::new(
            settings.webdriver_url.clone(),
            settings.browser_headless,
            settings.crawl_timeout,
        )),
    }
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn open(&self) -> anyhow::Result<Box<dyn FetchSession>> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build page fetch http client")?;
        Ok(Box::new(HttpSession {
            client,
            timeout: self.timeout,
        }))
    }
}

struct HttpSession {
    client: reqwest::Client,
    timeout: Duration,
}

#[async_trait]
impl FetchSession for HttpSession {
    async fn fetch(&mut self, url: &str) -> Result<FetchedPage, FetchError> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, USER_AGENT_VALUE)
            .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .send()
            .await
            .map_err(|err| self.classify(err))?;

        let status = PageStatus::Http(response.status().as_u16());
        let html = response.text().await.map_err(|err| self.classify(err))?;
        let visible_text = crate::extract::visible_text(&html);

        Ok(FetchedPage {
            html,
            visible_text,
            status,
        })
    }

    async fn close(self: Box<Self>) -> anyhow::Result<()> {
        Ok(())
    }
}

impl HttpSession {
    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Navigation(err.to_string())
        }
    }
}

/// Drives a real browser through a WebDriver endpoint (chromedriver,
/// geckodriver, selenium).
#[derive(Debug, Clone)]
pub struct WebDriverFetcher {
    webdriver_url: String,
    headless: bool,
    timeout: Duration,
}

impl WebDriverFetcher {
    pub fn new(webdriver_url: String, headless: bool, timeout: Duration) -> Self {
        Self {
            webdriver_url,
            headless,
            timeout,
        }
    }

    fn capabilities(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut args = vec!["--disable-gpu", "--no-sandbox"];
        if self.headless {
            args.push("--headless=new");
        }
        let mut caps = serde_json::Map::new();
        caps.insert(
            "goog:chromeOptions".to_owned(),
            serde_json::json!({ "args": args }),
        );
        if self.headless {
            caps.insert(
                "moz:firefoxOptions".to_owned(),
                serde_json::json!({ "args": ["-headless"] }),
            );
        }
        caps
    }
}

#[async_trait]
impl PageFetcher for WebDriverFetcher {
    async fn open(&self) -> anyhow::Result<Box<dyn FetchSession>> {
        let mut builder = ClientBuilder::native();
        builder.capabilities(self.capabilities());
        let client = builder
            .connect(&self.webdriver_url)
            .await
            .with_context(|| format!("connect to webdriver at {}", self.webdriver_url))?;
        tracing::debug!(webdriver = %self.webdriver_url, headless = self.headless, "browser session opened");
        Ok(Box::new(WebDriverSession {
            client,
            timeout: self.timeout,
        }))
    }
}

struct WebDriverSession {
    client: Client,
    timeout: Duration,
}

impl WebDriverSession {
    async fn load(&self, url: &str) -> Result<FetchedPage, fantoccini::error::CmdError> {
        self.client.goto(url).await?;
        let html = self.client.source().await?;
        let visible_text = self.client.find(Locator::Css("body")).await?.text().await?;
        Ok(FetchedPage {
            html,
            visible_text,
            status: PageStatus::Unknown,
        })
    }
}

#[async_trait]
impl FetchSession for WebDriverSession {
    async fn fetch(&mut self, url: &str) -> Result<FetchedPage, FetchError> {
        match tokio::time::timeout(self.timeout, self.load(url)).await {
            Ok(Ok(page)) => Ok(page),
            Ok(Err(err)) => Err(FetchError::Navigation(err.to_string())),
            Err(_) => Err(FetchError::Timeout(self.timeout)),
        }
    }

    async fn close(self: Box<Self>) -> anyhow::Result<()> {
        self.client.close().await.context("close webdriver session")?;
        Ok(())
    }
}

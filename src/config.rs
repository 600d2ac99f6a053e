use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GROK_BASE_URL: &str = "https://api.x.ai/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    Grok,
}

impl ProviderKind {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "gemini" => Ok(Self::Gemini),
            "grok" => Ok(Self::Grok),
            other => anyhow::bail!("unsupported LLM_PROVIDER: {other}"),
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Gemini => "Gemini",
            Self::Grok => "Grok",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchBackend {
    Http,
    WebDriver,
}

impl FetchBackend {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "http" => Ok(Self::Http),
            "webdriver" => Ok(Self::WebDriver),
            other => anyhow::bail!("unsupported fetch backend: {other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Markdown,
    Html,
}

impl ReportFormat {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "markdown" | "md" => Ok(Self::Markdown),
            "html" => Ok(Self::Html),
            other => anyhow::bail!("unsupported report format: {other}"),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Html => "html",
        }
    }
}

/// Process-wide settings, read from the environment once at startup.
#[derive(Clone)]
pub struct Settings {
    pub llm_provider: ProviderKind,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub grok_api_key: Option<String>,
    pub grok_model: String,
    pub grok_base_url: String,

    pub crawl_max_pages: usize,
    pub crawl_max_tokens: usize,
    pub crawl_timeout: Duration,
    pub crawl_delay: Duration,
    pub crawl_queue_factor: usize,

    pub fetch_backend: FetchBackend,
    pub webdriver_url: String,
    pub browser_headless: bool,

    pub report_output_dir: PathBuf,
    pub report_format: ReportFormat,
    pub log_level: String,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("llm_provider", &self.llm_provider)
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "<redacted>"))
            .field("gemini_model", &self.gemini_model)
            .field("grok_api_key", &self.grok_api_key.as_ref().map(|_| "<redacted>"))
            .field("grok_model", &self.grok_model)
            .field("crawl_max_pages", &self.crawl_max_pages)
            .field("crawl_max_tokens", &self.crawl_max_tokens)
            .field("crawl_timeout", &self.crawl_timeout)
            .field("crawl_delay", &self.crawl_delay)
            .field("crawl_queue_factor", &self.crawl_queue_factor)
            .field("fetch_backend", &self.fetch_backend)
            .field("webdriver_url", &self.webdriver_url)
            .field("browser_headless", &self.browser_headless)
            .field("report_output_dir", &self.report_output_dir)
            .field("report_format", &self.report_format)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        let llm_provider = match get("LLM_PROVIDER") {
            Some(raw) => ProviderKind::parse(&raw)?,
            None => ProviderKind::Gemini,
        };

        let crawl_max_pages = parse_bounded_usize(get("CRAWL_MAX_PAGES"), "CRAWL_MAX_PAGES", 3, 1)?;
        let crawl_max_tokens =
            parse_bounded_usize(get("CRAWL_MAX_TOKENS"), "CRAWL_MAX_TOKENS", 4000, 1000)?;
        let crawl_timeout_secs = parse_bounded_usize(get("CRAWL_TIMEOUT"), "CRAWL_TIMEOUT", 45, 10)?;
        let crawl_queue_factor =
            parse_bounded_usize(get("CRAWL_QUEUE_FACTOR"), "CRAWL_QUEUE_FACTOR", 3, 1)?;

        let crawl_delay = match get("CRAWL_DELAY_SECONDS") {
            Some(raw) => parse_delay_secs(&raw).context("invalid CRAWL_DELAY_SECONDS")?,
            None => Duration::from_secs(1),
        };

        let fetch_backend = match get("FETCH_BACKEND") {
            Some(raw) => FetchBackend::parse(&raw)?,
            None => FetchBackend::Http,
        };

        let browser_headless = match get("BROWSER_HEADLESS") {
            Some(raw) => parse_bool(&raw)
                .with_context(|| format!("invalid BROWSER_HEADLESS={raw:?}"))?,
            None => true,
        };

        let report_format = match get("REPORT_FORMAT") {
            Some(raw) => ReportFormat::parse(&raw)?,
            None => ReportFormat::Markdown,
        };

        let log_level = get("LOG_LEVEL")
            .map(|v| v.to_ascii_lowercase())
            .unwrap_or_else(|| "info".to_owned());
        if log_level != "info" && log_level != "debug" {
            anyhow::bail!("invalid LOG_LEVEL={log_level:?}. expected one of: info, debug");
        }

        Ok(Self {
            llm_provider,
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| "gemini-2.5-flash".to_owned()),
            gemini_base_url: get("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_owned()),
            grok_api_key: get("GROK_API_KEY"),
            grok_model: get("GROK_MODEL").unwrap_or_else(|| "grok-2-latest".to_owned()),
            grok_base_url: get("GROK_BASE_URL").unwrap_or_else(|| DEFAULT_GROK_BASE_URL.to_owned()),
            crawl_max_pages,
            crawl_max_tokens,
            crawl_timeout: Duration::from_secs(crawl_timeout_secs as u64),
            crawl_delay,
            crawl_queue_factor,
            fetch_backend,
            webdriver_url: get("WEBDRIVER_URL")
                .unwrap_or_else(|| "http://localhost:4444".to_owned()),
            browser_headless,
            report_output_dir: get("REPORT_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("reports")),
            report_format,
            log_level,
        })
    }

    pub fn ensure_report_dir(&self) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(&self.report_output_dir).with_context(|| {
            format!(
                "create report output dir: {}",
                self.report_output_dir.display()
            )
        })?;
        Ok(self.report_output_dir.clone())
    }
}

fn parse_bounded_usize(
    raw: Option<String>,
    name: &str,
    default: usize,
    min: usize,
) -> anyhow::Result<usize> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let value = raw
        .parse::<usize>()
        .with_context(|| format!("invalid {name}={raw:?}"))?;
    if value < min {
        anyhow::bail!("{name} must be >= {min} (got {value})");
    }
    Ok(value)
}

fn parse_delay_secs(raw: &str) -> anyhow::Result<Duration> {
    let secs = raw
        .parse::<f64>()
        .with_context(|| format!("not a number: {raw:?}"))?;
    if !secs.is_finite() || secs < 0.0 {
        anyhow::bail!("delay must be a non-negative number of seconds (got {raw})");
    }
    Ok(Duration::from_secs_f64(secs))
}

fn parse_bool(raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got {other:?}"),
    }
}

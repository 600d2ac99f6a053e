use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use pulldown_cmark::{CowStr, Event, Options, Parser, Tag};

use crate::config::ReportFormat;
use crate::formats::ReportPayload;

pub const REPORT_TITLE: &str = "Website Briefing Report";
const NO_DATA: &str = "(no data available)";
const MAX_REPORT_KEYWORDS: usize = 8;
const FILE_STEM_CHARS: usize = 30;

/// Turns a finished payload into an addressable artifact.
pub trait ReportRenderer: Send + Sync {
    fn render(&self, payload: &ReportPayload) -> anyhow::Result<PathBuf>;
}

#[derive(Debug, Clone)]
pub struct FileReportRenderer {
    output_dir: PathBuf,
    format: ReportFormat,
}

impl FileReportRenderer {
    pub fn new(output_dir: impl Into<PathBuf>, format: ReportFormat) -> Self {
        Self {
            output_dir: output_dir.into(),
            format,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl ReportRenderer for FileReportRenderer {
    fn render(&self, payload: &ReportPayload) -> anyhow::Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("create report dir: {}", self.output_dir.display()))?;

        let markdown = render_markdown(payload);
        let contents = match self.format {
            ReportFormat::Markdown => markdown,
            ReportFormat::Html => wrap_html_document(
                REPORT_TITLE,
                &markdown_to_html_fragment(&markdown),
            ),
        };

        let file_name = format!(
            "{}-{}.{}",
            safe_file_stem(&payload.summary.overview, &payload.url),
            short_id(),
            self.format.extension()
        );
        let path = self.output_dir.join(file_name);
        fs::write(&path, contents).with_context(|| format!("write report: {}", path.display()))?;
        tracing::info!(path = %path.display(), "report written");
        Ok(path)
    }
}

pub fn render_markdown(payload: &ReportPayload) -> String {
    let summary = &payload.summary;
    let metrics = &payload.metrics;

    let mut out = String::new();
    out.push_str(&format!("# {REPORT_TITLE}\n\n"));
    out.push_str(&format!("- Source: {}\n", payload.url));
    out.push_str(&format!(
        "- Generated: {}\n",
        payload.generated_at.format("%Y-%m-%d %H:%M UTC")
    ));

    let overview = clean_line(&summary.overview);
    out.push_str("\n## Overview\n\n");
    if overview.is_empty() {
        out.push_str(NO_DATA);
    } else {
        out.push_str(&format!("**{overview}**"));
    }
    out.push('\n');

    push_list(&mut out, "Key Sections", &summary.sections);
    push_list(&mut out, "Highlights", &summary.highlights);
    push_list(&mut out, "Recommendations", &summary.recommendations);

    let keywords = if metrics.keywords.is_empty() {
        "n/a".to_owned()
    } else {
        metrics
            .keywords
            .iter()
            .take(MAX_REPORT_KEYWORDS)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    };
    let metric_lines = [
        format!("Pages crawled: {}", metrics.total_pages),
        format!("Internal links: {}", metrics.internal_links),
        format!("External links: {}", metrics.external_links),
        format!("Top keywords: {keywords}"),
        format!("CTA links detected: {}", metrics.ctas.len()),
    ];
    push_list(&mut out, "Crawl Metrics", &metric_lines);
    out
}

fn push_list(out: &mut String, title: &str, lines: &[String]) {
    out.push_str(&format!("\n## {title}\n\n"));
    let lines = lines
        .iter()
        .map(|line| clean_line(line))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>();
    if lines.is_empty() {
        out.push_str(NO_DATA);
        out.push('\n');
        return;
    }
    for line in lines {
        out.push_str(&format!("- {line}\n"));
    }
}

fn clean_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// File-system safe prefix derived from the overview (or the URL).
pub fn safe_file_stem(overview: &str, url: &str) -> String {
    let source = overview.chars().take(FILE_STEM_CHARS).collect::<String>();
    let source = [source.trim(), url.trim()]
        .into_iter()
        .find(|s| !s.is_empty())
        .unwrap_or("summary");
    let stem = source
        .chars()
        .map(|ch| if ch.is_alphanumeric() { ch } else { '-' })
        .collect::<String>();
    let stem = stem.trim_matches('-');
    if stem.is_empty() {
        "summary".to_owned()
    } else {
        stem.to_owned()
    }
}

fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_owned()
}

fn markdown_to_html_fragment(md: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);

    // Report text comes from crawled pages and model output; raw HTML is shown as text.
    let parser = Parser::new_ext(md, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) if !is_safe_href(&dest_url) => Event::Start(Tag::Link {
            link_type,
            dest_url: CowStr::Borrowed("#"),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) if !is_safe_href(&dest_url) => Event::Start(Tag::Image {
            link_type,
            dest_url: CowStr::Borrowed("#"),
            title,
            id,
        }),
        other => other,
    });
    let mut html = String::new();
    pulldown_cmark::html::push_html(&mut html, parser);
    html
}

/// Relative references and http(s)/mailto URLs only.
fn is_safe_href(href: &str) -> bool {
    let href = href.trim();
    let Some((scheme, _)) = href.split_once(':') else {
        return true;
    };
    if scheme.contains(['/', '?', '#']) {
        return true;
    }
    matches!(
        scheme.to_ascii_lowercase().as_str(),
        "http" | "https" | "mailto"
    )
}

fn wrap_html_document(title: &str, body_html: &str) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n");
    out.push_str("<html lang=\"en\">\n");
    out.push_str("<head>\n");
    out.push_str("  <meta charset=\"utf-8\" />\n");
    out.push_str(&format!("  <title>{}</title>\n", html_escape(title)));
    out.push_str("</head>\n");
    out.push_str("<body>\n");
    out.push_str(body_html);
    if !body_html.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("</body>\n");
    out.push_str("</html>\n");
    out
}

fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::formats::{PageSnapshot, PageStatus, estimate_tokens};
use crate::link;

const MAX_HEADINGS: usize = 30;
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Builds the normalized snapshot for one fetched page.
pub fn extract(
    raw_html: &str,
    visible_text: &str,
    status: PageStatus,
    page_url: &Url,
) -> PageSnapshot {
    let document = Html::parse_document(raw_html);

    let text = clean_text(visible_text);
    let word_count = text.split_whitespace().count();

    PageSnapshot {
        url: page_url.to_string(),
        title: extract_title(&document),
        description: extract_description(&document),
        headings: extract_headings(&document),
        links: extract_links(&document, page_url),
        token_estimate: estimate_tokens(word_count),
        word_count,
        text,
        status,
    }
}

/// Collapses every whitespace run to a single space and trims the ends.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Approximates what a browser would render as the body text: every text
/// node outside of script/style-like containers.
pub fn visible_text(raw_html: &str) -> String {
    let document = Html::parse_document(raw_html);
    let root = selector("body")
        .and_then(|body| document.select(&body).next())
        .unwrap_or_else(|| document.root_element());

    let mut pieces: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
        });
        if hidden {
            continue;
        }
        let text: &str = text;
        pieces.push(text);
    }

    clean_text(&pieces.join(" "))
}

fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(err) => {
            tracing::debug!(css, ?err, "invalid selector");
            None
        }
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

fn extract_title(document: &Html) -> String {
    // Only the document title; SVG `<title>` tooltips live in the body.
    let Some(title) = selector("head > title") else {
        return String::new();
    };
    document
        .select(&title)
        .map(element_text)
        .find(|text| !text.is_empty())
        .unwrap_or_default()
}

fn extract_description(document: &Html) -> String {
    let Some(meta) = selector("meta[name]") else {
        return String::new();
    };
    document
        .select(&meta)
        .find(|el| {
            el.value()
                .attr("name")
                .is_some_and(|name| name.trim().eq_ignore_ascii_case("description"))
        })
        .and_then(|el| el.value().attr("content"))
        .map(clean_text)
        .unwrap_or_default()
}

fn extract_headings(document: &Html) -> Vec<String> {
    let Some(headings) = selector("h1, h2, h3") else {
        return Vec::new();
    };
    document
        .select(&headings)
        .map(element_text)
        .filter(|text| !text.is_empty())
        .take(MAX_HEADINGS)
        .collect()
}

fn extract_links(document: &Html, page_url: &Url) -> Vec<String> {
    let Some(anchors) = selector("a[href]") else {
        return Vec::new();
    };
    document
        .select(&anchors)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| link::normalize(href, page_url))
        .map(|url| url.to_string())
        .collect()
}

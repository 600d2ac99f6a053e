use std::collections::{BTreeSet, HashMap};

use crate::formats::{AnalysisSummary, CrawlResult, PageSummary};
use crate::link::Authority;

pub const CTA_KEYWORDS: &[&str] = &[
    "contact", "buy", "get", "demo", "signup", "book", "start", "quote",
];

const MAX_KEYWORDS: usize = 12;
const MAX_TOP_HEADINGS: usize = 10;
const MAX_PAGE_HEADINGS: usize = 5;
const UNTITLED: &str = "Untitled page";

/// Deterministic statistics over a finished crawl. No I/O.
pub fn analyze(crawl: &CrawlResult) -> AnalysisSummary {
    let scope = Authority::parse(&crawl.root_url);
    let mut internal_links = 0;
    let mut external_links = 0;
    let mut ctas = BTreeSet::new();

    for link in crawl.pages.iter().flat_map(|page| &page.links) {
        if scope.as_ref().is_some_and(|scope| scope.contains_str(link)) {
            internal_links += 1;
        } else {
            external_links += 1;
        }
        if is_cta(link) {
            ctas.insert(link.clone());
        }
    }

    let top_headings = crawl
        .pages
        .iter()
        .flat_map(|page| &page.headings)
        .take(MAX_TOP_HEADINGS)
        .cloned()
        .collect();

    let page_summaries = crawl
        .pages
        .iter()
        .map(|page| PageSummary {
            url: page.url.clone(),
            title: if page.title.is_empty() {
                UNTITLED.to_owned()
            } else {
                page.title.clone()
            },
            description: page.description.clone(),
            headings: page.headings.iter().take(MAX_PAGE_HEADINGS).cloned().collect(),
            word_count: page.word_count,
            status: page.status,
        })
        .collect();

    AnalysisSummary {
        root_url: crawl.root_url.clone(),
        total_pages: crawl.pages.len(),
        internal_links,
        external_links,
        top_headings,
        keywords: top_keywords(crawl.pages.iter().map(|page| page.text.as_str())),
        ctas: ctas.into_iter().collect(),
        page_summaries,
    }
}

/// Loose substring heuristic: any URL mentioning an action word counts.
pub fn is_cta(link: &str) -> bool {
    let lowered = link.to_lowercase();
    CTA_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
}

/// Most frequent alphabetic words longer than three characters. Ties keep
/// the order in which the words were first seen.
pub fn top_keywords<'a>(texts: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    let mut next_index = 0;
    for text in texts {
        for token in text.split_whitespace() {
            let token = token.to_lowercase();
            if token.chars().count() <= 3 || !token.chars().all(char::is_alphabetic) {
                continue;
            }
            let entry = counts.entry(token).or_insert_with(|| {
                next_index += 1;
                (0, next_index)
            });
            entry.0 += 1;
        }
    }

    let mut ranked = counts.into_iter().collect::<Vec<_>>();
    ranked.sort_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
        count_b.cmp(count_a).then(first_a.cmp(first_b))
    });
    ranked
        .into_iter()
        .take(MAX_KEYWORDS)
        .map(|(word, _)| word)
        .collect()
}

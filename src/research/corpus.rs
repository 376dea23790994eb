//! Accumulated research material for one lead.
//!
//! A corpus only grows. Pages are keyed by label and replaced only by a
//! fetch with more content; search hits are deduplicated by URL.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::providers::{ScrapeResult, SearchHit};

/// Label of the company's own site in [`ResearchCorpus::pages`].
pub const PRIMARY_PAGE: &str = "site";

/// A scraped page and the URL it came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourcedPage {
    pub url: String,
    pub page: ScrapeResult,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResearchCorpus {
    pub pages: BTreeMap<String, SourcedPage>,
    pub hits: Vec<SearchHit>,
    /// Labels that contributed content, in first-contribution order.
    pub sources_used: Vec<String>,
}

impl ResearchCorpus {
    /// Record a fetched page under `label`.
    ///
    /// Failed fetches are ignored. An existing page is kept unless the new
    /// one carries more content. Returns whether the corpus changed.
    pub fn add_page(&mut self, label: &str, url: &str, page: ScrapeResult) -> bool {
        if !page.success {
            return false;
        }
        let existing = self
            .pages
            .get(label)
            .map(|p| p.page.content_len())
            .unwrap_or(0);
        if existing > 0 && page.content_len() <= existing {
            return false;
        }
        self.pages.insert(
            label.to_string(),
            SourcedPage {
                url: url.to_string(),
                page,
            },
        );
        self.note_source(label);
        true
    }

    /// Append search hits not already present (by URL). Returns how many were new.
    pub fn add_hits(&mut self, label: &str, hits: Vec<SearchHit>) -> usize {
        let mut added = 0;
        for hit in hits {
            if self.hits.iter().any(|h| h.url == hit.url) {
                continue;
            }
            self.hits.push(hit);
            added += 1;
        }
        if added > 0 {
            self.note_source(label);
        }
        added
    }

    /// Whether the company's own site was fetched successfully.
    pub fn has_primary(&self) -> bool {
        self.primary().is_some()
    }

    pub fn primary(&self) -> Option<&SourcedPage> {
        self.pages.get(PRIMARY_PAGE)
    }

    pub fn content_len(&self) -> usize {
        let pages: usize = self.pages.values().map(|p| p.page.content_len()).sum();
        let hits: usize = self
            .hits
            .iter()
            .map(|h| h.title.len() + h.snippet.len())
            .sum();
        pages + hits
    }

    /// Render the corpus as plain text for the analyzer. Primary site first.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let ordered = self
            .primary()
            .map(|p| (PRIMARY_PAGE, p))
            .into_iter()
            .chain(
                self.pages
                    .iter()
                    .filter(|(label, _)| label.as_str() != PRIMARY_PAGE)
                    .map(|(label, p)| (label.as_str(), p)),
            );

        for (label, sourced) in ordered {
            let _ = writeln!(out, "## {} ({})", label, sourced.url);
            if !sourced.page.title.is_empty() {
                let _ = writeln!(out, "{}", sourced.page.title);
            }
            if !sourced.page.text.is_empty() {
                let _ = writeln!(out, "{}", sourced.page.text);
            }
            for section in &sourced.page.sections {
                let _ = writeln!(out, "- {}", section);
            }
            out.push('\n');
        }

        if !self.hits.is_empty() {
            out.push_str("## signals\n");
            for hit in &self.hits {
                let _ = writeln!(out, "- {} <{}> {}", hit.title, hit.url, hit.snippet);
            }
        }
        out
    }

    fn note_source(&mut self, label: &str) {
        if !self.sources_used.iter().any(|s| s == label) {
            self.sources_used.push(label.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(text: &str) -> ScrapeResult {
        ScrapeResult {
            success: true,
            title: String::new(),
            text: text.to_string(),
            sections: vec![],
        }
    }

    fn hit(url: &str) -> SearchHit {
        SearchHit {
            title: "Acme raises".to_string(),
            url: url.to_string(),
            snippet: String::new(),
        }
    }

    #[test]
    fn test_failed_page_ignored() {
        let mut corpus = ResearchCorpus::default();
        assert!(!corpus.add_page(PRIMARY_PAGE, "https://acme.io", ScrapeResult::failed()));
        assert!(!corpus.has_primary());
        assert!(corpus.sources_used.is_empty());
    }

    #[test]
    fn test_page_replaced_only_by_larger() {
        let mut corpus = ResearchCorpus::default();
        corpus.add_page(PRIMARY_PAGE, "https://acme.io", page("long homepage text"));
        assert!(!corpus.add_page(PRIMARY_PAGE, "https://www.acme.io", page("short")));
        assert_eq!(corpus.primary().unwrap().url, "https://acme.io");

        assert!(corpus.add_page(
            PRIMARY_PAGE,
            "https://www.acme.io",
            page("a much longer homepage text with more detail")
        ));
        assert_eq!(corpus.primary().unwrap().url, "https://www.acme.io");
        assert_eq!(corpus.sources_used, vec![PRIMARY_PAGE]);
    }

    #[test]
    fn test_hits_deduplicated() {
        let mut corpus = ResearchCorpus::default();
        assert_eq!(corpus.add_hits("news", vec![hit("a"), hit("b")]), 2);
        assert_eq!(corpus.add_hits("press_releases", vec![hit("b")]), 0);
        assert_eq!(corpus.hits.len(), 2);
        assert_eq!(corpus.sources_used, vec!["news"]);
    }

    #[test]
    fn test_to_text_primary_first() {
        let mut corpus = ResearchCorpus::default();
        corpus.add_page("about", "https://acme.io/about", page("leaders"));
        corpus.add_page(PRIMARY_PAGE, "https://acme.io", page("home"));
        corpus.add_hits("news", vec![hit("https://news/1")]);

        let text = corpus.to_text();
        let site = text.find("## site").unwrap();
        let about = text.find("## about").unwrap();
        assert!(site < about);
        assert!(text.contains("## signals"));
        assert!(text.contains("https://news/1"));
    }
}

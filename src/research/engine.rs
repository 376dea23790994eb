//! Iterative research engine.
//!
//! Runs up to `max_attempts` enrichment passes per lead. Each pass fans out
//! to independent sub-sources, merges what settled into the accumulated
//! corpus, and asks the analyzer to score the whole corpus. Research stops
//! as soon as a pass reaches `target_quality`.
//!
//! Passes:
//! 1. baseline: homepage, leadership page, hiring page, recent news
//! 2. extended: press releases, executive mentions, job postings, extra
//!    site sections (and the homepage again if it was missing)
//! 3. and later: the alternate canonical form of the site (`www.` toggled),
//!    keeping whichever form has more content
//!
//! A pass without homepage content is scored 1 without calling the
//! analyzer and never becomes the best result.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::config::ResearchConfig;
use crate::core::Lead;
use crate::error::Result;
use crate::providers::{Analyzer, SearchHit, SignalSearch, SiteScraper};
use crate::research::attempt::select_best;
use crate::research::corpus::PRIMARY_PAGE;
use crate::research::{Analysis, BestResult, ResearchAttempt, ResearchCorpus, ResearchOutcome};

const EXTRA_SECTIONS: [&str; 3] = ["blog", "press", "team"];

const EXTENDED_SEARCHES: [(&str, &str); 3] = [
    ("press_releases", "press release"),
    ("executive_mentions", "CEO founder interview"),
    ("job_postings", "hiring jobs"),
];

const PRIMARY_MISSING: &str = "primary site content";

/// The company being researched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchTarget {
    pub lead_id: String,
    pub name: String,
    pub website: String,
}

impl ResearchTarget {
    pub fn from_lead(lead: &Lead) -> Self {
        Self {
            lead_id: lead.id.clone(),
            name: lead.name.clone(),
            website: lead.website.clone(),
        }
    }
}

/// Absolute URL for a sourced website, without a trailing slash.
pub fn site_url(website: &str) -> String {
    let trimmed = website.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// The same site with the `www.` prefix toggled.
pub fn alternate_url(url: &str) -> String {
    let (scheme, host) = url.split_once("://").unwrap_or(("https", url));
    match host.strip_prefix("www.") {
        Some(bare) => format!("{}://{}", scheme, bare),
        None => format!("{}://www.{}", scheme, host),
    }
}

pub struct ResearchEngine {
    scraper: Arc<dyn SiteScraper>,
    search: Arc<dyn SignalSearch>,
    analyzer: Arc<dyn Analyzer>,
    config: ResearchConfig,
}

impl ResearchEngine {
    pub fn new(
        scraper: Arc<dyn SiteScraper>,
        search: Arc<dyn SignalSearch>,
        analyzer: Arc<dyn Analyzer>,
        config: ResearchConfig,
    ) -> Self {
        Self {
            scraper,
            search,
            analyzer,
            config,
        }
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    /// Research one company.
    ///
    /// `prior` is an analysis recorded by an earlier run, handed to the
    /// analyzer as context until this run produces its own. Analyzer errors
    /// abort the run; sub-source failures only thin the corpus.
    pub async fn research(
        &self,
        target: &ResearchTarget,
        prior: Option<&Analysis>,
    ) -> Result<ResearchOutcome> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut corpus = ResearchCorpus::default();
        let mut attempts: Vec<ResearchAttempt> = Vec::new();
        let mut results: Vec<BestResult> = Vec::new();

        for attempt in 1..=max_attempts {
            match attempt {
                1 => self.gather_baseline(target, attempt, &mut corpus).await,
                2 => self.gather_extended(target, attempt, &mut corpus).await,
                _ => self.gather_alternate(target, attempt, &mut corpus).await,
            }

            if !corpus.has_primary() {
                warn!(
                    lead_id = %target.lead_id,
                    attempt,
                    website = %target.website,
                    "primary site unavailable, attempt scored 1"
                );
                attempts.push(ResearchAttempt {
                    attempt_number: attempt,
                    sources_used: corpus.sources_used.clone(),
                    quality_achieved: 1,
                    missing_data: vec![PRIMARY_MISSING.to_string()],
                    primary_ok: false,
                });
                continue;
            }

            let context = select_best(&results).map(|b| &b.analysis).or(prior);
            let analysis = match self
                .analyzer
                .analyze(&corpus.to_text(), &target.name, context)
                .await
            {
                Ok(analysis) => analysis,
                Err(err) => {
                    warn!(
                        lead_id = %target.lead_id,
                        attempt,
                        analyzer = self.analyzer.name(),
                        error = %err,
                        "analysis failed"
                    );
                    return Err(err);
                }
            };

            let quality = analysis.bounded_quality();
            info!(
                lead_id = %target.lead_id,
                attempt,
                quality,
                sources = corpus.sources_used.len(),
                "research attempt scored"
            );
            attempts.push(ResearchAttempt {
                attempt_number: attempt,
                sources_used: corpus.sources_used.clone(),
                quality_achieved: quality,
                missing_data: analysis.missing_data.clone(),
                primary_ok: true,
            });
            results.push(BestResult {
                attempt,
                quality,
                corpus: corpus.clone(),
                analysis,
            });

            if quality >= self.config.target_quality {
                break;
            }
        }

        let outcome =
            ResearchOutcome::conclude(select_best(results), attempts, self.config.target_quality);
        info!(
            lead_id = %target.lead_id,
            status = outcome.status.as_str(),
            quality = outcome.quality(),
            attempts = outcome.attempts.len(),
            "research finished"
        );
        Ok(outcome)
    }

    async fn gather_baseline(
        &self,
        target: &ResearchTarget,
        attempt: u32,
        corpus: &mut ResearchCorpus,
    ) {
        let base = site_url(&target.website);
        let leadership_url = format!("{}/about", base);
        let hiring_url = format!("{}/careers", base);
        let news_query = format!("{} news", target.name);

        let (site, leadership, hiring, news) = tokio::join!(
            self.scraper.scrape_site(&base),
            self.scraper.scrape_site(&leadership_url),
            self.scraper.scrape_site(&hiring_url),
            self.search.search(&news_query),
        );

        corpus.add_page(PRIMARY_PAGE, &base, site);
        corpus.add_page("leadership", &leadership_url, leadership);
        corpus.add_page("hiring", &hiring_url, hiring);
        absorb_hits(target, attempt, corpus, "news", news);
    }

    async fn gather_extended(
        &self,
        target: &ResearchTarget,
        attempt: u32,
        corpus: &mut ResearchCorpus,
    ) {
        let base = site_url(&target.website);
        let retry_primary = !corpus.has_primary();

        let pages = join_all(EXTRA_SECTIONS.iter().map(|section| {
            let url = format!("{}/{}", base, section);
            async move {
                let page = self.scraper.scrape_site(&url).await;
                (*section, url, page)
            }
        }));
        let searches = join_all(EXTENDED_SEARCHES.iter().map(|(label, suffix)| {
            let query = format!("{} {}", target.name, suffix);
            async move { (*label, self.search.search(&query).await) }
        }));
        let primary = async {
            if retry_primary {
                Some(self.scraper.scrape_site(&base).await)
            } else {
                None
            }
        };

        let (pages, searches, primary) = tokio::join!(pages, searches, primary);

        if let Some(page) = primary {
            corpus.add_page(PRIMARY_PAGE, &base, page);
        }
        for (section, url, page) in pages {
            corpus.add_page(section, &url, page);
        }
        for (label, result) in searches {
            absorb_hits(target, attempt, corpus, label, result);
        }
    }

    async fn gather_alternate(
        &self,
        target: &ResearchTarget,
        attempt: u32,
        corpus: &mut ResearchCorpus,
    ) {
        let base = site_url(&target.website);
        let alternate = alternate_url(&base);

        let (canonical, alt) = tokio::join!(
            self.scraper.scrape_site(&base),
            self.scraper.scrape_site(&alternate),
        );
        debug!(
            lead_id = %target.lead_id,
            attempt,
            canonical_len = canonical.content_len(),
            alternate_len = alt.content_len(),
            "compared canonical site forms"
        );

        corpus.add_page(PRIMARY_PAGE, &base, canonical);
        corpus.add_page(PRIMARY_PAGE, &alternate, alt);
    }
}

fn absorb_hits(
    target: &ResearchTarget,
    attempt: u32,
    corpus: &mut ResearchCorpus,
    label: &str,
    result: Result<Vec<SearchHit>>,
) {
    match result {
        Ok(hits) => {
            let added = corpus.add_hits(label, hits);
            debug!(lead_id = %target.lead_id, attempt, source = label, added, "signals merged");
        }
        Err(err) => {
            warn!(
                lead_id = %target.lead_id,
                attempt,
                source = label,
                error = %err,
                "signal search failed, continuing"
            );
        }
    }
}

//! Collaborator traits for Prospector.
//!
//! The core never talks to the network directly. Sourcing, planning,
//! scraping, search, and analysis are collaborators behind these traits;
//! each one reports failures as a classified [`ProspectorError`] (see
//! [`crate::error::ErrorKind`]) rather than free text.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{Candidate, StrategyPlan};
use crate::error::Result;
use crate::research::Analysis;

/// Output of one sourcing call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourcingResult {
    pub candidates: Vec<Candidate>,
    /// Extra URLs the source surfaced (directories, listings).
    #[serde(default)]
    pub auxiliary_urls: Vec<String>,
}

/// A scraped page. Scrapers never fail; a failed fetch has `success: false`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScrapeResult {
    pub success: bool,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub sections: Vec<String>,
}

impl ScrapeResult {
    /// A failed fetch.
    pub fn failed() -> Self {
        Self::default()
    }

    /// Amount of usable content, used to compare alternate fetches.
    pub fn content_len(&self) -> usize {
        if !self.success {
            return 0;
        }
        self.title.len() + self.text.len() + self.sections.iter().map(String::len).sum::<usize>()
    }
}

/// One search hit (news, press, job posting).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
}

/// Discovers candidate companies for a strategy query.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn source(&self, query: &str) -> Result<SourcingResult>;

    /// Name for logging and breaker keys.
    fn name(&self) -> &str;
}

/// Proposes new strategies given what has already been tried.
#[async_trait]
pub trait StrategyPlanner: Send + Sync {
    async fn plan_strategies(&self, history: &[String]) -> Result<Vec<StrategyPlan>>;

    fn name(&self) -> &str;
}

/// Fetches a web page.
#[async_trait]
pub trait SiteScraper: Send + Sync {
    async fn scrape_site(&self, url: &str) -> ScrapeResult;
}

/// Searches news and the open web for company signals.
#[async_trait]
pub trait SignalSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>>;
}

/// Turns a gathered corpus into insights and a 1-10 quality score.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(
        &self,
        corpus: &str,
        company_name: &str,
        prior: Option<&Analysis>,
    ) -> Result<Analysis>;

    fn name(&self) -> &str;
}

#[async_trait]
impl<T: CandidateSource + ?Sized> CandidateSource for Arc<T> {
    async fn source(&self, query: &str) -> Result<SourcingResult> {
        (**self).source(query).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl<T: StrategyPlanner + ?Sized> StrategyPlanner for Arc<T> {
    async fn plan_strategies(&self, history: &[String]) -> Result<Vec<StrategyPlan>> {
        (**self).plan_strategies(history).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl<T: Analyzer + ?Sized> Analyzer for Arc<T> {
    async fn analyze(
        &self,
        corpus: &str,
        company_name: &str,
        prior: Option<&Analysis>,
    ) -> Result<Analysis> {
        (**self).analyze(corpus, company_name, prior).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

//! Scripted collaborator doubles for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::{Candidate, StrategyPlan};
use crate::error::{ProspectorError, Result};
use crate::providers::{
    Analyzer, CandidateSource, ScrapeResult, SearchHit, SignalSearch, SiteScraper,
    SourcingResult, StrategyPlanner,
};
use crate::research::Analysis;

/// Error factory; `ProspectorError` is not `Clone`.
pub type ErrorFn = fn() -> ProspectorError;

/// One scripted response.
#[derive(Clone)]
pub enum Step<T> {
    Ok(T),
    Fail(ErrorFn),
}

impl<T: Clone> Step<T> {
    fn resolve(&self) -> Result<T> {
        match self {
            Step::Ok(value) => Ok(value.clone()),
            Step::Fail(err) => Err(err()),
        }
    }
}

/// Queue of steps, then a repeating default.
struct Script<T> {
    queue: Mutex<VecDeque<Step<T>>>,
    default: Step<T>,
    calls: AtomicU32,
}

impl<T: Clone> Script<T> {
    fn new(default: Step<T>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            default,
            calls: AtomicU32::new(0),
        }
    }

    fn push(&self, step: Step<T>) {
        self.queue.lock().unwrap().push_back(step);
    }

    fn next(&self) -> Result<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.queue.lock().unwrap().pop_front();
        step.unwrap_or_else(|| self.default.clone()).resolve()
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

pub struct ScriptedSource {
    script: Script<SourcingResult>,
    queries: Mutex<Vec<String>>,
}

impl ScriptedSource {
    fn with_default(default: Step<SourcingResult>) -> Self {
        Self {
            script: Script::new(default),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Always return these candidates.
    pub fn fixed(candidates: Vec<Candidate>) -> Self {
        Self::with_default(Step::Ok(SourcingResult {
            candidates,
            auxiliary_urls: Vec::new(),
        }))
    }

    pub fn empty() -> Self {
        Self::fixed(Vec::new())
    }

    pub fn always_err(err: ErrorFn) -> Self {
        Self::with_default(Step::Fail(err))
    }

    /// Queue a one-off failure ahead of the default.
    pub fn then_err(self, err: ErrorFn) -> Self {
        self.script.push(Step::Fail(err));
        self
    }

    /// Queue a one-off batch ahead of the default.
    pub fn then_ok(self, candidates: Vec<Candidate>) -> Self {
        self.script.push(Step::Ok(SourcingResult {
            candidates,
            auxiliary_urls: Vec::new(),
        }));
        self
    }

    pub fn calls(&self) -> u32 {
        self.script.calls()
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl CandidateSource for ScriptedSource {
    async fn source(&self, query: &str) -> Result<SourcingResult> {
        self.queries.lock().unwrap().push(query.to_string());
        self.script.next()
    }

    fn name(&self) -> &str {
        "scripted-source"
    }
}

pub struct ScriptedPlanner {
    script: Script<Vec<StrategyPlan>>,
    histories: Mutex<Vec<Vec<String>>>,
}

impl ScriptedPlanner {
    pub fn fixed(plans: Vec<StrategyPlan>) -> Self {
        Self {
            script: Script::new(Step::Ok(plans)),
            histories: Mutex::new(Vec::new()),
        }
    }

    pub fn always_err(err: ErrorFn) -> Self {
        Self {
            script: Script::new(Step::Fail(err)),
            histories: Mutex::new(Vec::new()),
        }
    }

    pub fn then_err(self, err: ErrorFn) -> Self {
        self.script.push(Step::Fail(err));
        self
    }

    pub fn calls(&self) -> u32 {
        self.script.calls()
    }

    pub fn histories(&self) -> Vec<Vec<String>> {
        self.histories.lock().unwrap().clone()
    }
}

#[async_trait]
impl StrategyPlanner for ScriptedPlanner {
    async fn plan_strategies(&self, history: &[String]) -> Result<Vec<StrategyPlan>> {
        self.histories.lock().unwrap().push(history.to_vec());
        self.script.next()
    }

    fn name(&self) -> &str {
        "scripted-planner"
    }
}

/// Serves fixed pages by exact URL; anything else fails to load.
#[derive(Default)]
pub struct PageScraper {
    pages: HashMap<String, ScrapeResult>,
    requested: Mutex<Vec<String>>,
    latency: Duration,
}

impl PageScraper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, text: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            ScrapeResult {
                success: true,
                title: String::new(),
                text: text.to_string(),
                sections: Vec::new(),
            },
        );
        self
    }

    /// A homepage for each website, as `https://<website>`.
    pub fn with_sites(self, websites: &[&str]) -> Self {
        websites.iter().fold(self, |scraper, site| {
            scraper.with_page(&format!("https://{}", site), &format!("{} homepage", site))
        })
    }

    /// Every scrape takes `latency` of (tokio) time.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl SiteScraper for PageScraper {
    async fn scrape_site(&self, url: &str) -> ScrapeResult {
        self.requested.lock().unwrap().push(url.to_string());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.pages.get(url).cloned().unwrap_or_default()
    }
}

/// Returns canned hits per exact query; unknown queries return nothing.
#[derive(Default)]
pub struct CannedSearch {
    hits: HashMap<String, Vec<SearchHit>>,
    fail: bool,
}

impl CannedSearch {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_hit(mut self, query: &str, title: &str, url: &str) -> Self {
        self.hits.entry(query.to_string()).or_default().push(SearchHit {
            title: title.to_string(),
            url: url.to_string(),
            snippet: String::new(),
        });
        self
    }
}

#[async_trait]
impl SignalSearch for CannedSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        if self.fail {
            return Err(ProspectorError::transient("search", "connection reset"));
        }
        Ok(self.hits.get(query).cloned().unwrap_or_default())
    }
}

/// One scripted analyzer response.
#[derive(Clone)]
pub enum AnalysisStep {
    Quality(u8),
    Fail(ErrorFn),
}

/// Analyzer that replays scores, per company first, then a shared queue,
/// then a constant.
pub struct ScriptedAnalyzer {
    per_company: Mutex<HashMap<String, VecDeque<AnalysisStep>>>,
    shared: Mutex<VecDeque<AnalysisStep>>,
    default_quality: u8,
    priors: Mutex<Vec<Option<u8>>>,
    companies: Mutex<Vec<String>>,
}

impl ScriptedAnalyzer {
    pub fn new() -> Self {
        Self::constant(5)
    }

    pub fn constant(quality: u8) -> Self {
        Self {
            per_company: Mutex::new(HashMap::new()),
            shared: Mutex::new(VecDeque::new()),
            default_quality: quality,
            priors: Mutex::new(Vec::new()),
            companies: Mutex::new(Vec::new()),
        }
    }

    /// Scores handed out in order regardless of company; the last one repeats.
    pub fn sequence(qualities: &[u8]) -> Self {
        let analyzer = Self::constant(qualities.last().copied().unwrap_or(5));
        analyzer
            .shared
            .lock()
            .unwrap()
            .extend(qualities.iter().map(|q| AnalysisStep::Quality(*q)));
        analyzer
    }

    pub fn script(self, company: &str, steps: Vec<AnalysisStep>) -> Self {
        self.per_company
            .lock()
            .unwrap()
            .insert(company.to_string(), steps.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.priors.lock().unwrap().len()
    }

    /// Prior quality passed on each call.
    pub fn priors(&self) -> Vec<Option<u8>> {
        self.priors.lock().unwrap().clone()
    }

    /// Company name passed on each call.
    pub fn companies(&self) -> Vec<String> {
        self.companies.lock().unwrap().clone()
    }

    fn next_step(&self, company: &str) -> AnalysisStep {
        if let Some(step) = self
            .per_company
            .lock()
            .unwrap()
            .get_mut(company)
            .and_then(VecDeque::pop_front)
        {
            return step;
        }
        self.shared
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(AnalysisStep::Quality(self.default_quality))
    }
}

#[async_trait]
impl Analyzer for ScriptedAnalyzer {
    async fn analyze(
        &self,
        _corpus: &str,
        company_name: &str,
        prior: Option<&Analysis>,
    ) -> Result<Analysis> {
        self.priors
            .lock()
            .unwrap()
            .push(prior.map(|a| a.quality_score));
        self.companies
            .lock()
            .unwrap()
            .push(company_name.to_string());
        match self.next_step(company_name) {
            AnalysisStep::Quality(q) => Ok(Analysis::with_quality(q)),
            AnalysisStep::Fail(err) => Err(err()),
        }
    }

    fn name(&self) -> &str {
        "scripted-analyzer"
    }
}

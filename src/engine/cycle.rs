//! The growth cycle.
//!
//! `GrowthCycle` is the effectful shell around [`StrategyBoard`]. One call
//! to [`GrowthCycle::run_cycle`] guards, selects a strategy, sources,
//! admits, and enriches, then reports what happened and how long to wait
//! before the next call. It never sleeps between cycles itself; the
//! [`CycleDriver`](crate::engine::CycleDriver) does that.
//!
//! Error routing:
//! - rate limits engage the cooldown for the stage that hit them and are
//!   never counted as failures
//! - an open circuit skips the cycle until the breaker admits a trial call again
//! - everything else increments the consecutive-failure counter; the next
//!   cycle trips once it reaches `max_consecutive_failures`

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::core::{
    admit, next_lead_id, EngineSnapshot, EngineState, EventType, Lead, LeadStatus, Selection,
    StrategyBoard, StrategyOrigin, StrategyPlan, TraceEvent,
};
use crate::error::{ProspectorError, Result};
use crate::providers::{
    Analyzer, CandidateSource, Hybrid, HybridDispatcher, RetryPolicy, SignalSearch, SiteScraper,
    StrategyPlanner,
};
use crate::research::{ResearchEngine, ResearchTarget};
use crate::resilience::{BreakerRegistry, Clock, CooldownSite};
use crate::storage::ProspectStore;

/// External collaborators driven by the cycle.
///
/// Sourcing, planning, and analysis may each have a fallback provider that
/// the dispatcher switches to once the primary's retry budget is spent.
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn CandidateSource>,
    pub planner: Arc<dyn StrategyPlanner>,
    pub scraper: Arc<dyn SiteScraper>,
    pub search: Arc<dyn SignalSearch>,
    pub analyzer: Arc<dyn Analyzer>,
    pub fallback_source: Option<Arc<dyn CandidateSource>>,
    pub fallback_planner: Option<Arc<dyn StrategyPlanner>>,
    pub fallback_analyzer: Option<Arc<dyn Analyzer>>,
}

impl Collaborators {
    pub fn new(
        source: Arc<dyn CandidateSource>,
        planner: Arc<dyn StrategyPlanner>,
        scraper: Arc<dyn SiteScraper>,
        search: Arc<dyn SignalSearch>,
        analyzer: Arc<dyn Analyzer>,
    ) -> Self {
        Self {
            source,
            planner,
            scraper,
            search,
            analyzer,
            fallback_source: None,
            fallback_planner: None,
            fallback_analyzer: None,
        }
    }

    /// Use one provider for every role.
    pub fn uniform<P>(provider: Arc<P>) -> Self
    where
        P: CandidateSource + StrategyPlanner + SiteScraper + SignalSearch + Analyzer + 'static,
    {
        Self::new(
            provider.clone(),
            provider.clone(),
            provider.clone(),
            provider.clone(),
            provider,
        )
    }

    pub fn with_fallback_source(mut self, source: Arc<dyn CandidateSource>) -> Self {
        self.fallback_source = Some(source);
        self
    }

    pub fn with_fallback_planner(mut self, planner: Arc<dyn StrategyPlanner>) -> Self {
        self.fallback_planner = Some(planner);
        self
    }

    pub fn with_fallback_analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        self.fallback_analyzer = Some(analyzer);
        self
    }
}

/// Where in the cycle an error surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStage {
    Planning,
    Sourcing,
    Enrichment,
    Storage,
}

impl CycleStage {
    /// Breaker key for the stage's network calls.
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleStage::Planning => "planning",
            CycleStage::Sourcing => "sourcing",
            CycleStage::Enrichment => "enrichment",
            CycleStage::Storage => "storage",
        }
    }

    fn cooldown_site(&self) -> Option<CooldownSite> {
        match self {
            CycleStage::Planning => Some(CooldownSite::Planning),
            CycleStage::Sourcing => Some(CooldownSite::Sourcing),
            CycleStage::Enrichment => Some(CooldownSite::Enrichment),
            CycleStage::Storage => None,
        }
    }
}

/// What a single cycle did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Cycles are disabled; nothing ran.
    Disabled,
    /// The cooldown window is still open; nothing ran.
    CoolingDown { remaining_secs: u64 },
    /// Too many consecutive failures; cycles are now disabled.
    Tripped { failures: u32 },
    /// The planner appended new pending strategies.
    Planned { strategy_ids: Vec<String> },
    /// The planner had nothing new.
    NothingPlanned,
    /// Sourcing found no candidates; the strategy completed.
    Empty { strategy_id: String },
    /// Every candidate was already known; the strategy completed.
    AllDuplicates { strategy_id: String, rejected: usize },
    /// The strategy's batch finished and the strategy completed.
    Completed {
        strategy_id: String,
        leads_created: usize,
        researched: usize,
        qualified: usize,
        resumed: bool,
    },
    /// A stop was requested between enrichment steps.
    Interrupted {
        strategy_id: String,
        researched: usize,
        remaining: usize,
    },
    /// A rate-limit signal engaged the cooldown.
    RateLimited { site: CooldownSite, cooldown_secs: u64 },
    /// A circuit breaker refused the call.
    CircuitOpen { key: String, retry_in_secs: u64 },
    /// A counted failure.
    Failed {
        stage: CycleStage,
        message: String,
        consecutive_failures: u32,
    },
}

impl CycleOutcome {
    /// Outcomes that reset the consecutive-failure counter.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            CycleOutcome::Planned { .. }
                | CycleOutcome::NothingPlanned
                | CycleOutcome::Empty { .. }
                | CycleOutcome::AllDuplicates { .. }
                | CycleOutcome::Completed { .. }
        )
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleOutcome::Disabled => write!(f, "disabled"),
            CycleOutcome::CoolingDown { remaining_secs } => {
                write!(f, "cooling down ({}s remaining)", remaining_secs)
            }
            CycleOutcome::Tripped { failures } => {
                write!(f, "tripped after {} consecutive failures", failures)
            }
            CycleOutcome::Planned { strategy_ids } => {
                write!(f, "planned {} strategies", strategy_ids.len())
            }
            CycleOutcome::NothingPlanned => write!(f, "planner returned nothing new"),
            CycleOutcome::Empty { strategy_id } => {
                write!(f, "{}: no candidates", strategy_id)
            }
            CycleOutcome::AllDuplicates {
                strategy_id,
                rejected,
            } => write!(f, "{}: all {} candidates already known", strategy_id, rejected),
            CycleOutcome::Completed {
                strategy_id,
                leads_created,
                researched,
                qualified,
                resumed,
            } => write!(
                f,
                "{}: {} new leads, {} researched, {} qualified{}",
                strategy_id,
                leads_created,
                researched,
                qualified,
                if *resumed { " (resumed)" } else { "" }
            ),
            CycleOutcome::Interrupted {
                strategy_id,
                researched,
                remaining,
            } => write!(
                f,
                "{}: interrupted after {} leads, {} remaining",
                strategy_id, researched, remaining
            ),
            CycleOutcome::RateLimited {
                site,
                cooldown_secs,
            } => write!(
                f,
                "rate limited during {}, cooling down {}s",
                site.as_str(),
                cooldown_secs
            ),
            CycleOutcome::CircuitOpen { key, retry_in_secs } => {
                write!(f, "{} circuit open, retry in {}s", key, retry_in_secs)
            }
            CycleOutcome::Failed {
                stage,
                message,
                consecutive_failures,
            } => write!(
                f,
                "{} failed ({} consecutive): {}",
                stage.as_str(),
                consecutive_failures,
                message
            ),
        }
    }
}

/// Outcome of one cycle plus when to run the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    /// `None` means do not reschedule.
    pub next_delay: Option<Duration>,
}

impl CycleReport {
    fn after(outcome: CycleOutcome, delay: Duration) -> Self {
        Self {
            outcome,
            next_delay: Some(delay),
        }
    }

    fn halted(outcome: CycleOutcome) -> Self {
        Self {
            outcome,
            next_delay: None,
        }
    }
}

struct CycleFailure {
    stage: CycleStage,
    strategy_id: Option<String>,
    lead_id: Option<String>,
    error: ProspectorError,
}

impl CycleFailure {
    fn new(stage: CycleStage, error: ProspectorError) -> Self {
        Self {
            stage,
            strategy_id: None,
            lead_id: None,
            error,
        }
    }

    fn strategy(mut self, id: &str) -> Self {
        self.strategy_id = Some(id.to_string());
        self
    }

    fn lead(mut self, id: &str) -> Self {
        self.lead_id = Some(id.to_string());
        self
    }
}

#[derive(Debug, Default)]
struct BatchSummary {
    researched: usize,
    qualified: usize,
    /// Leads left unfinished by a stop request.
    remaining: usize,
}

/// Effectful growth cycle over a [`ProspectStore`].
pub struct GrowthCycle {
    config: Config,
    state: EngineState,
    store: Arc<dyn ProspectStore>,
    source: Hybrid<dyn CandidateSource>,
    planner: Hybrid<dyn StrategyPlanner>,
    research: ResearchEngine,
    breakers: BreakerRegistry,
    clock: Clock,
    interrupt: Arc<AtomicBool>,
}

impl GrowthCycle {
    /// Load the persisted engine state (or start fresh) and wire up the
    /// collaborators behind the dispatcher and breakers.
    pub fn new(
        config: Config,
        store: Arc<dyn ProspectStore>,
        collaborators: Collaborators,
    ) -> Result<Self> {
        Self::with_clock(config, store, collaborators, Arc::new(Utc::now))
    }

    pub fn with_clock(
        config: Config,
        store: Arc<dyn ProspectStore>,
        collaborators: Collaborators,
        clock: Clock,
    ) -> Result<Self> {
        let state = store.load_engine()?.unwrap_or_default();

        let breakers = BreakerRegistry::with_clock(config.breaker.clone(), clock.clone());
        breakers.restore(state.breakers.clone());

        let dispatcher = HybridDispatcher::new(RetryPolicy::from(&config.dispatcher));
        let analyzer: Arc<dyn Analyzer> = Arc::new(Hybrid::new(
            collaborators.analyzer,
            collaborators.fallback_analyzer,
            dispatcher.clone(),
        ));
        let research = ResearchEngine::new(
            collaborators.scraper,
            collaborators.search,
            analyzer,
            config.research.clone(),
        );

        debug!(
            strategies = state.strategies.len(),
            enabled = state.enabled,
            "growth cycle loaded"
        );

        Ok(Self {
            source: Hybrid::new(
                collaborators.source,
                collaborators.fallback_source,
                dispatcher.clone(),
            ),
            planner: Hybrid::new(
                collaborators.planner,
                collaborators.fallback_planner,
                dispatcher,
            ),
            research,
            breakers,
            clock,
            interrupt: Arc::new(AtomicBool::new(false)),
            config,
            state,
            store,
        })
    }

    /// Flag checked before each enrichment step. Setting it stops the
    /// current batch at the next step boundary; the next cycle starts clear.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Run one cycle and persist the resulting state.
    ///
    /// A no-op when disabled or cooling down. An interrupt applies to the
    /// cycle in flight only and is cleared when the cycle returns.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let report = self.run_guarded().await;
        self.interrupt.store(false, Ordering::SeqCst);
        if let Err(e) = self.save() {
            error!(error = %e, "failed to persist engine state");
        }
        report
    }

    /// Enqueue an operator-supplied strategy. Returns its ID.
    pub fn enqueue_manual_strategy(
        &mut self,
        sector: &str,
        query: &str,
        rationale: &str,
    ) -> Result<String> {
        let id = self
            .board()
            .enqueue_manual(StrategyPlan::new(sector.trim(), query.trim(), rationale))?;
        info!(strategy_id = %id, sector, query, "strategy enqueued");
        self.save()?;
        Ok(id)
    }

    pub fn get_state(&self) -> EngineSnapshot {
        let mut snapshot = self.state.snapshot(self.now());
        snapshot.breaker_status = self.breakers.status();
        snapshot
    }

    /// Re-enable cycles and clear the failure counter.
    pub fn enable(&mut self) -> Result<()> {
        self.state.enable(self.config.scheduler.trace_limit);
        info!("growth cycle enabled");
        self.save()
    }

    pub fn disable(&mut self) -> Result<()> {
        self.state
            .disable("disabled by operator", self.config.scheduler.trace_limit);
        info!("growth cycle disabled");
        self.save()
    }

    async fn run_guarded(&mut self) -> CycleReport {
        if !self.state.enabled {
            debug!("growth cycle disabled, skipping");
            return CycleReport::halted(CycleOutcome::Disabled);
        }

        let remaining_secs = self.state.cooldown.remaining_secs(self.now());
        if remaining_secs > 0 {
            debug!(remaining_secs, "cooling down, skipping");
            return CycleReport::after(
                CycleOutcome::CoolingDown { remaining_secs },
                Duration::from_secs(remaining_secs),
            );
        }

        if self.board().should_trip() {
            let failures = self.board().trip();
            error!(failures, "circuit breaker tripped, growth cycle disabled");
            return CycleReport::halted(CycleOutcome::Tripped { failures });
        }

        self.state.cycles_run += 1;
        let cycle = self.state.cycles_run;
        self.trace(EventType::CycleStarted, format!("cycle {}", cycle));

        match self.advance().await {
            Ok(outcome) => {
                if outcome.is_success() {
                    self.board().record_success();
                }
                let delay = self.delay_after(&outcome);
                info!(cycle, outcome = %outcome, "cycle finished");
                match delay {
                    Some(delay) => CycleReport::after(outcome, delay),
                    None => CycleReport::halted(outcome),
                }
            }
            Err(failure) => self.handle_failure(failure),
        }
    }

    async fn advance(&mut self) -> std::result::Result<CycleOutcome, CycleFailure> {
        let strategy_id = match self.board().select() {
            Selection::Resumed(id) => id,
            Selection::Promoted(id) => {
                info!(strategy_id = %id, "strategy activated");
                id
            }
            Selection::Empty => return self.plan().await,
        };

        let unfinished = self
            .store
            .unfinished_leads(&strategy_id)
            .map_err(|e| CycleFailure::new(CycleStage::Storage, e).strategy(&strategy_id))?;
        if !unfinished.is_empty() {
            info!(
                strategy_id = %strategy_id,
                leads = unfinished.len(),
                "resuming unfinished batch"
            );
            let summary = self.enrich_batch(&strategy_id, unfinished).await?;
            return self.finish_batch(&strategy_id, 0, summary, true);
        }

        self.source_and_enrich(&strategy_id).await
    }

    async fn plan(&mut self) -> std::result::Result<CycleOutcome, CycleFailure> {
        let history = self.state.history();
        let planner = &self.planner;
        let history_ref = history.as_slice();
        let plans = self
            .breakers
            .execute(CycleStage::Planning.as_str(), move || {
                planner.plan_strategies(history_ref)
            })
            .await
            .map_err(|e| CycleFailure::new(CycleStage::Planning, e))?;

        let added = self.board().add_plans(plans, StrategyOrigin::Planned);
        if added.is_empty() {
            info!("planner produced no new strategies");
            return Ok(CycleOutcome::NothingPlanned);
        }
        info!(count = added.len(), "strategies planned");
        Ok(CycleOutcome::Planned {
            strategy_ids: added,
        })
    }

    async fn source_and_enrich(
        &mut self,
        strategy_id: &str,
    ) -> std::result::Result<CycleOutcome, CycleFailure> {
        let query = self
            .state
            .strategy(strategy_id)
            .map(|s| s.query.clone())
            .unwrap_or_default();

        let source = &self.source;
        let query_ref = query.as_str();
        let sourced = self
            .breakers
            .execute(CycleStage::Sourcing.as_str(), move || source.source(query_ref))
            .await
            .map_err(|e| CycleFailure::new(CycleStage::Sourcing, e).strategy(strategy_id))?;

        if sourced.candidates.is_empty() {
            info!(strategy_id, query = %query, "sourcing returned no candidates");
            self.complete(strategy_id)?;
            return Ok(CycleOutcome::Empty {
                strategy_id: strategy_id.to_string(),
            });
        }
        self.trace(
            EventType::CandidatesSourced,
            format!("{}: {}", strategy_id, sourced.candidates.len()),
        );

        let known = self
            .store
            .known_websites()
            .map_err(|e| CycleFailure::new(CycleStage::Storage, e).strategy(strategy_id))?;
        let report = admit(sourced.candidates, &known);
        for rejected in &report.rejected {
            debug!(
                strategy_id,
                name = %rejected.candidate.name,
                website = %rejected.normalized_website,
                reason = ?rejected.reason,
                "candidate rejected"
            );
        }

        if report.all_rejected() {
            info!(
                strategy_id,
                rejected = report.rejected.len(),
                "every sourced candidate is already known"
            );
            self.trace(
                EventType::CandidatesRejected,
                format!("{}: {}", strategy_id, report.rejected.len()),
            );
            self.complete(strategy_id)?;
            return Ok(CycleOutcome::AllDuplicates {
                strategy_id: strategy_id.to_string(),
                rejected: report.rejected.len(),
            });
        }

        let taken = self
            .store
            .lead_ids()
            .map_err(|e| CycleFailure::new(CycleStage::Storage, e).strategy(strategy_id))?;
        let mut leads = Vec::with_capacity(report.admitted.len());
        for candidate in report.admitted {
            let id = next_lead_id(taken.iter().map(String::as_str));
            let lead = Lead::with_id(id, candidate, strategy_id);
            self.store
                .put_lead(&lead)
                .map_err(|e| CycleFailure::new(CycleStage::Storage, e).strategy(strategy_id))?;
            debug!(strategy_id, lead_id = %lead.id, name = %lead.name, "lead created");
            self.trace(EventType::LeadCreated, lead.id.clone());
            leads.push(lead);
        }
        let created = leads.len();
        self.board().record_leads(strategy_id, created as u32);
        info!(
            strategy_id,
            created,
            rejected = report.rejected.len(),
            "leads admitted"
        );
        // Checkpoint so a crash mid-batch resumes this strategy.
        self.save()
            .map_err(|e| CycleFailure::new(CycleStage::Storage, e).strategy(strategy_id))?;

        let summary = self.enrich_batch(strategy_id, leads).await?;
        self.finish_batch(strategy_id, created, summary, false)
    }

    /// Research leads one at a time, aborting on the first failure.
    async fn enrich_batch(
        &mut self,
        strategy_id: &str,
        leads: Vec<Lead>,
    ) -> std::result::Result<BatchSummary, CycleFailure> {
        let total = leads.len();
        let gap = Duration::from_secs(self.config.scheduler.inter_candidate_delay_secs);
        let mut summary = BatchSummary::default();

        for (index, mut lead) in leads.into_iter().enumerate() {
            if index > 0 && !self.stop_requested() {
                tokio::time::sleep(gap).await;
            }
            if self.stop_requested() {
                summary.remaining = total - index;
                info!(
                    strategy_id,
                    researched = summary.researched,
                    remaining = summary.remaining,
                    "batch interrupted"
                );
                return Ok(summary);
            }

            if let Err(failure) = self.enrich_one(strategy_id, &mut lead).await {
                let remaining = total - index - 1;
                warn!(
                    strategy_id,
                    lead_id = %lead.id,
                    position = index + 1,
                    remaining,
                    error = %failure.error,
                    "enrichment failed, batch aborted"
                );
                self.trace(
                    EventType::BatchAborted,
                    format!("{} at {} ({} not attempted)", strategy_id, lead.id, remaining),
                );
                return Err(failure);
            }

            summary.researched += 1;
            if lead.status == LeadStatus::Qualified {
                summary.qualified += 1;
            }
        }

        Ok(summary)
    }

    async fn enrich_one(
        &mut self,
        strategy_id: &str,
        lead: &mut Lead,
    ) -> std::result::Result<(), CycleFailure> {
        let storage_failure = |e: ProspectorError, lead_id: &str| {
            CycleFailure::new(CycleStage::Storage, e)
                .strategy(strategy_id)
                .lead(lead_id)
        };

        lead.start_research();
        self.store
            .put_lead(lead)
            .map_err(|e| storage_failure(e, &lead.id))?;

        let target = ResearchTarget::from_lead(lead);
        let prior = lead.analysis.clone();
        let research = &self.research;
        let (target_ref, prior_ref) = (&target, prior.as_ref());
        let outcome = self
            .breakers
            .execute(CycleStage::Enrichment.as_str(), move || {
                research.research(target_ref, prior_ref)
            })
            .await
            .map_err(|e| {
                CycleFailure::new(CycleStage::Enrichment, e)
                    .strategy(strategy_id)
                    .lead(&target.lead_id)
            })?;

        lead.apply_research(&outcome, self.config.research.qualify_min_quality);
        self.store
            .put_lead(lead)
            .map_err(|e| storage_failure(e, &lead.id))?;

        info!(
            strategy_id,
            lead_id = %lead.id,
            quality = lead.research_quality,
            attempts = outcome.attempts.len(),
            research = outcome.status.as_str(),
            status = lead.status.as_str(),
            "lead researched"
        );
        self.trace(
            EventType::LeadResearched,
            format!(
                "{} {} q={}",
                lead.id,
                lead.status.as_str(),
                lead.research_quality
            ),
        );
        Ok(())
    }

    fn finish_batch(
        &mut self,
        strategy_id: &str,
        leads_created: usize,
        summary: BatchSummary,
        resumed: bool,
    ) -> std::result::Result<CycleOutcome, CycleFailure> {
        if summary.remaining > 0 {
            return Ok(CycleOutcome::Interrupted {
                strategy_id: strategy_id.to_string(),
                researched: summary.researched,
                remaining: summary.remaining,
            });
        }

        self.complete(strategy_id)?;
        Ok(CycleOutcome::Completed {
            strategy_id: strategy_id.to_string(),
            leads_created,
            researched: summary.researched,
            qualified: summary.qualified,
            resumed,
        })
    }

    fn complete(&mut self, strategy_id: &str) -> std::result::Result<(), CycleFailure> {
        self.board()
            .complete(strategy_id)
            .map_err(|e| CycleFailure::new(CycleStage::Storage, e).strategy(strategy_id))?;
        info!(strategy_id, "strategy completed");
        Ok(())
    }

    fn handle_failure(&mut self, failure: CycleFailure) -> CycleReport {
        let CycleFailure {
            stage,
            strategy_id,
            lead_id,
            error,
        } = failure;
        let strategy = strategy_id.as_deref().unwrap_or("-");
        let lead = lead_id.as_deref().unwrap_or("-");

        if let ProspectorError::CircuitOpen { key, retry_in_secs } = &error {
            warn!(
                stage = stage.as_str(),
                strategy_id = strategy,
                key = %key,
                retry_in_secs,
                "circuit open, cycle skipped"
            );
            self.trace(EventType::CircuitOpen, format!("{} ({}s)", key, retry_in_secs));
            return CycleReport::after(
                CycleOutcome::CircuitOpen {
                    key: key.clone(),
                    retry_in_secs: *retry_in_secs,
                },
                Duration::from_secs((*retry_in_secs).max(1)),
            );
        }

        if error.is_rate_limited() {
            if let Some(site) = stage.cooldown_site() {
                let now = self.now();
                let cooldown_secs = self
                    .state
                    .cooldown
                    .engage(site, &self.config.cooldown, now);
                warn!(
                    stage = stage.as_str(),
                    strategy_id = strategy,
                    lead_id = lead,
                    cooldown_secs,
                    error = %error,
                    "rate limited, cooldown engaged"
                );
                self.trace(
                    EventType::CooldownEngaged,
                    format!("{} {}s", site.as_str(), cooldown_secs),
                );
                return CycleReport::after(
                    CycleOutcome::RateLimited {
                        site,
                        cooldown_secs,
                    },
                    Duration::from_secs(cooldown_secs),
                );
            }
        }

        if stage == CycleStage::Sourcing {
            if let Some(id) = &strategy_id {
                if let Err(e) = self.board().fail(id) {
                    warn!(strategy_id = %id, error = %e, "could not mark strategy failed");
                }
            }
        }

        let failures = self
            .board()
            .record_failure(format!("{} {}: {}", stage.as_str(), strategy, error));
        error!(
            stage = stage.as_str(),
            strategy_id = strategy,
            lead_id = lead,
            consecutive_failures = failures,
            error = %error,
            "cycle failed"
        );

        CycleReport::after(
            CycleOutcome::Failed {
                stage,
                message: error.to_string(),
                consecutive_failures: failures,
            },
            self.config.scheduler.failure_delay(failures),
        )
    }

    fn delay_after(&self, outcome: &CycleOutcome) -> Option<Duration> {
        let scheduler = &self.config.scheduler;
        let secs = match outcome {
            CycleOutcome::Completed { .. } => scheduler.success_delay_secs,
            CycleOutcome::Empty { .. }
            | CycleOutcome::AllDuplicates { .. }
            | CycleOutcome::NothingPlanned => scheduler.empty_delay_secs,
            CycleOutcome::Planned { .. } => scheduler.planned_delay_secs,
            _ => return None,
        };
        Some(Duration::from_secs(secs))
    }

    fn stop_requested(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst) || !self.state.enabled
    }

    fn board(&mut self) -> StrategyBoard<'_> {
        StrategyBoard::new(&mut self.state, &self.config.scheduler)
    }

    fn trace(&mut self, event_type: EventType, details: String) {
        self.state.add_trace(
            TraceEvent::with_details(event_type, details),
            self.config.scheduler.trace_limit,
        );
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    fn save(&mut self) -> Result<()> {
        self.state.breakers = self.breakers.status();
        self.state.touch();
        self.store.save_engine(&self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::core::{Candidate, StrategyStatus};
    use crate::resilience::CircuitState;
    use crate::storage::MemoryProspectStore;
    use crate::testing::{
        AnalysisStep, CannedSearch, PageScraper, ScriptedAnalyzer, ScriptedPlanner,
        ScriptedSource,
    };

    fn fixed_clock() -> Clock {
        let now = Utc::now();
        Arc::new(move || now)
    }

    /// Clock that tests can move forward.
    fn manual_clock() -> (Clock, Arc<Mutex<DateTime<Utc>>>) {
        let now = Arc::new(Mutex::new(Utc::now()));
        let handle = now.clone();
        (Arc::new(move || *handle.lock().unwrap()), now)
    }

    fn candidates(names: &[&str]) -> Vec<Candidate> {
        names
            .iter()
            .map(|n| Candidate::new(*n, format!("{}.io", n.to_lowercase()), ""))
            .collect()
    }

    fn sites(names: &[&str]) -> Vec<String> {
        names
            .iter()
            .map(|n| format!("{}.io", n.to_lowercase()))
            .collect()
    }

    struct Harness {
        cycle: GrowthCycle,
        store: Arc<MemoryProspectStore>,
        source: Arc<ScriptedSource>,
        planner: Arc<ScriptedPlanner>,
        analyzer: Arc<ScriptedAnalyzer>,
    }

    fn harness_with(
        config: Config,
        store: MemoryProspectStore,
        source: ScriptedSource,
        planner: ScriptedPlanner,
        analyzer: ScriptedAnalyzer,
        scraper: PageScraper,
    ) -> Harness {
        let store = Arc::new(store);
        let source = Arc::new(source);
        let planner = Arc::new(planner);
        let analyzer = Arc::new(analyzer);
        let collaborators = Collaborators::new(
            source.clone(),
            planner.clone(),
            Arc::new(scraper),
            Arc::new(CannedSearch::empty()),
            analyzer.clone(),
        );
        let cycle =
            GrowthCycle::with_clock(config, store.clone(), collaborators, fixed_clock()).unwrap();
        Harness {
            cycle,
            store,
            source,
            planner,
            analyzer,
        }
    }

    /// One manual strategy whose sourcing returns `names`, each with a homepage.
    fn harness(names: &[&str], analyzer: ScriptedAnalyzer) -> Harness {
        let site_list = sites(names);
        let site_refs: Vec<&str> = site_list.iter().map(String::as_str).collect();
        let mut h = harness_with(
            Config::default(),
            MemoryProspectStore::new(),
            ScriptedSource::fixed(candidates(names)),
            ScriptedPlanner::fixed(Vec::new()),
            analyzer,
            PageScraper::new().with_sites(&site_refs),
        );
        h.cycle
            .enqueue_manual_strategy("Fintech", "payments startups", "")
            .unwrap();
        h
    }

    fn strategy_status(h: &Harness, index: usize) -> StrategyStatus {
        h.cycle.state().strategies[index].status
    }

    fn lead_statuses(h: &Harness) -> Vec<(String, LeadStatus)> {
        h.store
            .list_leads()
            .unwrap()
            .into_iter()
            .map(|l| (l.name, l.status))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_plans_when_queue_is_empty() {
        let mut h = harness_with(
            Config::default(),
            MemoryProspectStore::new(),
            ScriptedSource::empty(),
            ScriptedPlanner::fixed(vec![
                StrategyPlan::new("Fintech", "payments startups", "growing"),
                StrategyPlan::new("Health", "clinic software", "underserved"),
            ]),
            ScriptedAnalyzer::new(),
            PageScraper::new(),
        );

        let report = h.cycle.run_cycle().await;
        let CycleOutcome::Planned { strategy_ids } = &report.outcome else {
            panic!("expected Planned, got {:?}", report.outcome);
        };
        assert_eq!(strategy_ids.len(), 2);
        assert_eq!(report.next_delay, Some(Duration::from_secs(90)));
        assert_eq!(h.cycle.state().count_with_status(StrategyStatus::Pending), 2);
        assert_eq!(h.source.calls(), 0);

        // Next cycle promotes the oldest plan and sources it
        let report = h.cycle.run_cycle().await;
        assert!(matches!(report.outcome, CycleOutcome::Empty { .. }));
        assert_eq!(h.source.queries(), vec!["payments startups"]);
        assert_eq!(report.next_delay, Some(Duration::from_secs(45)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_planner_receives_history() {
        let mut h = harness_with(
            Config::default(),
            MemoryProspectStore::new(),
            ScriptedSource::empty(),
            ScriptedPlanner::fixed(Vec::new()),
            ScriptedAnalyzer::new(),
            PageScraper::new(),
        );
        h.cycle.enqueue_manual_strategy("Fintech", "payments", "").unwrap();

        h.cycle.run_cycle().await; // sources and completes the manual strategy
        let report = h.cycle.run_cycle().await;

        assert_eq!(report.outcome, CycleOutcome::NothingPlanned);
        assert_eq!(report.next_delay, Some(Duration::from_secs(45)));
        assert_eq!(h.planner.histories(), vec![vec!["Fintech: payments".to_string()]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_plan_failure_leaves_no_partial_state() {
        let mut h = harness_with(
            Config::default(),
            MemoryProspectStore::new(),
            ScriptedSource::empty(),
            ScriptedPlanner::always_err(|| ProspectorError::fatal("planner", "bad credentials")),
            ScriptedAnalyzer::new(),
            PageScraper::new(),
        );

        let report = h.cycle.run_cycle().await;

        assert!(matches!(
            report.outcome,
            CycleOutcome::Failed {
                stage: CycleStage::Planning,
                consecutive_failures: 1,
                ..
            }
        ));
        assert_eq!(report.next_delay, Some(Duration::from_secs(60)));
        assert!(h.cycle.state().strategies.is_empty());
        assert!(h.cycle.state().active_strategy().is_none());
        assert_eq!(h.planner.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_sourcing_completes_strategy() {
        let mut h = harness(&[], ScriptedAnalyzer::new());

        let report = h.cycle.run_cycle().await;

        assert!(matches!(report.outcome, CycleOutcome::Empty { .. }));
        assert_eq!(strategy_status(&h, 0), StrategyStatus::Completed);
        assert!(h.store.is_empty());
        assert_eq!(h.analyzer.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_batch_qualifies_leads() {
        let mut h = harness(&["Acme", "Globex"], ScriptedAnalyzer::constant(9));
        h.cycle.state.consecutive_failures = 2;

        let report = h.cycle.run_cycle().await;

        let CycleOutcome::Completed {
            leads_created,
            researched,
            qualified,
            resumed,
            ..
        } = report.outcome
        else {
            panic!("expected Completed, got {:?}", report.outcome);
        };
        assert_eq!((leads_created, researched, qualified), (2, 2, 2));
        assert!(!resumed);
        assert_eq!(report.next_delay, Some(Duration::from_secs(15)));
        assert_eq!(h.cycle.state().consecutive_failures, 0);
        assert_eq!(strategy_status(&h, 0), StrategyStatus::Completed);
        assert_eq!(h.cycle.state().strategies[0].leads_created, 2);

        for lead in h.store.list_leads().unwrap() {
            assert_eq!(lead.status, LeadStatus::Qualified);
            assert_eq!(lead.research_quality, 9);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_admits_only_unknown_websites() {
        let names = ["Acme", "Globex", "Initech", "Umbrella", "Hooli"];
        let known = vec![
            Lead::from_candidate(Candidate::new("Acme", "https://www.ACME.io/", ""), "strat_old"),
            Lead::from_candidate(Candidate::new("Hooli", "http://hooli.io", ""), "strat_old"),
        ];
        let mut h = harness_with(
            Config::default(),
            MemoryProspectStore::with_leads(known),
            ScriptedSource::fixed(candidates(&names)),
            ScriptedPlanner::fixed(Vec::new()),
            ScriptedAnalyzer::new(),
            PageScraper::new(),
        );
        h.cycle.enqueue_manual_strategy("Tech", "software", "").unwrap();
        // Stop before the first enrichment step so new leads stay NEW
        h.cycle.interrupt_handle().store(true, Ordering::SeqCst);

        let report = h.cycle.run_cycle().await;

        assert!(matches!(
            report.outcome,
            CycleOutcome::Interrupted { researched: 0, remaining: 3, .. }
        ));
        assert_eq!(report.next_delay, None);
        let strategy_id = h.cycle.state().strategies[0].id.clone();
        let created = h.store.unfinished_leads(&strategy_id).unwrap();
        assert_eq!(created.len(), 3);
        assert!(created.iter().all(|l| l.status == LeadStatus::New));
        let mut names: Vec<_> = created.iter().map(|l| l.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["Globex", "Initech", "Umbrella"]);
        assert_eq!(strategy_status(&h, 0), StrategyStatus::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enrichments_are_spaced_by_fixed_gap() {
        let mut h = harness(&["Acme", "Globex", "Initech"], ScriptedAnalyzer::constant(9));
        let gap = h.cycle.config().scheduler.inter_candidate_delay_secs;

        let start = tokio::time::Instant::now();
        let report = h.cycle.run_cycle().await;

        assert!(matches!(
            report.outcome,
            CycleOutcome::Completed { researched: 3, .. }
        ));
        // No gap before the first lead or after the last.
        assert_eq!(start.elapsed(), Duration::from_secs(2 * gap));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_only_stops_the_cycle_in_flight() {
        let mut h = harness(&["Acme", "Globex"], ScriptedAnalyzer::constant(9));
        h.cycle.interrupt_handle().store(true, Ordering::SeqCst);

        let report = h.cycle.run_cycle().await;
        assert!(matches!(
            report.outcome,
            CycleOutcome::Interrupted { researched: 0, remaining: 2, .. }
        ));
        assert!(!h.cycle.interrupt_handle().load(Ordering::SeqCst));

        let report = h.cycle.run_cycle().await;
        assert!(matches!(
            report.outcome,
            CycleOutcome::Completed {
                researched: 2,
                resumed: true,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_leads_never_reuse_persisted_ids() {
        let persisted_id = format!("lead_{}_9000", Utc::now().format("%Y%m%d"));
        let mut earlier = Lead::with_id(
            persisted_id.clone(),
            Candidate::new("Ledgerly", "ledgerly.io", ""),
            "strat_old",
        );
        earlier.status = LeadStatus::Qualified;
        let mut h = harness_with(
            Config::default(),
            MemoryProspectStore::with_leads(vec![earlier]),
            ScriptedSource::fixed(candidates(&["Brightsmile"])),
            ScriptedPlanner::fixed(Vec::new()),
            ScriptedAnalyzer::constant(9),
            PageScraper::new().with_sites(&["brightsmile.io"]),
        );
        h.cycle.enqueue_manual_strategy("Health", "dental", "").unwrap();

        let report = h.cycle.run_cycle().await;

        assert!(matches!(
            report.outcome,
            CycleOutcome::Completed { leads_created: 1, .. }
        ));
        assert_eq!(h.store.len(), 2);
        let kept = h.store.get_lead(&persisted_id).unwrap().unwrap();
        assert_eq!((kept.name.as_str(), kept.status), ("Ledgerly", LeadStatus::Qualified));
        let seq = |id: &str| id.rsplit('_').next().unwrap().parse::<u32>().unwrap();
        let created: Vec<Lead> = h
            .store
            .list_leads()
            .unwrap()
            .into_iter()
            .filter(|lead| lead.name == "Brightsmile")
            .collect();
        assert_eq!(created.len(), 1);
        assert!(seq(&created[0].id) > 9000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_duplicates_skip_enrichment() {
        let known = vec![Lead::from_candidate(
            Candidate::new("Acme", "acme.io", ""),
            "strat_old",
        )];
        let mut h = harness_with(
            Config::default(),
            MemoryProspectStore::with_leads(known),
            ScriptedSource::fixed(candidates(&["Acme", "ACME"])),
            ScriptedPlanner::fixed(Vec::new()),
            ScriptedAnalyzer::new(),
            PageScraper::new(),
        );
        h.cycle.enqueue_manual_strategy("Tech", "software", "").unwrap();

        let report = h.cycle.run_cycle().await;

        assert!(matches!(
            report.outcome,
            CycleOutcome::AllDuplicates { rejected: 2, .. }
        ));
        assert_eq!(report.next_delay, Some(Duration::from_secs(45)));
        assert_eq!(h.analyzer.calls(), 0);
        assert_eq!(h.store.len(), 1);
        assert_eq!(strategy_status(&h, 0), StrategyStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_enrichment_aborts_batch_then_resumes() {
        let analyzer = ScriptedAnalyzer::constant(9).script(
            "Globex",
            vec![AnalysisStep::Fail(|| {
                ProspectorError::fatal("analyzer", "malformed response")
            })],
        );
        let mut h = harness(&["Acme", "Globex", "Initech", "Umbrella"], analyzer);

        let report = h.cycle.run_cycle().await;

        assert!(matches!(
            report.outcome,
            CycleOutcome::Failed {
                stage: CycleStage::Enrichment,
                consecutive_failures: 1,
                ..
            }
        ));
        assert_eq!(h.cycle.state().consecutive_failures, 1);
        assert_eq!(
            lead_statuses(&h),
            vec![
                ("Acme".to_string(), LeadStatus::Qualified),
                ("Globex".to_string(), LeadStatus::Analyzing),
                ("Initech".to_string(), LeadStatus::New),
                ("Umbrella".to_string(), LeadStatus::New),
            ]
        );
        assert_eq!(h.analyzer.companies(), vec!["Acme", "Globex"]);
        // Enrichment failures leave the strategy active for resumption
        assert_eq!(strategy_status(&h, 0), StrategyStatus::Active);

        let report = h.cycle.run_cycle().await;

        let CycleOutcome::Completed {
            researched,
            resumed,
            leads_created,
            ..
        } = report.outcome
        else {
            panic!("expected Completed, got {:?}", report.outcome);
        };
        assert!(resumed);
        assert_eq!((researched, leads_created), (3, 0));
        assert_eq!(h.source.calls(), 1);
        assert_eq!(h.cycle.state().consecutive_failures, 0);
        assert_eq!(strategy_status(&h, 0), StrategyStatus::Completed);
        assert!(lead_statuses(&h)
            .iter()
            .all(|(_, status)| *status == LeadStatus::Qualified));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sourcing_rate_limit_engages_cooldown() {
        let mut h = harness_with(
            Config::default(),
            MemoryProspectStore::new(),
            ScriptedSource::always_err(|| ProspectorError::rate_limited("search-api", "429")),
            ScriptedPlanner::fixed(Vec::new()),
            ScriptedAnalyzer::new(),
            PageScraper::new(),
        );
        h.cycle.enqueue_manual_strategy("Tech", "software", "").unwrap();
        h.cycle.state.consecutive_failures = 1;

        let report = h.cycle.run_cycle().await;

        assert_eq!(
            report.outcome,
            CycleOutcome::RateLimited {
                site: CooldownSite::Sourcing,
                cooldown_secs: 90
            }
        );
        assert_eq!(report.next_delay, Some(Duration::from_secs(90)));
        // Initial call plus three retries
        assert_eq!(h.source.calls(), 4);

        let snapshot = h.cycle.get_state();
        assert_eq!(snapshot.cooldown_remaining_secs, 90);
        assert_eq!(snapshot.cooldown_max_secs, 90);
        assert_eq!(snapshot.consecutive_failures, 1);
        assert_eq!(strategy_status(&h, 0), StrategyStatus::Active);

        // Guard refuses to run while cooling down
        let report = h.cycle.run_cycle().await;
        assert_eq!(
            report.outcome,
            CycleOutcome::CoolingDown { remaining_secs: 90 }
        );
        assert_eq!(h.source.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sourcing_resumes_once_cooldown_expires() {
        let (clock, now) = manual_clock();
        let store = Arc::new(MemoryProspectStore::new());
        let source = Arc::new(
            (0..4).fold(ScriptedSource::fixed(candidates(&["Acme"])), |source, _| {
                source.then_err(|| ProspectorError::rate_limited("search-api", "429"))
            }),
        );
        let collaborators = Collaborators::new(
            source.clone(),
            Arc::new(ScriptedPlanner::fixed(Vec::new())),
            Arc::new(PageScraper::new().with_sites(&["acme.io"])),
            Arc::new(CannedSearch::empty()),
            Arc::new(ScriptedAnalyzer::constant(9)),
        );
        let mut cycle =
            GrowthCycle::with_clock(Config::default(), store.clone(), collaborators, clock)
                .unwrap();
        cycle.enqueue_manual_strategy("Tech", "software", "").unwrap();

        let report = cycle.run_cycle().await;
        assert!(matches!(report.outcome, CycleOutcome::RateLimited { .. }));
        assert_eq!(source.calls(), 4);

        *now.lock().unwrap() += chrono::Duration::seconds(89);
        let report = cycle.run_cycle().await;
        assert_eq!(report.outcome, CycleOutcome::CoolingDown { remaining_secs: 1 });
        assert_eq!(source.calls(), 4);

        *now.lock().unwrap() += chrono::Duration::seconds(1);
        assert_eq!(cycle.get_state().cooldown_remaining_secs, 0);
        let report = cycle.run_cycle().await;

        assert!(matches!(
            report.outcome,
            CycleOutcome::Completed { leads_created: 1, qualified: 1, .. }
        ));
        assert_eq!(source.calls(), 5);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enrichment_quota_exhaustion_cools_down_and_keeps_batch() {
        let analyzer = ScriptedAnalyzer::constant(9).script(
            "Acme",
            (0..4)
                .map(|_| AnalysisStep::Fail(|| ProspectorError::rate_limited("llm", "quota")))
                .collect(),
        );
        let mut h = harness(&["Acme"], analyzer);

        let report = h.cycle.run_cycle().await;

        assert_eq!(
            report.outcome,
            CycleOutcome::RateLimited {
                site: CooldownSite::Enrichment,
                cooldown_secs: 60
            }
        );
        assert_eq!(h.cycle.state().consecutive_failures, 0);
        assert_eq!(strategy_status(&h, 0), StrategyStatus::Active);
        assert_eq!(lead_statuses(&h)[0].1, LeadStatus::Analyzing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_failures_trip_and_enable_recovers() {
        let mut h = harness_with(
            Config::default(),
            MemoryProspectStore::new(),
            ScriptedSource::always_err(|| ProspectorError::fatal("search-api", "bad key")),
            ScriptedPlanner::fixed(Vec::new()),
            ScriptedAnalyzer::new(),
            PageScraper::new(),
        );
        for query in ["one", "two", "three"] {
            h.cycle.enqueue_manual_strategy("Tech", query, "").unwrap();
        }

        for expected in 1..=3u32 {
            let report = h.cycle.run_cycle().await;
            assert!(matches!(
                report.outcome,
                CycleOutcome::Failed { stage: CycleStage::Sourcing, consecutive_failures, .. }
                    if consecutive_failures == expected
            ));
            assert_eq!(
                report.next_delay,
                Some(Duration::from_secs(60 * expected as u64))
            );
        }
        assert_eq!(h.cycle.state().count_with_status(StrategyStatus::Failed), 3);

        let report = h.cycle.run_cycle().await;
        assert_eq!(report.outcome, CycleOutcome::Tripped { failures: 3 });
        assert_eq!(report.next_delay, None);
        assert!(!h.cycle.state().enabled);
        assert_eq!(h.cycle.state().consecutive_failures, 0);

        let report = h.cycle.run_cycle().await;
        assert_eq!(report.outcome, CycleOutcome::Disabled);
        assert_eq!(h.source.calls(), 3);

        h.cycle.enable().unwrap();
        assert!(h.store.load_engine().unwrap().unwrap().enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_fails_fast_without_counting() {
        let mut config = Config::default();
        config.breaker.failure_threshold = 1;
        let mut h = harness_with(
            config,
            MemoryProspectStore::new(),
            ScriptedSource::always_err(|| ProspectorError::fatal("search-api", "bad key")),
            ScriptedPlanner::fixed(Vec::new()),
            ScriptedAnalyzer::new(),
            PageScraper::new(),
        );
        h.cycle.enqueue_manual_strategy("Tech", "one", "").unwrap();
        h.cycle.enqueue_manual_strategy("Tech", "two", "").unwrap();

        h.cycle.run_cycle().await;
        assert_eq!(h.cycle.get_state().breaker_status["sourcing"].state, CircuitState::Open);

        let report = h.cycle.run_cycle().await;
        assert_eq!(
            report.outcome,
            CycleOutcome::CircuitOpen {
                key: "sourcing".to_string(),
                retry_in_secs: 60
            }
        );
        assert_eq!(report.next_delay, Some(Duration::from_secs(60)));
        assert_eq!(h.source.calls(), 1);
        assert_eq!(h.cycle.state().consecutive_failures, 1);
        assert_eq!(strategy_status(&h, 1), StrategyStatus::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_source_used_after_retries() {
        let store = Arc::new(MemoryProspectStore::new());
        let primary = Arc::new(ScriptedSource::always_err(|| {
            ProspectorError::transient("primary", "503")
        }));
        let fallback = Arc::new(ScriptedSource::empty());
        let collaborators = Collaborators::new(
            primary.clone(),
            Arc::new(ScriptedPlanner::fixed(Vec::new())),
            Arc::new(PageScraper::new()),
            Arc::new(CannedSearch::empty()),
            Arc::new(ScriptedAnalyzer::new()),
        )
        .with_fallback_source(fallback.clone());
        let mut cycle =
            GrowthCycle::with_clock(Config::default(), store, collaborators, fixed_clock())
                .unwrap();
        cycle.enqueue_manual_strategy("Tech", "software", "").unwrap();

        let report = cycle.run_cycle().await;

        assert!(matches!(report.outcome, CycleOutcome::Empty { .. }));
        assert_eq!(primary.calls(), 4);
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_manual_strategy_validates_and_persists() {
        let mut h = harness(&[], ScriptedAnalyzer::new());

        assert!(h.cycle.enqueue_manual_strategy(" ", "query", "").is_err());
        assert!(h.cycle.enqueue_manual_strategy("Tech", "", "").is_err());
        assert!(h
            .cycle
            .enqueue_manual_strategy("Fintech", "PAYMENTS startups", "")
            .is_err());

        let id = h.cycle.enqueue_manual_strategy("Health", "clinics", "why").unwrap();
        let persisted = h.store.load_engine().unwrap().unwrap();
        assert!(persisted.strategy(&id).is_some());
        assert_eq!(persisted.strategies.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_makes_cycles_no_ops() {
        let mut h = harness(&["Acme"], ScriptedAnalyzer::new());
        h.cycle.disable().unwrap();

        let report = h.cycle.run_cycle().await;

        assert_eq!(report.outcome, CycleOutcome::Disabled);
        assert_eq!(report.next_delay, None);
        assert_eq!(h.source.calls(), 0);
        assert!(!h.cycle.get_state().enabled);
        assert!(!h.store.load_engine().unwrap().unwrap().enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_is_restored_from_store() {
        let store = Arc::new(MemoryProspectStore::new());
        let mut state = EngineState::new();
        state.consecutive_failures = 2;
        let mut breaker = crate::resilience::CircuitBreakerState::default();
        breaker.failure_count = 4;
        state.breakers.insert("sourcing".to_string(), breaker);
        store.save_engine(&state).unwrap();

        let collaborators = Collaborators::new(
            Arc::new(ScriptedSource::empty()),
            Arc::new(ScriptedPlanner::fixed(Vec::new())),
            Arc::new(PageScraper::new()),
            Arc::new(CannedSearch::empty()),
            Arc::new(ScriptedAnalyzer::new()),
        );
        let cycle = GrowthCycle::new(Config::default(), store, collaborators).unwrap();

        let snapshot = cycle.get_state();
        assert_eq!(snapshot.consecutive_failures, 2);
        assert_eq!(snapshot.breaker_status["sourcing"].failure_count, 4);
    }

    #[test]
    fn test_outcome_serializes_with_tag() {
        let json = serde_json::to_value(CycleOutcome::RateLimited {
            site: CooldownSite::Sourcing,
            cooldown_secs: 90,
        })
        .unwrap();
        assert_eq!(json["outcome"], "rate_limited");
        assert_eq!(json["site"], "sourcing");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone, Copy)]
        enum SourceStep {
            Ok,
            Fatal,
            RateLimited,
        }

        fn arb_step() -> impl Strategy<Value = SourceStep> {
            prop_oneof![
                Just(SourceStep::Ok),
                Just(SourceStep::Fatal),
                Just(SourceStep::RateLimited),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            // Property: at most one strategy is active across arbitrary cycle outcomes
            #[test]
            fn prop_single_active_across_cycles(steps in prop::collection::vec(arb_step(), 1..8)) {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .start_paused(true)
                    .build()
                    .unwrap();

                runtime.block_on(async {
                    let mut source = ScriptedSource::empty();
                    for step in &steps {
                        source = match step {
                            SourceStep::Ok => source.then_ok(candidates(&["Acme"])),
                            SourceStep::Fatal => {
                                source.then_err(|| ProspectorError::fatal("s", "x"))
                            }
                            SourceStep::RateLimited => {
                                source.then_err(|| ProspectorError::rate_limited("s", "429"))
                            }
                        };
                    }
                    let planner = ScriptedPlanner::fixed(vec![
                        StrategyPlan::new("A", "alpha", ""),
                        StrategyPlan::new("B", "beta", ""),
                    ])
                    .then_err(|| ProspectorError::transient("planner", "reset"));
                    let mut h = harness_with(
                        Config::default(),
                        MemoryProspectStore::new(),
                        source,
                        planner,
                        ScriptedAnalyzer::constant(7),
                        PageScraper::new().with_sites(&["acme.io"]),
                    );

                    for _ in 0..steps.len() + 2 {
                        h.cycle.run_cycle().await;
                        let active = h.cycle.state().count_with_status(StrategyStatus::Active);
                        prop_assert!(active <= 1);
                        if !h.cycle.state().enabled {
                            h.cycle.enable().unwrap();
                        }
                        h.cycle.state.cooldown.clear();
                    }
                    Ok::<(), TestCaseError>(())
                })?;
            }
        }
    }
}

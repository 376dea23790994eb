//! Hybrid engine dispatcher.
//!
//! Runs an operation against a primary provider, retries it with a growing
//! delay on quota and server errors, and fails over to a secondary provider
//! once the retry budget is spent. This is the only retry policy in the
//! crate; sourcing, planning, and analysis all go through it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::config::DispatcherConfig;
use crate::core::StrategyPlan;
use crate::error::{ErrorKind, ProspectorError, Result};
use crate::providers::traits::{Analyzer, CandidateSource, SourcingResult, StrategyPlanner};
use crate::research::Analysis;

/// Longest single backoff sleep.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(300);

/// Retry schedule for the primary provider.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first call.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based), capped at
    /// [`MAX_RETRY_DELAY`]. A multiplier below 1.0 or not finite never
    /// grows the delay.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let base = self.initial_delay.min(MAX_RETRY_DELAY);
        if !DispatcherConfig::is_valid_multiplier(self.multiplier) {
            return base;
        }
        let factor = self.multiplier.powi(i32::try_from(retry).unwrap_or(i32::MAX));
        Duration::try_from_secs_f64(base.as_secs_f64() * factor)
            .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
    }
}

impl From<&DispatcherConfig> for RetryPolicy {
    fn from(config: &DispatcherConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            multiplier: config.backoff_multiplier,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&DispatcherConfig::default())
    }
}

/// Retry-then-failover executor.
#[derive(Debug, Clone, Default)]
pub struct HybridDispatcher {
    policy: RetryPolicy,
}

impl HybridDispatcher {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `primary`, retrying retryable failures, then fall back.
    ///
    /// Fatal errors propagate immediately. When retries run out the call
    /// switches to `fallback` if one is given. Without a fallback, a quota
    /// failure becomes [`ProspectorError::QuotaExhausted`] and a server
    /// failure is escalated unchanged.
    pub async fn dispatch<T, P, PFut, F, FFut>(
        &self,
        operation: &str,
        mut primary: P,
        fallback: Option<F>,
    ) -> Result<T>
    where
        P: FnMut() -> PFut,
        PFut: Future<Output = Result<T>>,
        F: FnOnce() -> FFut,
        FFut: Future<Output = Result<T>>,
    {
        let mut retries = 0;
        let last_error = loop {
            let err = match primary().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.kind().is_retryable() {
                return Err(err);
            }
            if retries >= self.policy.max_retries {
                break err;
            }

            let delay = self.policy.delay_for(retries);
            retries += 1;
            warn!(
                operation,
                retry = retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "primary provider failed, retrying"
            );
            tokio::time::sleep(delay).await;
        };

        let attempts = retries + 1;
        match fallback {
            Some(fallback) => {
                warn!(
                    operation,
                    attempts,
                    error = %last_error,
                    "primary provider exhausted, switching to fallback"
                );
                fallback().await
            }
            None if last_error.kind() == ErrorKind::RateLimited => {
                Err(ProspectorError::quota_exhausted(operation, attempts))
            }
            None => Err(last_error),
        }
    }
}

/// A primary provider with an optional fallback, dispatched through a
/// shared [`HybridDispatcher`].
pub struct Hybrid<S: ?Sized> {
    primary: Arc<S>,
    fallback: Option<Arc<S>>,
    dispatcher: HybridDispatcher,
}

impl<S: ?Sized> Hybrid<S> {
    pub fn new(primary: Arc<S>, fallback: Option<Arc<S>>, dispatcher: HybridDispatcher) -> Self {
        Self {
            primary,
            fallback,
            dispatcher,
        }
    }
}

#[async_trait]
impl CandidateSource for Hybrid<dyn CandidateSource> {
    async fn source(&self, query: &str) -> Result<SourcingResult> {
        self.dispatcher
            .dispatch(
                "sourcing",
                || self.primary.source(query),
                self.fallback.as_ref().map(|f| move || f.source(query)),
            )
            .await
    }

    fn name(&self) -> &str {
        self.primary.name()
    }
}

#[async_trait]
impl StrategyPlanner for Hybrid<dyn StrategyPlanner> {
    async fn plan_strategies(&self, history: &[String]) -> Result<Vec<StrategyPlan>> {
        self.dispatcher
            .dispatch(
                "planning",
                || self.primary.plan_strategies(history),
                self.fallback
                    .as_ref()
                    .map(|f| move || f.plan_strategies(history)),
            )
            .await
    }

    fn name(&self) -> &str {
        self.primary.name()
    }
}

#[async_trait]
impl Analyzer for Hybrid<dyn Analyzer> {
    async fn analyze(
        &self,
        corpus: &str,
        company_name: &str,
        prior: Option<&Analysis>,
    ) -> Result<Analysis> {
        self.dispatcher
            .dispatch(
                "analysis",
                || self.primary.analyze(corpus, company_name, prior),
                self.fallback
                    .as_ref()
                    .map(|f| move || f.analyze(corpus, company_name, prior)),
            )
            .await
    }

    fn name(&self) -> &str {
        self.primary.name()
    }
}

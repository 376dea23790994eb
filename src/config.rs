//! Configuration loading for Prospector.
//!
//! Configuration follows a precedence chain:
//! 1. Environment variables (highest priority)
//! 2. Project config (`.prospector/config.toml`)
//! 3. User config (`~/.prospector/config.toml`)
//! 4. Defaults (lowest priority)
//!
//! All configuration is optional. The engine runs with the documented
//! defaults when no config exists.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::error::{ProspectorError, Result};
use crate::util::write_atomic;

/// Main configuration struct for Prospector.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Growth cycle scheduling.
    pub scheduler: SchedulerConfig,
    /// Per-dependency circuit breakers.
    pub breaker: BreakerConfig,
    /// Fixed cooldown durations per trigger site.
    pub cooldown: CooldownConfig,
    /// Retry and fallback policy for network-bound calls.
    pub dispatcher: DispatcherConfig,
    /// Iterative research engine bounds.
    pub research: ResearchConfig,
}

/// Growth cycle scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Consecutive non-rate-limit failures before the cycle disables itself.
    pub max_consecutive_failures: u32,
    /// Delay after a cycle that sourced and processed candidates.
    pub success_delay_secs: u64,
    /// Delay after a cycle that found nothing new.
    pub empty_delay_secs: u64,
    /// Delay after a cycle that only generated a new strategy batch.
    pub planned_delay_secs: u64,
    /// Base delay after a failed cycle, multiplied by the failure count.
    pub failure_delay_secs: u64,
    /// Gap between serial enrichments within one batch.
    pub inter_candidate_delay_secs: u64,
    /// Maximum trace events retained in engine state.
    pub trace_limit: usize,
}

impl SchedulerConfig {
    /// Delay after a failed cycle.
    ///
    /// Grows linearly with the number of consecutive failures so repeated
    /// failures push the next attempt further out.
    pub fn failure_delay(&self, consecutive_failures: u32) -> Duration {
        Duration::from_secs(
            self.failure_delay_secs
                .saturating_mul(u64::from(consecutive_failures.max(1))),
        )
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 3,
            success_delay_secs: 15,
            empty_delay_secs: 45,
            planned_delay_secs: 90,
            failure_delay_secs: 60,
            inter_candidate_delay_secs: 30,
            trace_limit: 200,
        }
    }
}

/// Circuit breaker configuration, shared by every breaker key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BreakerConfig {
    /// Failures that open the breaker.
    pub failure_threshold: u32,
    /// Half-open successes that close it again.
    pub success_threshold: u32,
    /// Seconds an open breaker fails fast before allowing a trial call.
    pub timeout_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout_secs: 60,
        }
    }
}

/// Cooldown durations, one constant per trigger site.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CooldownConfig {
    /// Pause after a sourcing call hits a quota.
    pub sourcing_secs: u64,
    /// Pause after an enrichment call hits a quota.
    pub enrichment_secs: u64,
    /// Pause after a planning call hits a quota.
    pub planning_secs: u64,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            sourcing_secs: 90,
            enrichment_secs: 60,
            planning_secs: 60,
        }
    }
}

/// Hybrid dispatcher retry policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Retries of the primary provider after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay_ms: u64,
    /// Factor applied to the delay after each retry.
    pub backoff_multiplier: f64,
}

impl DispatcherConfig {
    /// Check if a backoff multiplier is valid (finite and >= 1.0).
    pub fn is_valid_multiplier(value: f64) -> bool {
        value.is_finite() && value >= 1.0
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 2000,
            backoff_multiplier: 1.5,
        }
    }
}

/// Iterative research engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResearchConfig {
    /// Enrichment passes per candidate.
    pub max_attempts: u32,
    /// Quality (1-10) at which research stops early.
    pub target_quality: u8,
    /// Quality at or above which a researched lead is qualified.
    pub qualify_min_quality: u8,
}

/// Highest quality score the analysis collaborator can return.
pub const MAX_QUALITY: u8 = 10;

/// Longest delay, cooldown, or breaker timeout accepted from configuration.
pub const MAX_DELAY_SECS: u64 = 7 * 24 * 60 * 60;

/// Most research passes or dispatcher retries accepted from configuration.
pub const MAX_REPEATS: u32 = 10;

const CONFIG_HEADER: &str = "# Prospector configuration
#
# Values here override ~/.prospector/config.toml. Environment variables
# (PROSPECTOR_MAX_FAILURES, PROSPECTOR_TARGET_QUALITY, ...) override both.

";

const DELAY_RULE: &str = "must be at most 604800 (one week)";
const REPEAT_RULE: &str = "must be at most 10";

impl ResearchConfig {
    /// Check if a quality value is on the 1-10 scale.
    pub fn is_valid_quality(value: u8) -> bool {
        (1..=MAX_QUALITY).contains(&value)
    }
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            target_quality: 9,
            qualify_min_quality: 6,
        }
    }
}

impl Config {
    /// Load configuration with full precedence chain.
    pub fn load() -> Self {
        match env::current_dir() {
            Ok(cwd) => Self::load_from_cwd(&cwd),
            Err(_) => {
                let mut config = Config::default();
                if let Some(user_config) = Self::load_user_config() {
                    config = config.merge(user_config);
                }
                config.validate();
                config.apply_env_overrides();
                config
            }
        }
    }

    /// Load configuration with a specific working directory.
    pub fn load_from_cwd(cwd: &Path) -> Self {
        let mut config = Config::default();

        if let Some(user_config) = Self::load_user_config() {
            config = config.merge(user_config);
        }

        if let Some(project_config) = Self::load_project_config(cwd) {
            config = config.merge(project_config);
        }

        config.validate();
        config.apply_env_overrides();

        config
    }

    fn load_user_config() -> Option<Config> {
        let home = prospector_home()?;
        Self::load_from_file(&home.join("config.toml")).ok()
    }

    fn load_project_config(cwd: &Path) -> Option<Config> {
        Self::load_from_file(&project_dir(cwd).join("config.toml")).ok()
    }

    /// Load config from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| ProspectorError::storage(path, e))?;
        toml::from_str(&content).map_err(|e| ProspectorError::config(e.to_string()))
    }

    /// Reset values the engine cannot run with to their defaults.
    ///
    /// Applied to the merged file layers; environment overrides are checked
    /// against the same rules as they are read.
    pub fn validate(&mut self) {
        let d = Config::default();
        let delay = |n: &u64| *n <= MAX_DELAY_SECS;
        let at_least_one = |n: &u32| *n >= 1;

        let s = &mut self.scheduler;
        let ds = d.scheduler;
        keep_valid(
            "scheduler.max_consecutive_failures",
            &mut s.max_consecutive_failures,
            ds.max_consecutive_failures,
            at_least_one,
            "must be >= 1",
        );
        keep_valid(
            "scheduler.success_delay_secs",
            &mut s.success_delay_secs,
            ds.success_delay_secs,
            delay,
            DELAY_RULE,
        );
        keep_valid(
            "scheduler.empty_delay_secs",
            &mut s.empty_delay_secs,
            ds.empty_delay_secs,
            delay,
            DELAY_RULE,
        );
        keep_valid(
            "scheduler.planned_delay_secs",
            &mut s.planned_delay_secs,
            ds.planned_delay_secs,
            delay,
            DELAY_RULE,
        );
        keep_valid(
            "scheduler.failure_delay_secs",
            &mut s.failure_delay_secs,
            ds.failure_delay_secs,
            delay,
            DELAY_RULE,
        );
        keep_valid(
            "scheduler.inter_candidate_delay_secs",
            &mut s.inter_candidate_delay_secs,
            ds.inter_candidate_delay_secs,
            delay,
            DELAY_RULE,
        );
        keep_valid(
            "scheduler.trace_limit",
            &mut s.trace_limit,
            ds.trace_limit,
            |n| *n >= 1,
            "must be >= 1",
        );

        let b = &mut self.breaker;
        let db = d.breaker;
        keep_valid(
            "breaker.failure_threshold",
            &mut b.failure_threshold,
            db.failure_threshold,
            at_least_one,
            "must be >= 1",
        );
        keep_valid(
            "breaker.success_threshold",
            &mut b.success_threshold,
            db.success_threshold,
            at_least_one,
            "must be >= 1",
        );
        keep_valid(
            "breaker.timeout_secs",
            &mut b.timeout_secs,
            db.timeout_secs,
            delay,
            DELAY_RULE,
        );

        let c = &mut self.cooldown;
        let dc = d.cooldown;
        keep_valid(
            "cooldown.sourcing_secs",
            &mut c.sourcing_secs,
            dc.sourcing_secs,
            delay,
            DELAY_RULE,
        );
        keep_valid(
            "cooldown.enrichment_secs",
            &mut c.enrichment_secs,
            dc.enrichment_secs,
            delay,
            DELAY_RULE,
        );
        keep_valid(
            "cooldown.planning_secs",
            &mut c.planning_secs,
            dc.planning_secs,
            delay,
            DELAY_RULE,
        );

        let p = &mut self.dispatcher;
        let dp = d.dispatcher;
        keep_valid(
            "dispatcher.max_retries",
            &mut p.max_retries,
            dp.max_retries,
            |n| *n <= MAX_REPEATS,
            REPEAT_RULE,
        );
        keep_valid(
            "dispatcher.initial_delay_ms",
            &mut p.initial_delay_ms,
            dp.initial_delay_ms,
            |n| *n <= MAX_DELAY_SECS * 1000,
            DELAY_RULE,
        );
        keep_valid(
            "dispatcher.backoff_multiplier",
            &mut p.backoff_multiplier,
            dp.backoff_multiplier,
            |n| DispatcherConfig::is_valid_multiplier(*n),
            "must be a finite number >= 1.0",
        );

        let r = &mut self.research;
        let dr = d.research;
        keep_valid(
            "research.max_attempts",
            &mut r.max_attempts,
            dr.max_attempts,
            |n| (1..=MAX_REPEATS).contains(n),
            "must be in range [1, 10]",
        );
        keep_valid(
            "research.target_quality",
            &mut r.target_quality,
            dr.target_quality,
            |n| ResearchConfig::is_valid_quality(*n),
            "must be in range [1, 10]",
        );
        keep_valid(
            "research.qualify_min_quality",
            &mut r.qualify_min_quality,
            dr.qualify_min_quality,
            |n| ResearchConfig::is_valid_quality(*n),
            "must be in range [1, 10]",
        );
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        env_override(
            "PROSPECTOR_MAX_FAILURES",
            &mut self.scheduler.max_consecutive_failures,
            |n| *n >= 1,
            "must be >= 1",
        );
        env_override(
            "PROSPECTOR_INTER_CANDIDATE_DELAY",
            &mut self.scheduler.inter_candidate_delay_secs,
            |n| *n <= MAX_DELAY_SECS,
            DELAY_RULE,
        );
        env_override(
            "PROSPECTOR_BREAKER_FAILURES",
            &mut self.breaker.failure_threshold,
            |n| *n >= 1,
            "must be >= 1",
        );
        env_override(
            "PROSPECTOR_BREAKER_TIMEOUT",
            &mut self.breaker.timeout_secs,
            |n| *n <= MAX_DELAY_SECS,
            DELAY_RULE,
        );
        env_override(
            "PROSPECTOR_MAX_RETRIES",
            &mut self.dispatcher.max_retries,
            |n| *n <= MAX_REPEATS,
            REPEAT_RULE,
        );
        env_override(
            "PROSPECTOR_BACKOFF_MULTIPLIER",
            &mut self.dispatcher.backoff_multiplier,
            |n| DispatcherConfig::is_valid_multiplier(*n),
            "must be a finite number >= 1.0",
        );
        env_override(
            "PROSPECTOR_MAX_ATTEMPTS",
            &mut self.research.max_attempts,
            |n| (1..=MAX_REPEATS).contains(n),
            "must be in range [1, 10]",
        );
        env_override(
            "PROSPECTOR_TARGET_QUALITY",
            &mut self.research.target_quality,
            |n| ResearchConfig::is_valid_quality(*n),
            "must be in range [1, 10]",
        );
    }

    /// Merge another config into this one.
    ///
    /// Field-by-field: every value in `other` that differs from the default
    /// overrides `self`. As a consequence a higher layer cannot set a value
    /// back to its default once a lower layer changed it.
    fn merge(mut self, other: Config) -> Self {
        let d = SchedulerConfig::default();
        let o = other.scheduler;
        merge_field(
            &mut self.scheduler.max_consecutive_failures,
            o.max_consecutive_failures,
            d.max_consecutive_failures,
        );
        merge_field(
            &mut self.scheduler.success_delay_secs,
            o.success_delay_secs,
            d.success_delay_secs,
        );
        merge_field(&mut self.scheduler.empty_delay_secs, o.empty_delay_secs, d.empty_delay_secs);
        merge_field(
            &mut self.scheduler.planned_delay_secs,
            o.planned_delay_secs,
            d.planned_delay_secs,
        );
        merge_field(
            &mut self.scheduler.failure_delay_secs,
            o.failure_delay_secs,
            d.failure_delay_secs,
        );
        merge_field(
            &mut self.scheduler.inter_candidate_delay_secs,
            o.inter_candidate_delay_secs,
            d.inter_candidate_delay_secs,
        );
        merge_field(&mut self.scheduler.trace_limit, o.trace_limit, d.trace_limit);

        let d = BreakerConfig::default();
        let o = other.breaker;
        merge_field(&mut self.breaker.failure_threshold, o.failure_threshold, d.failure_threshold);
        merge_field(&mut self.breaker.success_threshold, o.success_threshold, d.success_threshold);
        merge_field(&mut self.breaker.timeout_secs, o.timeout_secs, d.timeout_secs);

        let d = CooldownConfig::default();
        let o = other.cooldown;
        merge_field(&mut self.cooldown.sourcing_secs, o.sourcing_secs, d.sourcing_secs);
        merge_field(&mut self.cooldown.enrichment_secs, o.enrichment_secs, d.enrichment_secs);
        merge_field(&mut self.cooldown.planning_secs, o.planning_secs, d.planning_secs);

        let d = DispatcherConfig::default();
        let o = other.dispatcher;
        merge_field(&mut self.dispatcher.max_retries, o.max_retries, d.max_retries);
        merge_field(&mut self.dispatcher.initial_delay_ms, o.initial_delay_ms, d.initial_delay_ms);
        merge_field(
            &mut self.dispatcher.backoff_multiplier,
            o.backoff_multiplier,
            d.backoff_multiplier,
        );

        let d = ResearchConfig::default();
        let o = other.research;
        merge_field(&mut self.research.max_attempts, o.max_attempts, d.max_attempts);
        merge_field(&mut self.research.target_quality, o.target_quality, d.target_quality);
        merge_field(
            &mut self.research.qualify_min_quality,
            o.qualify_min_quality,
            d.qualify_min_quality,
        );

        self
    }

    /// Save configuration to the project config file.
    ///
    /// Writes `.prospector/config.toml` under `cwd` using temp file + rename,
    /// with a short header describing the precedence chain.
    pub fn save_project(&self, cwd: &Path) -> Result<PathBuf> {
        let dir = project_dir(cwd);
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| ProspectorError::storage(&dir, e))?;
        }

        let config_path = dir.join("config.toml");
        let content =
            toml::to_string_pretty(self).map_err(|e| ProspectorError::config(e.to_string()))?;
        write_atomic(&config_path, format!("{}{}", CONFIG_HEADER, content).as_bytes())?;

        Ok(config_path)
    }
}

fn merge_field<T: PartialEq>(slot: &mut T, other: T, default: T) {
    if other != default {
        *slot = other;
    }
}

/// Parse `name` from the environment into `slot`, keeping the current value
/// on parse or validation failure.
fn env_override<T>(name: &str, slot: &mut T, valid: impl Fn(&T) -> bool, rule: &str)
where
    T: FromStr + Display,
{
    let Ok(raw) = env::var(name) else {
        return;
    };
    match raw.parse::<T>() {
        Ok(value) if valid(&value) => *slot = value,
        Ok(value) => warn!(
            "Invalid {} value '{}'. {}. Using '{}'.",
            name, value, rule, slot
        ),
        Err(_) => warn!("Invalid {} value '{}'. Using '{}'.", name, raw, slot),
    }
}

/// Replace `slot` with `default` when it breaks `valid`.
fn keep_valid<T: Display>(
    key: &str,
    slot: &mut T,
    default: T,
    valid: impl Fn(&T) -> bool,
    rule: &str,
) {
    if !valid(slot) {
        warn!(
            "Invalid {} value '{}'. {}. Using '{}'.",
            key, slot, rule, default
        );
        *slot = default;
    }
}

/// Get the Prospector home directory.
///
/// Checks `PROSPECTOR_HOME` first, then falls back to `~/.prospector`.
pub fn prospector_home() -> Option<PathBuf> {
    if let Ok(home) = env::var("PROSPECTOR_HOME") {
        if home.is_empty() {
            warn!("PROSPECTOR_HOME is empty, using default");
        } else {
            let path = PathBuf::from(&home);
            if path.is_absolute() {
                return Some(path);
            }
            if let Ok(canonical) = path.canonicalize() {
                return Some(canonical);
            }
            warn!("PROSPECTOR_HOME is relative and doesn't exist, using as-is");
            return Some(path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        return Some(home.join(".prospector"));
    }

    let fallback = std::env::temp_dir().join("prospector");
    warn!(
        "HOME not set, using fallback location: {}",
        fallback.display()
    );
    Some(fallback)
}

/// Get the project `.prospector/` directory for a working directory.
///
/// Walks up from `cwd` to the nearest ancestor that already has one, and
/// falls back to `cwd/.prospector`.
pub fn project_dir(cwd: &Path) -> PathBuf {
    for ancestor in cwd.ancestors() {
        let candidate = ancestor.join(".prospector");
        if candidate.is_dir() {
            return candidate;
        }
    }
    cwd.join(".prospector")
}

/// Get the data directory used by the file store.
///
/// Returns `<prospector_home>/data/`.
pub fn data_dir() -> Option<PathBuf> {
    prospector_home().map(|h| h.join("data"))
}

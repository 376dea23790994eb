//! Global cooldown window.
//!
//! Any rate-limit signal pauses the whole growth cycle for a fixed duration
//! chosen by the call site. The window is a deadline, so it survives
//! process restarts when persisted with the engine state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::CooldownConfig;

/// Where a rate-limit signal came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownSite {
    Sourcing,
    Planning,
    Enrichment,
}

impl CooldownSite {
    /// Fixed pause for this trigger site.
    pub fn duration_secs(&self, config: &CooldownConfig) -> u64 {
        match self {
            CooldownSite::Sourcing => config.sourcing_secs,
            CooldownSite::Planning => config.planning_secs,
            CooldownSite::Enrichment => config.enrichment_secs,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CooldownSite::Sourcing => "sourcing",
            CooldownSite::Planning => "planning",
            CooldownSite::Enrichment => "enrichment",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CooldownWindow {
    /// When the cycle may run again.
    pub until: Option<DateTime<Utc>>,
    /// Length of the window when it was engaged.
    pub max_secs: u64,
    pub triggered_by: Option<CooldownSite>,
}

impl CooldownWindow {
    /// Start (or extend) the cooldown for `site`.
    ///
    /// A signal never shortens a window that is already running longer.
    /// Returns the seconds remaining afterwards.
    pub fn engage(
        &mut self,
        site: CooldownSite,
        config: &CooldownConfig,
        now: DateTime<Utc>,
    ) -> u64 {
        let secs = site.duration_secs(config);
        let deadline = i64::try_from(secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|window| now.checked_add_signed(window))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        if self.until.is_none_or(|until| deadline >= until) {
            self.until = Some(deadline);
            self.max_secs = secs;
            self.triggered_by = Some(site);
        }
        self.remaining_secs(now)
    }

    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        match self.until {
            Some(until) if until > now => {
                let millis = until.signed_duration_since(now).num_milliseconds();
                // Round up so a window never reports 0 while still active.
                ((millis + 999) / 1000) as u64
            }
            _ => 0,
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.remaining_secs(now) > 0
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

//! Persistence traits for Prospector.
//!
//! This module defines the `ProspectStore` trait through which the growth
//! cycle reads and writes leads and its own engine state.

use std::collections::HashSet;
use std::sync::Arc;

use crate::core::{normalize_website, EngineState, Lead, LeadStatus};
use crate::error::{ProspectorError, Result};

/// Trait for lead and engine-state storage backends.
pub trait ProspectStore: Send + Sync {
    /// Retrieve a lead by ID.
    ///
    /// Returns `Ok(None)` if the lead doesn't exist.
    fn get_lead(&self, id: &str) -> Result<Option<Lead>>;

    /// Create or update a lead.
    ///
    /// Fails with `InvalidState` if the ID already belongs to a different
    /// lead (see [`check_same_lead`]).
    fn put_lead(&self, lead: &Lead) -> Result<()>;

    /// All leads, oldest first.
    fn list_leads(&self) -> Result<Vec<Lead>>;

    /// Load the persisted engine state, if any has been saved.
    fn load_engine(&self) -> Result<Option<EngineState>>;

    /// Persist the engine state.
    fn save_engine(&self, state: &EngineState) -> Result<()>;

    /// Normalized websites of every stored lead.
    fn known_websites(&self) -> Result<HashSet<String>> {
        Ok(self
            .list_leads()?
            .iter()
            .map(|lead| normalize_website(&lead.website))
            .filter(|site| !site.is_empty())
            .collect())
    }

    /// IDs of every stored lead.
    fn lead_ids(&self) -> Result<Vec<String>> {
        Ok(self.list_leads()?.into_iter().map(|lead| lead.id).collect())
    }

    /// Leads with the given status, oldest first.
    fn leads_with_status(&self, status: LeadStatus) -> Result<Vec<Lead>> {
        Ok(self
            .list_leads()?
            .into_iter()
            .filter(|lead| lead.status == status)
            .collect())
    }

    /// Leads from `strategy_id` whose research has not finished, oldest first.
    fn unfinished_leads(&self, strategy_id: &str) -> Result<Vec<Lead>> {
        Ok(self
            .list_leads()?
            .into_iter()
            .filter(|lead| lead.found_via == strategy_id && lead.status.is_unfinished())
            .collect())
    }
}

/// Blanket implementation so `Arc<T>` can be shared between the cycle and
/// tests that inspect the store afterwards.
impl<T: ProspectStore + ?Sized> ProspectStore for Arc<T> {
    fn get_lead(&self, id: &str) -> Result<Option<Lead>> {
        (**self).get_lead(id)
    }

    fn put_lead(&self, lead: &Lead) -> Result<()> {
        (**self).put_lead(lead)
    }

    fn list_leads(&self) -> Result<Vec<Lead>> {
        (**self).list_leads()
    }

    fn load_engine(&self) -> Result<Option<EngineState>> {
        (**self).load_engine()
    }

    fn save_engine(&self, state: &EngineState) -> Result<()> {
        (**self).save_engine(state)
    }

    fn known_websites(&self) -> Result<HashSet<String>> {
        (**self).known_websites()
    }

    fn lead_ids(&self) -> Result<Vec<String>> {
        (**self).lead_ids()
    }
}

/// Refuse to overwrite `stored` with a lead that merely shares its ID.
///
/// Updates keep the creation time and website of the stored lead.
pub(crate) fn check_same_lead(stored: &Lead, incoming: &Lead) -> Result<()> {
    if stored.created_at == incoming.created_at && stored.website == incoming.website {
        return Ok(());
    }
    Err(ProspectorError::invalid_state(format!(
        "lead id {} already belongs to {} ({})",
        stored.id, stored.name, stored.website
    )))
}

/// Sort leads oldest first, breaking ties by ID.
pub(crate) fn sort_oldest_first(leads: &mut [Lead]) {
    leads.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}

//! In-memory storage for testing.
//!
//! This module provides a thread-safe in-memory implementation of the
//! ProspectStore trait, primarily for use in unit tests.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::core::{EngineState, Lead};
use crate::error::Result;
use crate::storage::traits::{check_same_lead, sort_oldest_first};
use crate::storage::ProspectStore;

/// In-memory lead and engine store.
///
/// Data is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct MemoryProspectStore {
    leads: RwLock<HashMap<String, Lead>>,
    engine: RwLock<Option<EngineState>>,
}

impl MemoryProspectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with leads.
    pub fn with_leads(leads: impl IntoIterator<Item = Lead>) -> Self {
        let store = Self::new();
        {
            let mut map = store.leads.write().unwrap_or_else(PoisonError::into_inner);
            for lead in leads {
                map.insert(lead.id.clone(), lead);
            }
        }
        store
    }

    /// Number of leads in the store.
    pub fn len(&self) -> usize {
        self.leads.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProspectStore for MemoryProspectStore {
    fn get_lead(&self, id: &str) -> Result<Option<Lead>> {
        let leads = self.leads.read().unwrap_or_else(PoisonError::into_inner);
        Ok(leads.get(id).cloned())
    }

    fn put_lead(&self, lead: &Lead) -> Result<()> {
        let mut leads = self.leads.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(stored) = leads.get(&lead.id) {
            check_same_lead(stored, lead)?;
        }
        leads.insert(lead.id.clone(), lead.clone());
        Ok(())
    }

    fn list_leads(&self) -> Result<Vec<Lead>> {
        let leads = self.leads.read().unwrap_or_else(PoisonError::into_inner);
        let mut result: Vec<Lead> = leads.values().cloned().collect();
        sort_oldest_first(&mut result);
        Ok(result)
    }

    fn load_engine(&self) -> Result<Option<EngineState>> {
        Ok(self
            .engine
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save_engine(&self, state: &EngineState) -> Result<()> {
        *self.engine.write().unwrap_or_else(PoisonError::into_inner) = Some(state.clone());
        Ok(())
    }
}

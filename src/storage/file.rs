//! File-based storage for Prospector.
//!
//! Leads are stored as JSON files in `<dir>/leads/`, the engine state as
//! `<dir>/engine.json`. Writes go through a temp file + rename.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::data_dir;
use crate::core::{EngineState, Lead};
use crate::error::{ProspectorError, Result};
use crate::storage::traits::{check_same_lead, sort_oldest_first};
use crate::storage::ProspectStore;
use crate::util::{read_to_string_limited, write_atomic};

const LEADS_DIR: &str = "leads";
const ENGINE_FILE: &str = "engine.json";

/// File-based lead and engine store.
#[derive(Debug, Clone)]
pub struct FileProspectStore {
    root: PathBuf,
}

impl FileProspectStore {
    /// Create a store in the default data directory.
    ///
    /// Uses `~/.prospector/data/` or `$PROSPECTOR_HOME/data/`.
    pub fn new() -> Result<Self> {
        let dir = data_dir().ok_or_else(|| {
            ProspectorError::config("Could not determine data directory (no home directory)")
        })?;
        Self::with_dir(dir)
    }

    /// Create a store rooted at a custom directory.
    pub fn with_dir(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let leads_dir = root.join(LEADS_DIR);
        if !leads_dir.exists() {
            fs::create_dir_all(&leads_dir).map_err(|e| ProspectorError::storage(&leads_dir, e))?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn lead_path(&self, id: &str) -> PathBuf {
        self.root.join(LEADS_DIR).join(format!("{}.json", id))
    }

    fn engine_path(&self) -> PathBuf {
        self.root.join(ENGINE_FILE)
    }

    fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = read_to_string_limited(path)?;
        let value = serde_json::from_str(&content)
            .map_err(|e| ProspectorError::serde(format!("{}: {}", path.display(), e)))?;
        Ok(Some(value))
    }
}

impl ProspectStore for FileProspectStore {
    fn get_lead(&self, id: &str) -> Result<Option<Lead>> {
        Self::read_json(&self.lead_path(id))
    }

    fn put_lead(&self, lead: &Lead) -> Result<()> {
        let path = self.lead_path(&lead.id);
        if let Some(stored) = Self::read_json::<Lead>(&path)? {
            check_same_lead(&stored, lead)?;
        }
        let json = serde_json::to_string_pretty(lead)?;
        write_atomic(&path, json.as_bytes())
    }

    fn list_leads(&self) -> Result<Vec<Lead>> {
        let dir = self.root.join(LEADS_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&dir).map_err(|e| ProspectorError::storage(&dir, e))?;
        let mut leads = Vec::new();

        for entry in entries {
            let path = entry.map_err(|e| ProspectorError::storage(&dir, e))?.path();

            // Skip non-JSON files and temp files
            if path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            if path
                .file_name()
                .map(|n| n.to_string_lossy().starts_with('.'))
                .unwrap_or(true)
            {
                continue;
            }

            match Self::read_json::<Lead>(&path) {
                Ok(Some(lead)) => leads.push(lead),
                Ok(None) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable lead file")
                }
            }
        }

        sort_oldest_first(&mut leads);
        Ok(leads)
    }

    fn load_engine(&self) -> Result<Option<EngineState>> {
        Self::read_json(&self.engine_path())
    }

    fn save_engine(&self, state: &EngineState) -> Result<()> {
        let json = serde_json::to_string_pretty(state)?;
        write_atomic(&self.engine_path(), json.as_bytes())
    }
}

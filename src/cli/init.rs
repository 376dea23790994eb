//! Init command for Prospector.
//!
//! Scaffolds the project configuration, the data directory, and optionally
//! a demo replay fixture.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::run::write_fixture;
use crate::config::{project_dir, Config};

/// Options for the init command.
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Force overwrite existing files.
    pub force: bool,
    /// Also write the demo replay fixture.
    pub demo: bool,
}

/// Output format for the init command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitOutput {
    /// Whether initialization was successful.
    pub success: bool,
    /// Files and directories created.
    pub created: Vec<String>,
    /// Files that already existed (skipped).
    pub skipped: Vec<String>,
    /// Error message if initialization failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InitOutput {
    /// Create a successful output.
    pub fn success(created: Vec<String>, skipped: Vec<String>) -> Self {
        Self {
            success: true,
            created,
            skipped,
            error: None,
        }
    }

    /// Create a failed output, keeping what was created before the failure.
    pub fn failure(error: impl Into<String>, created: Vec<String>, skipped: Vec<String>) -> Self {
        Self {
            success: false,
            created,
            skipped,
            error: Some(error.into()),
        }
    }
}

const DEMO_FIXTURE: &str = include_str!("../../demos/replay.json");

/// The init command implementation.
pub struct InitCommand {
    cwd: PathBuf,
    data_dir: Option<PathBuf>,
}

impl InitCommand {
    /// Create a new init command. `data_dir` is the file store root, if known.
    pub fn new(cwd: impl Into<PathBuf>, data_dir: Option<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            data_dir,
        }
    }

    /// Run the init command.
    pub fn run(&self, options: &InitOptions) -> InitOutput {
        let mut created = Vec::new();
        let mut skipped = Vec::new();

        let dir = project_dir(&self.cwd);
        match ensure_dir(&dir) {
            Ok(true) => created.push(dir.display().to_string()),
            Ok(false) => skipped.push(dir.display().to_string()),
            Err(e) => return InitOutput::failure(e, created, skipped),
        }

        let config_path = dir.join("config.toml");
        if config_path.exists() && !options.force {
            skipped.push(config_path.display().to_string());
        } else {
            match Config::default().save_project(&self.cwd) {
                Ok(path) => created.push(path.display().to_string()),
                Err(e) => return InitOutput::failure(e.to_string(), created, skipped),
            }
        }

        if let Some(data) = &self.data_dir {
            for path in [data.clone(), data.join("leads")] {
                match ensure_dir(&path) {
                    Ok(true) => created.push(path.display().to_string()),
                    Ok(false) => skipped.push(path.display().to_string()),
                    Err(e) => return InitOutput::failure(e, created, skipped),
                }
            }
        }

        if options.demo {
            let fixture = dir.join("replay.json");
            if fixture.exists() && !options.force {
                skipped.push(fixture.display().to_string());
            } else {
                match write_fixture(&self.cwd, DEMO_FIXTURE) {
                    Ok(path) => created.push(path.display().to_string()),
                    Err(e) => return InitOutput::failure(e.to_string(), created, skipped),
                }
            }
        }

        InitOutput::success(created, skipped)
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &InitOutput, options: &InitOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &InitOutput) -> String {
        let mut lines = Vec::new();

        if !output.success {
            lines.push(format!(
                "Init failed: {}",
                output.error.as_deref().unwrap_or("unknown error")
            ));
            if !output.created.is_empty() {
                lines.push(String::new());
                lines.push("Partially created before failure:".to_string());
                lines.extend(output.created.iter().map(|p| format!("  {}", p)));
            }
            return lines.join("\n") + "\n";
        }

        if !output.created.is_empty() {
            lines.push("Created:".to_string());
            lines.extend(output.created.iter().map(|p| format!("  {}", p)));
        }
        if !output.skipped.is_empty() {
            lines.push("Already exists (skipped):".to_string());
            lines.extend(output.skipped.iter().map(|p| format!("  {}", p)));
        }

        lines.push(String::new());
        lines.push("Prospector initialized.".to_string());
        lines.join("\n") + "\n"
    }
}

/// Returns Ok(true) if created, Ok(false) if it already existed.
fn ensure_dir(path: &Path) -> Result<bool, String> {
    if path.exists() {
        if path.is_dir() {
            return Ok(false);
        }
        return Err(format!("{} exists but is not a directory", path.display()));
    }

    fs::create_dir_all(path)
        .map_err(|e| format!("Failed to create directory {}: {}", path.display(), e))?;
    Ok(true)
}

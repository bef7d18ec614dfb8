//! Prompt Loader
//!
//! Loads the planner's templates from the configured prompt directory, falling
//! back to the embedded defaults file by file.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::embedded;

pub const SYSTEM_FILE: &str = "system-prompt.txt";
pub const PLANNING_FILE: &str = "task-planning.txt";
pub const ERROR_FIXING_FILE: &str = "error-fixing.txt";
pub const ANALYSIS_FILE: &str = "task-analysis.txt";

/// The four templates a planner needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    /// System role for planning calls
    pub system: String,
    /// Template for attempt 1
    pub planning: String,
    /// Template for attempts 2..n
    pub error_fixing: String,
    /// System role for the task analyzer
    pub analysis: String,
}

impl PromptSet {
    /// Templates compiled into the binary
    pub fn embedded() -> Self {
        debug!("PromptSet::embedded: called");
        Self {
            system: embedded::SYSTEM.to_string(),
            planning: embedded::TASK_PLANNING.to_string(),
            error_fixing: embedded::ERROR_FIXING.to_string(),
            analysis: embedded::TASK_ANALYSIS.to_string(),
        }
    }

    /// Load templates from `dir`; each missing or unreadable file falls back to its embedded default
    pub fn load(dir: impl AsRef<Path>) -> Self {
        let loader = PromptLoader::new(dir);
        Self {
            system: loader.load_template(SYSTEM_FILE),
            planning: loader.load_template(PLANNING_FILE),
            error_fixing: loader.load_template(ERROR_FIXING_FILE),
            analysis: loader.load_template(ANALYSIS_FILE),
        }
    }
}

/// Reads template files from one directory
pub struct PromptLoader {
    dir: Option<PathBuf>,
}

impl PromptLoader {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let exists = dir.is_dir();
        debug!(?dir, %exists, "PromptLoader::new: called");
        if !exists {
            info!("Prompt directory {} not found, using embedded prompts", dir.display());
        }
        Self {
            dir: if exists { Some(dir.to_path_buf()) } else { None },
        }
    }

    /// Load a template by file name
    ///
    /// Checks in order:
    /// 1. `{dir}/{name}`
    /// 2. Embedded fallback
    pub fn load_template(&self, name: &str) -> String {
        debug!(%name, "PromptLoader::load_template: called");
        if let Some(ref dir) = self.dir {
            let path = dir.join(name);
            if path.exists() {
                match std::fs::read_to_string(&path) {
                    Ok(content) => {
                        debug!(?path, "PromptLoader::load_template: loaded from directory");
                        return content;
                    }
                    Err(e) => {
                        warn!("Failed to read prompt {}: {}, using embedded default", path.display(), e);
                    }
                }
            } else {
                debug!(?path, "PromptLoader::load_template: not found in directory");
            }
        }

        embedded::get_embedded(name).map(str::to_string).unwrap_or_default()
    }
}

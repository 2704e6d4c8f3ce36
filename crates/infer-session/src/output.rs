use std::path::{Path, PathBuf};

use infer_core::{InferError, InferResult, RunSummary};

pub const AUTOMATON_FILE: &str = "automata.dot";
pub const STATS_FILE: &str = "stats";
pub const LEARNER_LOG: &str = "learner_ongoing";
pub const CONFIGURATION_FILE: &str = "configuration";
pub const SUMMARY_FILE: &str = "run.json";

/// One session's output directory.
#[derive(Debug, Clone)]
pub struct OutputDir {
    root: PathBuf,
}

impl OutputDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn automaton(&self) -> PathBuf {
        self.root.join(AUTOMATON_FILE)
    }

    pub fn stats(&self) -> PathBuf {
        self.root.join(STATS_FILE)
    }

    pub fn learner_log(&self) -> PathBuf {
        self.root.join(LEARNER_LOG)
    }

    pub fn configuration(&self) -> PathBuf {
        self.root.join(CONFIGURATION_FILE)
    }

    pub fn summary(&self) -> PathBuf {
        self.root.join(SUMMARY_FILE)
    }

    /// Refuse a directory that already holds a learned automaton.
    pub fn ensure_fresh(&self) -> InferResult<()> {
        let automaton = self.automaton();
        if automaton.exists() {
            return Err(InferError::AlreadyCompleted(automaton));
        }
        Ok(())
    }

    /// Create the directory and return its absolute path.
    pub fn prepare(&self) -> InferResult<PathBuf> {
        std::fs::create_dir_all(&self.root)?;
        Ok(std::fs::canonicalize(&self.root)?)
    }

    pub fn write_configuration(&self, content: &str) -> InferResult<()> {
        std::fs::write(self.configuration(), content)?;
        Ok(())
    }

    pub fn write_summary(&self, summary: &RunSummary) -> InferResult<()> {
        let json = serde_json::to_string_pretty(summary)?;
        std::fs::write(self.summary(), json)?;
        Ok(())
    }
}

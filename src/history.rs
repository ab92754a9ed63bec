use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const MAX_ENTRIES: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub question: String,
    pub sql: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub elapsed_ms: u64,
    pub success: bool,
}

/// Questions asked from the dashboard, oldest first.
#[derive(Debug, Serialize, Deserialize)]
pub struct QuestionHistory {
    entries: Vec<HistoryEntry>,
    #[serde(skip)]
    current_index: Option<usize>,
    #[serde(default = "default_max_entries")]
    max_entries: usize,
}

fn default_max_entries() -> usize {
    MAX_ENTRIES
}

impl Default for QuestionHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl QuestionHistory {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            current_index: None,
            max_entries: MAX_ENTRIES,
        }
    }

    pub fn add(&mut self, entry: HistoryEntry) {
        // Don't add duplicate consecutive entries
        if let Some(last) = self.entries.last() {
            if last.question.trim() == entry.question.trim() {
                return;
            }
        }

        self.entries.push(entry);

        if self.entries.len() > self.max_entries {
            let excess = self.entries.len() - self.max_entries;
            self.entries.drain(..excess);
        }

        self.current_index = None;
    }

    /// Step back through earlier questions, stopping at the oldest.
    pub fn previous(&mut self) -> Option<&HistoryEntry> {
        if self.entries.is_empty() {
            return None;
        }

        let idx = match self.current_index {
            Some(i) if i > 0 => i - 1,
            Some(i) => i,
            None => self.entries.len() - 1,
        };

        self.current_index = Some(idx);
        self.entries.get(idx)
    }

    pub fn next(&mut self) -> Option<&HistoryEntry> {
        let idx = match self.current_index {
            Some(i) if i + 1 < self.entries.len() => i + 1,
            _ => {
                self.current_index = None;
                return None;
            }
        };

        self.current_index = Some(idx);
        self.entries.get(idx)
    }

    pub fn reset_navigation(&mut self) {
        self.current_index = None;
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pgask")
            .join("history.json")
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let history: QuestionHistory = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(history)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

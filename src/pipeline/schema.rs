use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::db::{DbError, SqlDatabase};

/// Tables the database reports as usable.
pub async fn list_tables(db: &dyn SqlDatabase) -> Result<Vec<String>, DbError> {
    let tables = db.usable_table_names().await?;
    debug!(count = tables.len(), "listed tables");
    Ok(tables)
}

/// Schema text for a `", "`-separated list of table names.
pub async fn get_schema(db: &dyn SqlDatabase, table_names: &str) -> Result<String, DbError> {
    let names: Vec<String> = table_names
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    db.table_info(&names).await
}

/// Which tables get described to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaScope {
    /// Every table `list_tables` returned.
    Discovered,
    /// Discovered tables named in the question; all of them when none are.
    Mentioned,
    /// A literal list, independent of the question and of discovery.
    Fixed(Vec<String>),
}

impl SchemaScope {
    pub fn select(&self, question: &str, discovered: &[String]) -> Vec<String> {
        match self {
            SchemaScope::Discovered => discovered.to_vec(),
            SchemaScope::Fixed(tables) => tables.clone(),
            SchemaScope::Mentioned => {
                let words = question_words(question);
                let phrase = words.join(" ");
                let mentioned: Vec<String> = discovered
                    .iter()
                    .filter(|table| mentions(&words, &phrase, table))
                    .cloned()
                    .collect();
                if mentioned.is_empty() {
                    discovered.to_vec()
                } else {
                    mentioned
                }
            }
        }
    }
}

fn question_words(question: &str) -> Vec<String> {
    question
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

fn mentions(words: &[String], phrase: &str, table: &str) -> bool {
    let name = table.to_lowercase();
    if name.contains('_') {
        let spaced = name.replace('_', " ");
        if phrase.contains(&spaced) || phrase.contains(&format!("{}s", spaced)) {
            return true;
        }
    }
    words.iter().any(|w| {
        *w == name
            || *w == format!("{}s", name)
            || *w == format!("{}es", name)
            || name == format!("{}s", w)
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    #[default]
    Discovered,
    Mentioned,
    Fixed,
}

/// `[schema]` section of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub scope: ScopeKind,
    /// Table list for `scope = "fixed"`
    pub tables: Vec<String>,
    /// Sample rows shown per table; 0 disables the sample block
    pub sample_rows: usize,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            scope: ScopeKind::Discovered,
            tables: Vec::new(),
            sample_rows: 3,
        }
    }
}

impl SchemaConfig {
    pub fn scope(&self) -> SchemaScope {
        match self.scope {
            ScopeKind::Discovered => SchemaScope::Discovered,
            ScopeKind::Mentioned => SchemaScope::Mentioned,
            ScopeKind::Fixed => SchemaScope::Fixed(self.tables.clone()),
        }
    }
}

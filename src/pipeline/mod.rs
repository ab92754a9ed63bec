//! The question-answering pipeline.
//!
//! Five steps run in a fixed order, each reading and writing named fields of
//! a [`PipelineState`]:
//!
//! ```text
//! ListTables -> GetSchema -> GenerateSql -> RunQuery -> GenerateResponse
//! ```
//!
//! Only `RunQuery` absorbs failures (into [`QueryOutcome::Failure`]); any
//! other step failing aborts the run with a [`PipelineError`].

mod executor;
mod narrator;
mod schema;
mod sql;

pub use executor::*;
pub use narrator::*;
pub use schema::*;
pub use sql::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use crate::db::{DbError, SqlDatabase};
use crate::llm::{LanguageModel, LlmError};

/// Canned questions offered by the dashboard and `GET /examples`.
pub const EXAMPLE_QUESTIONS: [&str; 5] = [
    "How many customers are from the USA?",
    "What is the total revenue from all invoices?",
    "Which genre has the most tracks?",
    "Who are the top 5 customers by total purchases?",
    "What is the average track length by genre?",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    ListTables,
    GetSchema,
    GenerateSql,
    RunQuery,
    GenerateResponse,
}

impl Step {
    pub const ALL: [Step; 5] = [
        Step::ListTables,
        Step::GetSchema,
        Step::GenerateSql,
        Step::RunQuery,
        Step::GenerateResponse,
    ];

    /// Prefix of this step's transcript entry.
    pub fn label(&self) -> &'static str {
        match self {
            Step::ListTables => "Available tables: ",
            Step::GetSchema => "Schema info: ",
            Step::GenerateSql => "Generated SQL: ",
            Step::RunQuery => "Query result: ",
            Step::GenerateResponse => "Natural language response: ",
        }
    }

    /// `text` trimmed, without leading echoes of this step's label. Models
    /// sometimes start a reply with the label they saw in an example.
    pub fn strip_label<'a>(&self, text: &'a str) -> &'a str {
        let label = self.label().trim_end();
        let mut rest = text.trim();
        while rest
            .get(..label.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(label))
        {
            rest = rest[label.len()..].trim_start();
        }
        rest
    }

    /// Short present-tense description for progress displays.
    pub fn progress(&self) -> &'static str {
        match self {
            Step::ListTables => "Listing tables",
            Step::GetSchema => "Reading schema",
            Step::GenerateSql => "Writing SQL",
            Step::RunQuery => "Running query",
            Step::GenerateResponse => "Composing answer",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Step::ListTables => 0,
            Step::GetSchema => 1,
            Step::GenerateSql => 2,
            Step::RunQuery => 3,
            Step::GenerateResponse => 4,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::ListTables => "list_tables",
            Step::GetSchema => "get_schema",
            Step::GenerateSql => "generate_sql",
            Step::RunQuery => "run_query",
            Step::GenerateResponse => "generate_response",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One line of the run's transcript. Display only.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEntry {
    pub role: Role,
    pub step: Option<Step>,
    pub content: String,
}

/// The three user-facing fields of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedResult {
    pub sql_query: String,
    pub output: String,
    pub natural_language_response: String,
}

/// Everything a run produced, field by field.
#[derive(Debug, Clone)]
pub struct PipelineState {
    question: String,
    pub tables: Vec<String>,
    /// Tables whose schema was handed to the model
    pub schema_tables: Vec<String>,
    pub schema: String,
    pub sql: String,
    /// Tables the generated SQL touches, best effort
    pub referenced_tables: Vec<String>,
    pub outcome: Option<QueryOutcome>,
    pub narrative: String,
    pub elapsed: Duration,
    transcript: Vec<TranscriptEntry>,
}

impl PipelineState {
    fn new(question: &str) -> Self {
        Self {
            question: question.to_string(),
            tables: Vec::new(),
            schema_tables: Vec::new(),
            schema: String::new(),
            sql: String::new(),
            referenced_tables: Vec::new(),
            outcome: None,
            narrative: String::new(),
            elapsed: Duration::ZERO,
            transcript: vec![TranscriptEntry {
                role: Role::User,
                step: None,
                content: question.to_string(),
            }],
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    fn record(&mut self, step: Step, content: &str) {
        self.transcript.push(TranscriptEntry {
            role: Role::Assistant,
            step: Some(step),
            content: format!("{}{}", step.label(), content),
        });
    }

    pub fn formatted(&self) -> FormattedResult {
        FormattedResult {
            sql_query: self.sql.clone(),
            output: self
                .outcome
                .as_ref()
                .map(QueryOutcome::text)
                .unwrap_or_default(),
            natural_language_response: self.narrative.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("question is empty")]
    EmptyQuestion,

    #[error("{step} failed: {source}")]
    Database {
        step: Step,
        #[source]
        source: DbError,
    },

    #[error("{step} failed: {source}")]
    Model {
        step: Step,
        #[source]
        source: LlmError,
    },
}

impl PipelineError {
    pub fn step(&self) -> Option<Step> {
        match self {
            PipelineError::EmptyQuestion => None,
            PipelineError::Database { step, .. } | PipelineError::Model { step, .. } => Some(*step),
        }
    }
}

pub struct Pipeline {
    db: Arc<dyn SqlDatabase>,
    model: Arc<dyn LanguageModel>,
    scope: SchemaScope,
}

impl Pipeline {
    pub fn new(
        db: Arc<dyn SqlDatabase>,
        model: Arc<dyn LanguageModel>,
        scope: SchemaScope,
    ) -> Self {
        Self { db, model, scope }
    }

    pub fn database(&self) -> &Arc<dyn SqlDatabase> {
        &self.db
    }

    pub fn model(&self) -> &Arc<dyn LanguageModel> {
        &self.model
    }

    pub fn scope(&self) -> &SchemaScope {
        &self.scope
    }

    pub async fn run(&self, question: &str) -> Result<PipelineState, PipelineError> {
        self.run_with_progress(question, None).await
    }

    /// Run all five steps, sending each step on `progress` as it starts.
    pub async fn run_with_progress(
        &self,
        question: &str,
        progress: Option<&UnboundedSender<Step>>,
    ) -> Result<PipelineState, PipelineError> {
        if question.trim().is_empty() {
            return Err(PipelineError::EmptyQuestion);
        }

        let start = Instant::now();
        let notify = |step: Step| {
            debug!(%step, "step started");
            if let Some(tx) = progress {
                let _ = tx.send(step);
            }
        };
        let mut state = PipelineState::new(question);
        info!(question, "answering question");

        notify(Step::ListTables);
        state.tables = list_tables(self.db.as_ref())
            .await
            .map_err(|source| PipelineError::Database {
                step: Step::ListTables,
                source,
            })?;
        let listed = state.tables.join(", ");
        state.record(Step::ListTables, &listed);

        notify(Step::GetSchema);
        state.schema_tables = self.scope.select(question, &state.tables);
        state.schema = get_schema(self.db.as_ref(), &state.schema_tables.join(", "))
            .await
            .map_err(|source| PipelineError::Database {
                step: Step::GetSchema,
                source,
            })?;
        let schema = state.schema.clone();
        state.record(Step::GetSchema, &schema);

        notify(Step::GenerateSql);
        state.sql = generate_sql(self.model.as_ref(), question, &state.schema)
            .await
            .map_err(|source| PipelineError::Model {
                step: Step::GenerateSql,
                source,
            })?;
        state.referenced_tables = referenced_tables(&state.sql);
        info!(sql = %state.sql, tables = ?state.referenced_tables, "generated SQL");
        let sql = state.sql.clone();
        state.record(Step::GenerateSql, &sql);

        notify(Step::RunQuery);
        let outcome = run_query(self.db.as_ref(), &state.sql).await;
        state.record(Step::RunQuery, &outcome.text());

        notify(Step::GenerateResponse);
        state.narrative = generate_response(self.model.as_ref(), question, &state.sql, &outcome)
            .await
            .map_err(|source| PipelineError::Model {
                step: Step::GenerateResponse,
                source,
            })?;
        state.outcome = Some(outcome);
        let narrative = state.narrative.clone();
        state.record(Step::GenerateResponse, &narrative);

        state.elapsed = start.elapsed();
        info!(
            elapsed_ms = state.elapsed.as_millis() as u64,
            success = state.outcome.as_ref().is_some_and(QueryOutcome::is_success),
            "question answered"
        );
        Ok(state)
    }
}

//! In-process stand-ins for the model backend and the database.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::db::{
    missing_tables, CellValue, ColumnInfo, DbError, ErrorCategory, QueryResult, SqlDatabase,
    StructuredError,
};
use crate::llm::{LanguageModel, LlmError};

/// Replies with canned responses in order and records every prompt.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
    unavailable: bool,
}

impl ScriptedModel {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
            unavailable: false,
        }
    }

    /// A backend that answers every prompt with HTTP 503.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::new(Vec::<String>::new())
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.unavailable {
            return Err(LlmError::Status {
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                body: "model is loading".to_string(),
            });
        }
        self.replies.lock().unwrap().pop_front().ok_or(LlmError::Empty)
    }
}

/// A small slice of the Chinook sample database, answering a fixed set of
/// statements.
pub struct MemoryDatabase {
    tables: Vec<(String, String)>,
    answers: Vec<(String, QueryResult)>,
    schema_requests: Mutex<Vec<Vec<String>>>,
    queries: Mutex<Vec<String>>,
    catalog_down: bool,
    unavailable: bool,
}

const CHINOOK: &[(&str, &str)] = &[
    (
        "Album",
        "CREATE TABLE \"Album\" (\n\t\"AlbumId\" INTEGER NOT NULL, \n\t\"Title\" VARCHAR(160) NOT NULL, \n\t\"ArtistId\" INTEGER NOT NULL, \n\tCONSTRAINT \"PK_Album\" PRIMARY KEY (\"AlbumId\")\n)",
    ),
    (
        "Artist",
        "CREATE TABLE \"Artist\" (\n\t\"ArtistId\" INTEGER NOT NULL, \n\t\"Name\" VARCHAR(120), \n\tCONSTRAINT \"PK_Artist\" PRIMARY KEY (\"ArtistId\")\n)",
    ),
    (
        "Customer",
        "CREATE TABLE \"Customer\" (\n\t\"CustomerId\" INTEGER NOT NULL, \n\t\"FirstName\" VARCHAR(40) NOT NULL, \n\t\"LastName\" VARCHAR(20) NOT NULL, \n\t\"Country\" VARCHAR(40), \n\tCONSTRAINT \"PK_Customer\" PRIMARY KEY (\"CustomerId\")\n)",
    ),
    (
        "Genre",
        "CREATE TABLE \"Genre\" (\n\t\"GenreId\" INTEGER NOT NULL, \n\t\"Name\" VARCHAR(120), \n\tCONSTRAINT \"PK_Genre\" PRIMARY KEY (\"GenreId\")\n)",
    ),
    (
        "Invoice",
        "CREATE TABLE \"Invoice\" (\n\t\"InvoiceId\" INTEGER NOT NULL, \n\t\"CustomerId\" INTEGER NOT NULL, \n\t\"Total\" NUMERIC(10, 2) NOT NULL, \n\tCONSTRAINT \"PK_Invoice\" PRIMARY KEY (\"InvoiceId\")\n)",
    ),
    (
        "invoice_line",
        "CREATE TABLE \"invoice_line\" (\n\t\"InvoiceLineId\" INTEGER NOT NULL, \n\t\"InvoiceId\" INTEGER NOT NULL, \n\t\"TrackId\" INTEGER NOT NULL, \n\tCONSTRAINT \"PK_invoice_line\" PRIMARY KEY (\"InvoiceLineId\")\n)",
    ),
    (
        "Track",
        "CREATE TABLE \"Track\" (\n\t\"TrackId\" INTEGER NOT NULL, \n\t\"Name\" VARCHAR(200) NOT NULL, \n\t\"GenreId\" INTEGER, \n\t\"Milliseconds\" INTEGER NOT NULL, \n\tCONSTRAINT \"PK_Track\" PRIMARY KEY (\"TrackId\")\n)",
    ),
];

impl MemoryDatabase {
    pub const USA_COUNT_SQL: &'static str =
        "SELECT COUNT(*) FROM \"Customer\" WHERE \"Country\" = 'USA';";
    pub const TOP_GENRE_SQL: &'static str = "SELECT g.\"Name\", COUNT(*) FROM \"Track\" t \
         JOIN \"Genre\" g ON g.\"GenreId\" = t.\"GenreId\" GROUP BY g.\"Name\" \
         ORDER BY 2 DESC LIMIT 1;";
    pub const BAD_COLUMN_SQL: &'static str = "SELECT \"Nope\" FROM \"Customer\"";

    pub fn chinook() -> Self {
        let count = QueryResult {
            columns: vec![column("count", "int8")],
            rows: vec![vec![CellValue::Int64(91)]],
            execution_time: Duration::from_millis(2),
            ..QueryResult::empty()
        };
        let genre = QueryResult {
            columns: vec![column("Name", "varchar"), column("count", "int8")],
            rows: vec![vec![CellValue::Text("Rock".into()), CellValue::Int64(1297)]],
            execution_time: Duration::from_millis(3),
            ..QueryResult::empty()
        };
        let bad_column = QueryResult::error(
            StructuredError {
                category: ErrorCategory::Semantic,
                code: "42703".into(),
                message: "column \"Nope\" does not exist".into(),
                detail: None,
                hint: None,
                location: Some((1, 8)),
            },
            Duration::from_millis(1),
        );

        Self {
            tables: CHINOOK
                .iter()
                .map(|(name, ddl)| (name.to_string(), ddl.to_string()))
                .collect(),
            answers: vec![
                (normalize(Self::USA_COUNT_SQL), count),
                (normalize(Self::TOP_GENRE_SQL), genre),
                (normalize(Self::BAD_COLUMN_SQL), bad_column),
            ],
            schema_requests: Mutex::new(Vec::new()),
            queries: Mutex::new(Vec::new()),
            catalog_down: false,
            unavailable: false,
        }
    }

    /// Every `run` fails before reaching the engine.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Table discovery fails.
    pub fn without_catalog(mut self) -> Self {
        self.catalog_down = true;
        self
    }

    /// Table lists passed to `table_info`, in call order.
    pub fn schema_requests(&self) -> Vec<Vec<String>> {
        self.schema_requests.lock().unwrap().clone()
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

fn column(name: &str, type_name: &str) -> ColumnInfo {
    ColumnInfo {
        name: name.to_string(),
        type_name: type_name.to_string(),
    }
}

fn normalize(sql: &str) -> String {
    sql.trim()
        .trim_end_matches(';')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn closed() -> DbError {
    DbError::Pool(deadpool_postgres::PoolError::Closed)
}

#[async_trait]
impl SqlDatabase for MemoryDatabase {
    fn dialect(&self) -> &str {
        "postgresql"
    }

    async fn usable_table_names(&self) -> Result<Vec<String>, DbError> {
        if self.catalog_down {
            return Err(closed());
        }
        let mut names: Vec<String> = self.tables.iter().map(|(n, _)| n.clone()).collect();
        names.sort();
        Ok(names)
    }

    async fn table_info(&self, tables: &[String]) -> Result<String, DbError> {
        self.schema_requests.lock().unwrap().push(tables.to_vec());
        let available: Vec<String> = self.tables.iter().map(|(n, _)| n.clone()).collect();
        let missing = missing_tables(tables, &available);
        if !missing.is_empty() {
            return Err(DbError::UnknownTables(missing));
        }
        let blocks: Vec<&str> = tables
            .iter()
            .filter_map(|t| self.tables.iter().find(|(n, _)| n == t))
            .map(|(_, ddl)| ddl.as_str())
            .collect();
        Ok(blocks.join("\n\n"))
    }

    async fn run(&self, sql: &str) -> Result<QueryResult, DbError> {
        self.queries.lock().unwrap().push(sql.to_string());
        if self.unavailable {
            return Err(closed());
        }
        let key = normalize(sql);
        // An empty statement is not an error to PostgreSQL: no rows, no columns.
        if key.is_empty() {
            return Ok(QueryResult::empty());
        }
        if let Some((_, result)) = self.answers.iter().find(|(k, _)| *k == key) {
            return Ok(result.clone());
        }
        let token = key.split_whitespace().next().unwrap_or_default();
        let message = format!("syntax error at or near \"{}\"", token);
        Ok(QueryResult::error(
            StructuredError {
                category: ErrorCategory::Syntax,
                code: "42601".into(),
                ..StructuredError::from_string(message)
            },
            Duration::ZERO,
        ))
    }
}

mod connection;
mod query;
mod schema;

pub use connection::*;
pub use query::*;
pub use schema::*;

use async_trait::async_trait;
use thiserror::Error;

/// Failures that keep the database layer from answering at all.
///
/// Errors raised by PostgreSQL while running a statement are not represented
/// here: they come back inside [`QueryResult::error`].
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("could not get a connection from the pool: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("table_names {0:?} not found in database")]
    UnknownTables(Vec<String>),
}

/// The SQL-capable collaborator the pipeline talks to.
///
/// Production code uses [`PgDatabase`]; tests substitute an in-memory
/// implementation.
#[async_trait]
pub trait SqlDatabase: Send + Sync {
    /// Short name of the SQL dialect, shown in the dashboard header.
    fn dialect(&self) -> &str;

    /// Names of the tables and views the connection can query, sorted.
    async fn usable_table_names(&self) -> Result<Vec<String>, DbError>;

    /// DDL plus a few sample rows for each of `tables`.
    ///
    /// Every name must be one of [`SqlDatabase::usable_table_names`].
    async fn table_info(&self, tables: &[String]) -> Result<String, DbError>;

    /// Run a single statement. Statement-level failures are reported through
    /// [`QueryResult::error`], not through `Err`.
    async fn run(&self, sql: &str) -> Result<QueryResult, DbError>;
}

/// Names from `requested` that are not in `available`, in request order.
pub fn missing_tables(requested: &[String], available: &[String]) -> Vec<String> {
    requested
        .iter()
        .filter(|name| !available.contains(name))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tables() {
        let available = vec!["Genre".to_string(), "Track".to_string()];
        let requested = vec![
            "Track".to_string(),
            "Customer".to_string(),
            "genre".to_string(),
        ];
        assert_eq!(
            missing_tables(&requested, &available),
            vec!["Customer".to_string(), "genre".to_string()]
        );
    }

    #[test]
    fn test_unknown_tables_message() {
        let err = DbError::UnknownTables(vec!["Foo".into()]);
        assert_eq!(err.to_string(), "table_names [\"Foo\"] not found in database");
    }
}

use serde::Serialize;
use tracing::{debug, warn};

use crate::db::SqlDatabase;

const NO_SQL_MESSAGE: &str = "the model did not produce a SQL statement";

/// What running the generated SQL produced. Failures are data here: the
/// pipeline keeps going and the narrator explains them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum QueryOutcome {
    Success { rendered: String, row_count: usize },
    Failure { message: String },
}

impl QueryOutcome {
    /// Text handed to callers: the rendered rows, or `"Error: <message>"`.
    pub fn text(&self) -> String {
        match self {
            QueryOutcome::Success { rendered, .. } => rendered.clone(),
            QueryOutcome::Failure { message } => format!("Error: {}", message),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, QueryOutcome::Success { .. })
    }
}

/// Run `query`; never returns an error to the caller.
pub async fn run_query(db: &dyn SqlDatabase, query: &str) -> QueryOutcome {
    if query.trim().is_empty() {
        warn!("model produced no SQL");
        return QueryOutcome::Failure {
            message: NO_SQL_MESSAGE.to_string(),
        };
    }
    match db.run(query).await {
        Ok(result) => match result.error {
            Some(err) => {
                warn!(error = %err.display_full(), "generated SQL failed");
                QueryOutcome::Failure {
                    message: err.display_message(),
                }
            }
            None => {
                debug!(
                    rows = result.row_count(),
                    elapsed_ms = result.execution_time.as_millis() as u64,
                    "query finished"
                );
                QueryOutcome::Success {
                    rendered: result.render_rows(),
                    row_count: result.row_count(),
                }
            }
        },
        Err(err) => {
            warn!(error = %err, "could not run generated SQL");
            QueryOutcome::Failure {
                message: err.to_string(),
            }
        }
    }
}

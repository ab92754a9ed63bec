use crate::llm::{LanguageModel, LlmError};

use super::executor::QueryOutcome;
use super::Step;

fn answer_prompt(question: &str, sql_query: &str, result: &str) -> String {
    let result = if result.is_empty() {
        "(no rows)"
    } else {
        result
    };
    format!(
        "You are a helpful assistant. You are given a user's question, the SQL \
         that was run to answer it, and what the SQL returned. Answer the \
         question in natural, human language.\n\
         \n\
         Question: {question}\n\
         SQL Query: {sql_query}\n\
         Result: {result}\n\
         \n\
         Guidelines:\n\
         - Talk to the user directly, as if you were explaining the finding to them.\n\
         - Never mention the query, SQL, tables or the database.\n\
         - Focus on what the result means for the question.\n\
         - Be concise; a short extra insight is fine when it feels natural.\n\
         - Keep the wording smooth and conversational.\n\
         \n\
         Answer:"
    )
}

fn failure_prompt(question: &str, sql_query: &str, message: &str) -> String {
    format!(
        "You are a helpful assistant. A user asked a question, but looking up \
         the answer failed.\n\
         \n\
         Question: {question}\n\
         Attempted SQL: {sql_query}\n\
         Failure: {message}\n\
         \n\
         Guidelines:\n\
         - Tell the user briefly that the answer could not be found this time.\n\
         - Explain the likely problem in plain words, without SQL or database internals.\n\
         - If the question might be ambiguous, suggest how it could be rephrased.\n\
         - Keep it to two or three sentences.\n\
         \n\
         Answer:"
    )
}

/// Turn the question, SQL and outcome into a prose answer. A failed query is
/// narrated as a failure, never as if its error text were data.
pub async fn generate_response(
    model: &dyn LanguageModel,
    question: &str,
    sql_query: &str,
    outcome: &QueryOutcome,
) -> Result<String, LlmError> {
    let prompt = match outcome {
        QueryOutcome::Success { rendered, .. } => answer_prompt(question, sql_query, rendered),
        QueryOutcome::Failure { message } => failure_prompt(question, sql_query, message),
    };
    let response = model.complete(&prompt).await?;
    Ok(Step::GenerateResponse.strip_label(&response).to_string())
}

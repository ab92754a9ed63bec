use sqlparser::ast::{visit_relations, Ident, Query, Visit, Visitor};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser as SqlParser;
use std::ops::ControlFlow;

use super::Step;
use crate::llm::{LanguageModel, LlmError};

/// Opening fences with a language tag, longest first so `postgresql` is not
/// cut down to `ql`.
const TAGGED_FENCES: &[&str] = &["```postgresql", "```postgres", "```psql", "```sql"];
const BARE_FENCE: &str = "```";

pub fn sql_prompt(question: &str, context: &str) -> String {
    format!(
        "Based on this PostgreSQL database schema:\n\
         {context}\n\
         \n\
         Question: {question}\n\
         \n\
         Write one SQL query that answers the question. \
         Return ONLY the SQL query, with no explanation and no markdown formatting."
    )
}

/// Ask the model for one SQL statement answering `question` against the
/// schema in `context`. The reply is not validated beyond fence removal.
pub async fn generate_sql(
    model: &dyn LanguageModel,
    question: &str,
    context: &str,
) -> Result<String, LlmError> {
    let raw = model.complete(&sql_prompt(question, context)).await?;
    Ok(clean_sql(&raw))
}

/// Trim the reply and strip every markdown code fence from it, plus any
/// echoed "Generated SQL:" label.
pub fn clean_sql(raw: &str) -> String {
    let mut sql = raw.trim().to_string();

    // Removing one fence can splice backticks into a new one, so repeat
    // until nothing changes.
    loop {
        let before = sql.len();
        for fence in TAGGED_FENCES {
            while let Some(i) = sql.to_ascii_lowercase().find(fence) {
                sql.replace_range(i..i + fence.len(), "");
            }
        }
        sql = sql.replace(BARE_FENCE, "");
        if sql.len() == before {
            break;
        }
    }

    Step::GenerateSql.strip_label(&sql).to_string()
}

/// Tables a statement reads from or writes to, in order of first use.
/// Names bound by a `WITH` clause are not tables and are left out.
/// Unparseable SQL yields an empty list.
pub fn referenced_tables(sql: &str) -> Vec<String> {
    let Ok(statements) = SqlParser::parse_sql(&PostgreSqlDialect {}, sql) else {
        return Vec::new();
    };

    let mut ctes = CteNames::default();
    for statement in &statements {
        let _ = statement.visit(&mut ctes);
    }

    let mut tables: Vec<String> = Vec::new();
    let _ = visit_relations(&statements, |relation| {
        let is_cte = matches!(relation.0.as_slice(), [name] if ctes.0.contains(&folded(name)));
        if let Some(ident) = relation.0.last() {
            if !is_cte && !tables.contains(&ident.value) {
                tables.push(ident.value.clone());
            }
        }
        ControlFlow::<()>::Continue(())
    });
    tables
}

/// Aliases of every common table expression, case-folded.
#[derive(Default)]
struct CteNames(Vec<String>);

impl Visitor for CteNames {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<()> {
        if let Some(with) = &query.with {
            self.0
                .extend(with.cte_tables.iter().map(|cte| folded(&cte.alias.name)));
        }
        ControlFlow::Continue(())
    }
}

/// Identifier as PostgreSQL resolves it: unquoted names fold to lower case.
fn folded(ident: &Ident) -> String {
    match ident.quote_style {
        Some(_) => ident.value.clone(),
        None => ident.value.to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;

    #[test]
    fn test_clean_sql_plain() {
        assert_eq!(clean_sql("  SELECT 1;\n"), "SELECT 1;");
    }

    #[test]
    fn test_clean_sql_tagged_fence() {
        let raw = "```sql\nSELECT COUNT(*) FROM \"Customer\" WHERE \"Country\" = 'USA';\n```";
        assert_eq!(
            clean_sql(raw),
            "SELECT COUNT(*) FROM \"Customer\" WHERE \"Country\" = 'USA';"
        );
    }

    #[test]
    fn test_clean_sql_bare_and_uppercase_fences() {
        assert_eq!(clean_sql("```\nSELECT 1\n```"), "SELECT 1");
        assert_eq!(clean_sql("```SQL\nSELECT 1\n```"), "SELECT 1");
        assert_eq!(clean_sql("```postgresql\nSELECT 1\n```"), "SELECT 1");
    }

    #[test]
    fn test_clean_sql_never_leaves_fences() {
        let nasty = [
            "``", "```", "````", "`````sql`", "`````sql", "```sql```sql```",
            "``\n```sql\n`SELECT 1`", "SELECT '```' AS x",
        ];
        for raw in nasty {
            let cleaned = clean_sql(raw);
            assert!(!cleaned.contains("```"), "{raw:?} -> {cleaned:?}");
            assert!(!cleaned.to_ascii_lowercase().contains("```sql"), "{raw:?}");
        }
    }

    #[test]
    fn test_sql_prompt_contains_inputs() {
        let prompt = sql_prompt("How many tracks?", "CREATE TABLE \"Track\" ()");
        assert!(prompt.contains("Question: How many tracks?"));
        assert!(prompt.contains("CREATE TABLE \"Track\" ()"));
        assert!(prompt.contains("Return ONLY the SQL query"));
    }

    #[test]
    fn test_referenced_tables() {
        let sql = "SELECT g.\"Name\", COUNT(*) FROM \"Track\" t \
                   JOIN \"Genre\" g ON g.\"GenreId\" = t.\"GenreId\" \
                   GROUP BY g.\"Name\" ORDER BY 2 DESC LIMIT 1";
        assert_eq!(referenced_tables(sql), vec!["Track".to_string(), "Genre".to_string()]);
    }

    #[test]
    fn test_referenced_tables_schema_qualified_and_repeated() {
        let sql = "SELECT * FROM public.customer \
                   WHERE id IN (SELECT customer_id FROM public.customer)";
        assert_eq!(referenced_tables(sql), vec!["customer".to_string()]);
    }

    #[test]
    fn test_referenced_tables_skips_cte_names() {
        let sql = "WITH spend AS (\
                       SELECT \"CustomerId\", SUM(\"Total\") AS total \
                       FROM \"Invoice\" GROUP BY \"CustomerId\") \
                   SELECT * FROM spend ORDER BY total DESC LIMIT 5";
        assert_eq!(referenced_tables(sql), vec!["Invoice".to_string()]);

        let sql = "WITH \"Top\" AS (SELECT * FROM \"Track\") \
                   SELECT * FROM \"Top\" JOIN \"Genre\" USING (\"GenreId\")";
        assert_eq!(
            referenced_tables(sql),
            vec!["Track".to_string(), "Genre".to_string()]
        );

        // A schema-qualified name is a real table even if a CTE shares it.
        let sql = "WITH customer AS (SELECT 1) SELECT * FROM public.customer, customer";
        assert_eq!(referenced_tables(sql), vec!["customer".to_string()]);
    }

    #[test]
    fn test_clean_sql_drops_echoed_label() {
        assert_eq!(clean_sql("Generated SQL: SELECT 1;"), "SELECT 1;");
        assert_eq!(clean_sql("```sql\nGenerated SQL: SELECT 1;\n```"), "SELECT 1;");
        assert_eq!(clean_sql("generated sql:\n```sql\nSELECT 1;\n```"), "SELECT 1;");
    }

    #[test]
    fn test_referenced_tables_unparseable() {
        assert!(referenced_tables("SELEC nonsense FROM").is_empty());
    }

    #[tokio::test]
    async fn test_generate_sql_cleans_model_reply() {
        let model = ScriptedModel::new(vec!["```sql\nSELECT 1;\n```"]);
        let sql = generate_sql(&model, "one?", "schema").await.unwrap();
        assert_eq!(sql, "SELECT 1;");
        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Question: one?"));
    }
}

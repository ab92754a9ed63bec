use std::time::Instant;
use tokio_postgres::Client;

use super::query::{parse_rows, QueryResult};

/// Longest sample value shown in table info before it is cut.
const SAMPLE_VALUE_WIDTH: usize = 100;

#[derive(Debug, Clone)]
pub struct ColumnDetails {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub is_primary_key: bool,
    pub default_value: Option<String>,
}

/// Names of the tables, views and foreign tables in `schema` the current
/// role may select from, sorted.
pub async fn get_tables(
    client: &Client,
    schema: &str,
) -> Result<Vec<String>, tokio_postgres::Error> {
    let rows = client
        .query(
            r#"
            SELECT c.relname as name
            FROM pg_catalog.pg_class c
            JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
            WHERE n.nspname = $1
              AND c.relkind IN ('r', 'p', 'v', 'm', 'f')
              AND has_table_privilege(c.oid, 'SELECT')
            ORDER BY c.relname
            "#,
            &[&schema],
        )
        .await?;

    Ok(rows.iter().map(|row| row.get("name")).collect())
}

pub async fn get_columns(
    client: &Client,
    schema: &str,
    table: &str,
) -> Result<Vec<ColumnDetails>, tokio_postgres::Error> {
    let rows = client
        .query(
            r#"
            SELECT
                c.column_name as name,
                CASE WHEN c.data_type = 'USER-DEFINED' THEN c.udt_name ELSE c.data_type END as data_type,
                c.is_nullable = 'YES' as is_nullable,
                EXISTS (
                    SELECT 1
                    FROM information_schema.table_constraints tc
                    JOIN information_schema.key_column_usage kcu
                        ON kcu.constraint_schema = tc.constraint_schema
                        AND kcu.constraint_name = tc.constraint_name
                    WHERE tc.constraint_type = 'PRIMARY KEY'
                      AND tc.table_schema = c.table_schema
                      AND tc.table_name = c.table_name
                      AND kcu.column_name = c.column_name
                ) as is_primary_key,
                c.column_default as default_value
            FROM information_schema.columns c
            WHERE c.table_schema = $1 AND c.table_name = $2
            ORDER BY c.ordinal_position
            "#,
            &[&schema, &table],
        )
        .await?;

    let columns = rows
        .iter()
        .map(|row| ColumnDetails {
            name: row.get("name"),
            data_type: row.get("data_type"),
            is_nullable: row.get("is_nullable"),
            is_primary_key: row.get("is_primary_key"),
            default_value: row.get("default_value"),
        })
        .collect();

    Ok(columns)
}

/// First `limit` rows of a table, for the sample block in table info.
pub async fn get_sample_rows(
    client: &Client,
    schema: &str,
    table: &str,
    limit: usize,
) -> Result<QueryResult, tokio_postgres::Error> {
    let start = Instant::now();
    let sql = format!(
        "SELECT * FROM {}.{} LIMIT {}",
        quote_ident(schema),
        quote_ident(table),
        limit
    );
    let rows = client.query(sql.as_str(), &[]).await?;
    Ok(parse_rows(&rows, start.elapsed()))
}

/// `CREATE TABLE` statement for a table, built from its column metadata.
pub fn table_ddl(table: &str, columns: &[ColumnDetails]) -> String {
    let mut ddl = format!("CREATE TABLE {} (\n", quote_ident(table));

    let primary_keys: Vec<String> = columns
        .iter()
        .filter(|c| c.is_primary_key)
        .map(|c| quote_ident(&c.name))
        .collect();

    let mut lines: Vec<String> = columns
        .iter()
        .map(|col| {
            let null_str = if col.is_nullable { "" } else { " NOT NULL" };
            let default_str = col
                .default_value
                .as_ref()
                .map(|d| format!(" DEFAULT {}", d))
                .unwrap_or_default();
            format!(
                "\t{} {}{}{}",
                quote_ident(&col.name),
                col.data_type.to_uppercase(),
                null_str,
                default_str
            )
        })
        .collect();

    if !primary_keys.is_empty() {
        lines.push(format!(
            "\tCONSTRAINT {} PRIMARY KEY ({})",
            quote_ident(&format!("PK_{}", table)),
            primary_keys.join(", ")
        ));
    }

    ddl.push_str(&lines.join(",\n"));
    ddl.push_str("\n)");
    ddl
}

/// Comment block listing sample rows as tab-separated values.
pub fn format_sample_rows(table: &str, sample: &QueryResult) -> String {
    let header: Vec<&str> = sample.columns.iter().map(|c| c.name.as_str()).collect();
    let mut out = format!(
        "/*\n{} rows from {} table:\n{}\n",
        sample.row_count(),
        table,
        header.join("\t")
    );
    for row in &sample.rows {
        let cells: Vec<String> = row
            .iter()
            .map(|cell| {
                let text = cell.display();
                if text.chars().count() > SAMPLE_VALUE_WIDTH {
                    let cut: String = text.chars().take(SAMPLE_VALUE_WIDTH).collect();
                    format!("{}...", cut)
                } else {
                    text
                }
            })
            .collect();
        out.push_str(&cells.join("\t"));
        out.push('\n');
    }
    out.push_str("*/");
    out
}

/// Quote an identifier for interpolation into SQL text.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{CellValue, ColumnInfo};

    fn column(name: &str, data_type: &str, nullable: bool, pk: bool) -> ColumnDetails {
        ColumnDetails {
            name: name.into(),
            data_type: data_type.into(),
            is_nullable: nullable,
            is_primary_key: pk,
            default_value: None,
        }
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("Track"), "\"Track\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_table_ddl() {
        let columns = vec![
            column("GenreId", "integer", false, true),
            column("Name", "character varying", true, false),
        ];
        let ddl = table_ddl("Genre", &columns);
        assert_eq!(
            ddl,
            "CREATE TABLE \"Genre\" (\n\
             \t\"GenreId\" INTEGER NOT NULL,\n\
             \t\"Name\" CHARACTER VARYING,\n\
             \tCONSTRAINT \"PK_Genre\" PRIMARY KEY (\"GenreId\")\n)"
        );
    }

    #[test]
    fn test_table_ddl_composite_key() {
        let columns = vec![
            column("PlaylistId", "integer", false, true),
            column("TrackId", "integer", false, true),
        ];
        let ddl = table_ddl("PlaylistTrack", &columns);
        assert_eq!(ddl.matches("\"PlaylistId\" INTEGER NOT NULL").count(), 1);
        assert_eq!(ddl.matches("\"TrackId\" INTEGER NOT NULL").count(), 1);
        assert!(ddl.ends_with(
            "\tCONSTRAINT \"PK_PlaylistTrack\" PRIMARY KEY (\"PlaylistId\", \"TrackId\")\n)"
        ));
    }

    #[test]
    fn test_table_ddl_with_default() {
        let mut col = column("id", "integer", false, false);
        col.default_value = Some("nextval('t_id_seq'::regclass)".into());
        let ddl = table_ddl("t", &[col]);
        assert!(ddl.contains("\"id\" INTEGER NOT NULL DEFAULT nextval('t_id_seq'::regclass)"));
        assert!(!ddl.contains("PRIMARY KEY"));
    }

    #[test]
    fn test_format_sample_rows() {
        let sample = QueryResult {
            columns: vec![
                ColumnInfo {
                    name: "GenreId".into(),
                    type_name: "int4".into(),
                },
                ColumnInfo {
                    name: "Name".into(),
                    type_name: "varchar".into(),
                },
            ],
            rows: vec![
                vec![CellValue::Int32(1), CellValue::Text("Rock".into())],
                vec![CellValue::Int32(2), CellValue::Null],
            ],
            ..QueryResult::empty()
        };
        assert_eq!(
            format_sample_rows("Genre", &sample),
            "/*\n2 rows from Genre table:\nGenreId\tName\n1\tRock\n2\tNULL\n*/"
        );
    }

    #[test]
    fn test_format_sample_rows_truncates_long_values() {
        let sample = QueryResult {
            columns: vec![ColumnInfo {
                name: "Bio".into(),
                type_name: "text".into(),
            }],
            rows: vec![vec![CellValue::Text("y".repeat(150))]],
            ..QueryResult::empty()
        };
        let block = format_sample_rows("Artist", &sample);
        assert!(block.contains(&format!("{}...", "y".repeat(SAMPLE_VALUE_WIDTH))));
    }
}

//! Benchmarks for the CPU-bound parts of answering a question:
//! - cleaning model replies into SQL
//! - finding the tables a statement touches
//! - rendering result sets as text
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pgask::db::{CellValue, ColumnInfo, QueryResult};
use pgask::pipeline::{clean_sql, referenced_tables, SchemaScope};

const FENCED_REPLY: &str = "```sql\nSELECT g.\"Name\", COUNT(*) AS track_count\n\
    FROM \"Track\" t\nJOIN \"Genre\" g ON g.\"GenreId\" = t.\"GenreId\"\n\
    GROUP BY g.\"Name\"\nORDER BY track_count DESC\nLIMIT 1;\n```";

const PLAIN_REPLY: &str = "SELECT COUNT(*) FROM \"Customer\" WHERE \"Country\" = 'USA';";

const CTE_QUERY: &str = "WITH spend AS (\
        SELECT c.\"CustomerId\", SUM(i.\"Total\") AS total \
        FROM \"Customer\" c JOIN \"Invoice\" i ON i.\"CustomerId\" = c.\"CustomerId\" \
        GROUP BY c.\"CustomerId\"\
    ) \
    SELECT c.\"FirstName\", c.\"LastName\", s.total \
    FROM spend s JOIN \"Customer\" c ON c.\"CustomerId\" = s.\"CustomerId\" \
    ORDER BY s.total DESC LIMIT 5";

fn result_set(rows: usize) -> QueryResult {
    QueryResult {
        columns: vec![
            ColumnInfo {
                name: "Name".into(),
                type_name: "varchar".into(),
            },
            ColumnInfo {
                name: "total".into(),
                type_name: "numeric".into(),
            },
            ColumnInfo {
                name: "active".into(),
                type_name: "bool".into(),
            },
        ],
        rows: (0..rows)
            .map(|i| {
                vec![
                    CellValue::Text(format!("Customer's name {}", i)),
                    CellValue::Numeric(format!("{}.{:02}", i * 3, i % 100)),
                    if i % 7 == 0 {
                        CellValue::Null
                    } else {
                        CellValue::Bool(i % 2 == 0)
                    },
                ]
            })
            .collect(),
        ..QueryResult::empty()
    }
}

fn bench_clean_sql(c: &mut Criterion) {
    let mut group = c.benchmark_group("clean_sql");
    for (name, reply) in [("fenced", FENCED_REPLY), ("plain", PLAIN_REPLY)] {
        group.bench_with_input(BenchmarkId::new("clean", name), reply, |b, reply| {
            b.iter(|| clean_sql(black_box(reply)))
        });
    }
    group.finish();
}

fn bench_referenced_tables(c: &mut Criterion) {
    let mut group = c.benchmark_group("referenced_tables");
    for (name, sql) in [("simple", PLAIN_REPLY), ("cte", CTE_QUERY)] {
        group.bench_with_input(BenchmarkId::new("extract", name), sql, |b, sql| {
            b.iter(|| referenced_tables(black_box(sql)))
        });
    }
    group.finish();
}

fn bench_render_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_rows");
    for rows in [1, 100, 1000] {
        let result = result_set(rows);
        group.bench_with_input(BenchmarkId::from_parameter(rows), &result, |b, result| {
            b.iter(|| black_box(result).render_rows())
        });
    }
    group.finish();
}

fn bench_schema_scope(c: &mut Criterion) {
    let tables: Vec<String> = (0..200).map(|i| format!("table_{}", i)).collect();
    c.bench_function("scope_mentioned", |b| {
        b.iter(|| {
            SchemaScope::Mentioned.select(
                black_box("How many rows are in table 42 compared with table 7?"),
                &tables,
            )
        })
    });
}

criterion_group!(
    benches,
    bench_clean_sql,
    bench_referenced_tables,
    bench_render_rows,
    bench_schema_scope
);
criterion_main!(benches);

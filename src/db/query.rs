use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::error::Error as StdError;
use std::fmt;
use std::net::IpAddr;
use std::time::{Duration, Instant};
use tokio_postgres::types::{FromSql, Kind, Type};
use tokio_postgres::{Client, Row};

/// Longest text value kept when a result set is stringified.
pub const MAX_STRING_LENGTH: usize = 300;

/// Categorized error types for SQL statement failures.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorCategory {
    /// Syntax errors (SQLSTATE 42601 and friends)
    Syntax,
    /// Missing table/column, ambiguous reference
    Semantic,
    /// Runtime errors (division by zero, constraint violation)
    Execution,
    /// Transaction state errors
    Transaction,
    /// Connection/communication errors
    Connection,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Syntax => write!(f, "Syntax Error"),
            ErrorCategory::Semantic => write!(f, "Semantic Error"),
            ErrorCategory::Execution => write!(f, "Execution Error"),
            ErrorCategory::Transaction => write!(f, "Transaction Error"),
            ErrorCategory::Connection => write!(f, "Connection Error"),
            ErrorCategory::Unknown => write!(f, "Error"),
        }
    }
}

/// Error reported by PostgreSQL for a generated statement.
#[derive(Debug, Clone)]
pub struct StructuredError {
    pub category: ErrorCategory,
    /// SQLSTATE code, empty for non-database errors
    pub code: String,
    pub message: String,
    pub detail: Option<String>,
    pub hint: Option<String>,
    /// Computed (line, column) of the failing token, both 1-based
    pub location: Option<(usize, usize)>,
}

impl StructuredError {
    /// Build from a tokio_postgres error, using the statement text to turn
    /// the reported byte position into a line/column pair.
    pub fn from_pg_error(err: &tokio_postgres::Error, query: &str) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let code = db_err.code().code().to_string();
            let location = db_err.position().and_then(|p| match p {
                tokio_postgres::error::ErrorPosition::Original(pos) => {
                    Some(byte_offset_to_line_col(query, *pos as usize))
                }
                tokio_postgres::error::ErrorPosition::Internal { .. } => None,
            });

            StructuredError {
                category: categorize_sqlstate(&code),
                code,
                message: db_err.message().to_string(),
                detail: db_err.detail().map(|s| s.to_string()),
                hint: db_err.hint().map(|s| s.to_string()),
                location,
            }
        } else {
            let category = if err.source().is_some() {
                ErrorCategory::Connection
            } else {
                ErrorCategory::Unknown
            };
            StructuredError {
                category,
                code: String::new(),
                message: err.to_string(),
                detail: err.source().map(|e| e.to_string()),
                hint: None,
                location: None,
            }
        }
    }

    pub fn from_string(msg: impl Into<String>) -> Self {
        StructuredError {
            category: ErrorCategory::Unknown,
            code: String::new(),
            message: msg.into(),
            detail: None,
            hint: None,
            location: None,
        }
    }

    /// One-line form used as pipeline data: message, then hint if any.
    pub fn display_message(&self) -> String {
        match &self.hint {
            Some(hint) => format!("{} (hint: {})", self.message, hint),
            None => self.message.clone(),
        }
    }

    /// Multi-line form for logs and the dashboard.
    pub fn display_full(&self) -> String {
        let mut lines = vec![format!("{}: {}", self.category, self.message)];

        if let Some((line, col)) = self.location {
            lines.push(format!("  at line {}, column {}", line, col));
        }
        if !self.code.is_empty() {
            lines.push(format!("  SQLSTATE: {}", self.code));
        }
        if let Some(detail) = &self.detail {
            lines.push(format!("  Detail: {}", detail));
        }
        if let Some(hint) = &self.hint {
            lines.push(format!("  Hint: {}", hint));
        }

        lines.join("\n")
    }
}

impl fmt::Display for StructuredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_message())
    }
}

/// Convert a 1-based byte offset in a query string to (line, column) both 1-based.
fn byte_offset_to_line_col(query: &str, byte_pos: usize) -> (usize, usize) {
    if byte_pos == 0 || query.is_empty() {
        return (1, 1);
    }
    let target = (byte_pos - 1).min(query.len());
    let mut line = 1usize;
    let mut col = 1usize;
    for (i, ch) in query.char_indices() {
        if i >= target {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

fn categorize_sqlstate(code: &str) -> ErrorCategory {
    if code.len() < 2 {
        return ErrorCategory::Unknown;
    }
    match &code[..2] {
        "42" if code == "42601" || code == "42000" => ErrorCategory::Syntax,
        // 42P01 undefined_table, 42703 undefined_column, ...
        "42" => ErrorCategory::Semantic,
        "22" | "23" | "53" | "54" | "55" | "57" => ErrorCategory::Execution,
        "25" | "40" => ErrorCategory::Transaction,
        "08" => ErrorCategory::Connection,
        _ => ErrorCategory::Unknown,
    }
}

#[derive(Debug, Clone)]
pub struct QueryResult {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Vec<CellValue>>,
    pub execution_time: Duration,
    pub affected_rows: Option<u64>,
    pub error: Option<StructuredError>,
}

#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub name: String,
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    /// NUMERIC kept as its exact decimal text
    Numeric(String),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Json(serde_json::Value),
    Array(Vec<CellValue>),
    /// Non-NULL value of a type there is no decoder for, by type name
    Unsupported(String),
}

impl CellValue {
    /// Plain text form, used for the tab-separated sample rows in table info.
    pub fn display(&self) -> String {
        match self {
            CellValue::Null => "NULL".to_string(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Int16(i) => i.to_string(),
            CellValue::Int32(i) => i.to_string(),
            CellValue::Int64(i) => i.to_string(),
            CellValue::Float32(f) => f.to_string(),
            CellValue::Float64(f) => f.to_string(),
            CellValue::Numeric(n) => n.clone(),
            CellValue::Text(s) => s.clone(),
            CellValue::Bytes(b) => format!("[{} bytes]", b.len()),
            CellValue::Date(d) => d.to_string(),
            CellValue::Time(t) => t.to_string(),
            CellValue::DateTime(dt) => dt.to_string(),
            CellValue::TimestampTz(dt) => dt.to_string(),
            CellValue::Json(j) => j.to_string(),
            CellValue::Array(arr) => {
                let items: Vec<String> = arr.iter().map(|v| v.display()).collect();
                format!("{{{}}}", items.join(", "))
            }
            CellValue::Unsupported(type_name) => format!("<{}>", type_name),
        }
    }

    /// Literal form used when a whole result set is stringified for the
    /// narrator: `None`, `True`, `'text'`, `91`, `[1, 2]`.
    pub fn literal(&self) -> String {
        match self {
            CellValue::Null => "None".to_string(),
            CellValue::Bool(true) => "True".to_string(),
            CellValue::Bool(false) => "False".to_string(),
            CellValue::Int16(i) => i.to_string(),
            CellValue::Int32(i) => i.to_string(),
            CellValue::Int64(i) => i.to_string(),
            CellValue::Float32(f) => float_literal(*f as f64),
            CellValue::Float64(f) => float_literal(*f),
            CellValue::Numeric(n) => n.clone(),
            CellValue::Text(s) => quote_literal(&truncate_chars(s, MAX_STRING_LENGTH)),
            CellValue::Bytes(b) => bytes_literal(b),
            CellValue::Json(j) => j.to_string(),
            CellValue::Array(arr) => {
                let items: Vec<String> = arr.iter().map(|v| v.literal()).collect();
                format!("[{}]", items.join(", "))
            }
            CellValue::Unsupported(type_name) => format!("<{}>", type_name),
            other => quote_literal(&other.display()),
        }
    }
}

fn float_literal(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        let s = if f > 0.0 { "inf" } else { "-inf" };
        s.to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}

/// Quote text the way a Python `repr` of a string does: single quotes unless
/// the text holds a single quote and no double quote.
fn quote_literal(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

fn bytes_literal(bytes: &[u8]) -> String {
    let mut out = String::from("b'");
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\'' => out.push_str("\\'"),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\x{:02x}", b)),
        }
    }
    out.push('\'');
    out
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push_str("...");
    out
}

impl QueryResult {
    pub fn empty() -> Self {
        Self {
            columns: vec![],
            rows: vec![],
            execution_time: Duration::ZERO,
            affected_rows: None,
            error: None,
        }
    }

    pub fn error(err: StructuredError, execution_time: Duration) -> Self {
        Self {
            error: Some(err),
            execution_time,
            ..Self::empty()
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Stringify the rows as a list of tuples, e.g. `[(91,)]`.
    ///
    /// Empty result sets and statements without rows render as "".
    pub fn render_rows(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }
        let tuples: Vec<String> = self
            .rows
            .iter()
            .map(|row| {
                let cells: Vec<String> = row.iter().map(CellValue::literal).collect();
                if cells.len() == 1 {
                    format!("({},)", cells[0])
                } else {
                    format!("({})", cells.join(", "))
                }
            })
            .collect();
        format!("[{}]", tuples.join(", "))
    }
}

/// Run one statement. Whether rows come back is decided by the prepared
/// statement's result columns, so leading comments or parentheses do not
/// matter.
pub async fn execute_query(client: &Client, sql: &str) -> QueryResult {
    let start = Instant::now();
    let sql_trimmed = sql.trim();

    let stmt = match client.prepare(sql_trimmed).await {
        Ok(stmt) => stmt,
        Err(e) => {
            return QueryResult::error(
                StructuredError::from_pg_error(&e, sql_trimmed),
                start.elapsed(),
            )
        }
    };

    if stmt.columns().is_empty() {
        match client.execute(&stmt, &[]).await {
            Ok(affected) => QueryResult {
                affected_rows: Some(affected),
                execution_time: start.elapsed(),
                ..QueryResult::empty()
            },
            Err(e) => QueryResult::error(
                StructuredError::from_pg_error(&e, sql_trimmed),
                start.elapsed(),
            ),
        }
    } else {
        match client.query(&stmt, &[]).await {
            Ok(rows) => {
                let mut result = parse_rows(&rows, start.elapsed());
                if result.columns.is_empty() {
                    result.columns = stmt
                        .columns()
                        .iter()
                        .map(|col| ColumnInfo {
                            name: col.name().to_string(),
                            type_name: col.type_().name().to_string(),
                        })
                        .collect();
                }
                result
            }
            Err(e) => QueryResult::error(
                StructuredError::from_pg_error(&e, sql_trimmed),
                start.elapsed(),
            ),
        }
    }
}

pub(crate) fn parse_rows(rows: &[Row], execution_time: Duration) -> QueryResult {
    let Some(first_row) = rows.first() else {
        return QueryResult {
            execution_time,
            ..QueryResult::empty()
        };
    };

    let columns: Vec<ColumnInfo> = first_row
        .columns()
        .iter()
        .map(|col| ColumnInfo {
            name: col.name().to_string(),
            type_name: col.type_().name().to_string(),
        })
        .collect();

    let rows = rows
        .iter()
        .map(|row| {
            row.columns()
                .iter()
                .enumerate()
                .map(|(i, col)| extract_value(row, i, col.type_()))
                .collect()
        })
        .collect();

    QueryResult {
        columns,
        rows,
        execution_time,
        affected_rows: None,
        error: None,
    }
}

/// NUMERIC read from its binary wire format into exact decimal text.
struct PgNumeric(String);

impl<'a> FromSql<'a> for PgNumeric {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        decode_numeric(raw).map(PgNumeric)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

/// Decode the base-10000 NUMERIC wire format:
/// ndigits, weight, sign, dscale (all 16-bit), then ndigits 16-bit digits.
fn decode_numeric(raw: &[u8]) -> Result<String, Box<dyn StdError + Sync + Send>> {
    let word = |i: usize| -> Result<u16, Box<dyn StdError + Sync + Send>> {
        raw.get(i * 2..i * 2 + 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .ok_or_else(|| "truncated numeric value".into())
    };

    let ndigits = word(0)? as usize;
    let weight = word(1)? as i16 as isize;
    let sign = word(2)?;
    let dscale = word(3)? as usize;
    let digits = (0..ndigits)
        .map(|i| word(4 + i))
        .collect::<Result<Vec<u16>, _>>()?;

    match sign {
        0xC000 => return Ok("NaN".to_string()),
        0xD000 => return Ok("Infinity".to_string()),
        0xF000 => return Ok("-Infinity".to_string()),
        _ => {}
    }

    let digit_at = |k: isize| -> u16 {
        if k < 0 {
            0
        } else {
            digits.get(k as usize).copied().unwrap_or(0)
        }
    };

    let mut out = String::new();
    if sign == 0x4000 {
        out.push('-');
    }

    if weight < 0 {
        out.push('0');
    } else {
        for k in 0..=weight {
            if k == 0 {
                out.push_str(&digit_at(k).to_string());
            } else {
                out.push_str(&format!("{:04}", digit_at(k)));
            }
        }
    }

    if dscale > 0 {
        let mut frac = String::with_capacity(dscale + 4);
        let mut k = weight + 1;
        while frac.len() < dscale {
            frac.push_str(&format!("{:04}", digit_at(k)));
            k += 1;
        }
        frac.truncate(dscale);
        out.push('.');
        out.push_str(&frac);
    }

    Ok(out)
}

fn extract_value(row: &Row, idx: usize, pg_type: &Type) -> CellValue {
    fn get<'a, T: FromSql<'a>>(row: &'a Row, idx: usize) -> Option<T> {
        row.try_get::<_, Option<T>>(idx).ok().flatten()
    }

    let value = match *pg_type {
        Type::BOOL => get::<bool>(row, idx).map(CellValue::Bool),
        Type::INT2 => get::<i16>(row, idx).map(CellValue::Int16),
        Type::INT4 => get::<i32>(row, idx).map(CellValue::Int32),
        Type::INT8 => get::<i64>(row, idx).map(CellValue::Int64),
        Type::FLOAT4 => get::<f32>(row, idx).map(CellValue::Float32),
        Type::FLOAT8 => get::<f64>(row, idx).map(CellValue::Float64),
        Type::NUMERIC => get::<PgNumeric>(row, idx).map(|n| CellValue::Numeric(n.0)),
        Type::BYTEA => get::<Vec<u8>>(row, idx).map(CellValue::Bytes),
        Type::DATE => get::<NaiveDate>(row, idx).map(CellValue::Date),
        Type::TIME => get::<NaiveTime>(row, idx).map(CellValue::Time),
        Type::TIMESTAMP => get::<NaiveDateTime>(row, idx).map(CellValue::DateTime),
        Type::TIMESTAMPTZ => get::<DateTime<Utc>>(row, idx).map(CellValue::TimestampTz),
        Type::JSON | Type::JSONB => get::<serde_json::Value>(row, idx).map(CellValue::Json),
        Type::INT4_ARRAY => get::<Vec<Option<i32>>>(row, idx).map(|v| {
            CellValue::Array(
                v.into_iter()
                    .map(|i| i.map(CellValue::Int32).unwrap_or(CellValue::Null))
                    .collect(),
            )
        }),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => {
            get::<Vec<Option<String>>>(row, idx).map(|v| {
                CellValue::Array(
                    v.into_iter()
                        .map(|s| s.map(CellValue::Text).unwrap_or(CellValue::Null))
                        .collect(),
                )
            })
        }
        // TEXT, VARCHAR, NAME, BPCHAR and anything else that decodes as a string
        _ => get::<String>(row, idx).map(CellValue::Text),
    };
    value.unwrap_or_else(|| match row.try_get::<_, Option<RawValue>>(idx) {
        Ok(Some(raw)) => decode_other(pg_type, raw.0),
        _ => CellValue::Null,
    })
}

/// Undecoded bytes of any non-NULL value.
struct RawValue<'a>(&'a [u8]);

impl<'a> FromSql<'a> for RawValue<'a> {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        Ok(RawValue(raw))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

/// Decode the binary form of types without a typed decoder above. Anything
/// still unknown becomes [`CellValue::Unsupported`], never `Null`.
fn decode_other(ty: &Type, raw: &[u8]) -> CellValue {
    let decoded = match *ty {
        Type::UUID => decode_uuid(raw).map(CellValue::Text),
        Type::INTERVAL => decode_interval(raw).map(CellValue::Text),
        Type::MONEY => fixed::<8>(raw)
            .map(|b| CellValue::Numeric(format_cents(i64::from_be_bytes(b)))),
        Type::INET | Type::CIDR => decode_inet(raw, *ty == Type::CIDR).map(CellValue::Text),
        Type::OID => fixed::<4>(raw).map(|b| CellValue::Int64(u32::from_be_bytes(b) as i64)),
        _ if matches!(ty.kind(), Kind::Enum(_)) => {
            std::str::from_utf8(raw).ok().map(|s| CellValue::Text(s.to_string()))
        }
        _ => None,
    };
    decoded.unwrap_or_else(|| CellValue::Unsupported(ty.name().to_string()))
}

fn fixed<const N: usize>(raw: &[u8]) -> Option<[u8; N]> {
    raw.try_into().ok()
}

fn decode_uuid(raw: &[u8]) -> Option<String> {
    let bytes = fixed::<16>(raw)?;
    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    Some(format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    ))
}

/// PostgreSQL's default interval style: `1 year 2 mons 3 days 04:05:06.5`.
fn decode_interval(raw: &[u8]) -> Option<String> {
    if raw.len() != 16 {
        return None;
    }
    let micros = i64::from_be_bytes(fixed::<8>(&raw[0..8])?);
    let days = i32::from_be_bytes(fixed::<4>(&raw[8..12])?);
    let months = i32::from_be_bytes(fixed::<4>(&raw[12..16])?);

    let plural = |n: i32, one: &str, many: &str| {
        format!("{} {}", n, if n.abs() == 1 { one } else { many })
    };
    let mut parts = Vec::new();
    if months / 12 != 0 {
        parts.push(plural(months / 12, "year", "years"));
    }
    if months % 12 != 0 {
        parts.push(plural(months % 12, "mon", "mons"));
    }
    if days != 0 {
        parts.push(plural(days, "day", "days"));
    }
    if micros != 0 || parts.is_empty() {
        let sign = if micros < 0 { "-" } else { "" };
        let total = micros.unsigned_abs();
        let secs = total / 1_000_000;
        let mut time = format!(
            "{}{:02}:{:02}:{:02}",
            sign,
            secs / 3600,
            secs / 60 % 60,
            secs % 60
        );
        let frac = total % 1_000_000;
        if frac != 0 {
            let digits = format!("{:06}", frac);
            time.push('.');
            time.push_str(digits.trim_end_matches('0'));
        }
        parts.push(time);
    }
    Some(parts.join(" "))
}

fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// inet/cidr wire form: family, bits, is_cidr, address length, address.
fn decode_inet(raw: &[u8], cidr: bool) -> Option<String> {
    let (&family, rest) = raw.split_first()?;
    let bits = *rest.first()?;
    let addr_bytes = rest.get(3..)?;
    let (addr, max_bits) = match family {
        2 => (IpAddr::from(fixed::<4>(addr_bytes)?), 32),
        3 => (IpAddr::from(fixed::<16>(addr_bytes)?), 128),
        _ => return None,
    };
    if cidr || bits != max_bits {
        Some(format!("{}/{}", addr, bits))
    } else {
        Some(addr.to_string())
    }
}

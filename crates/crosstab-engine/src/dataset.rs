//! The ephemeral, session-scoped relation holding loaded records.

use crosstab_core::{quote_ident, ColumnSchema, ColumnType, FieldValue, PivotResult, Record};
use log::debug;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Name of the single relation a dataset provisions. Every dataset owns a
/// private in-memory database, so the fixed name is never shared between
/// concurrent sessions.
pub const RELATION_NAME: &str = "pivot_records";

pub type StorageResult<T> = Result<T, StorageError>;

/// A relational-engine fault, reported with the failing operation and a
/// coarse fault category. The engine's raw error text (which can echo query
/// text) is logged at debug level but never surfaced to callers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("relational engine failure during {operation}: {kind}")]
    Engine {
        operation: &'static str,
        kind: &'static str,
    },

    #[error("dataset worker failed during {operation}")]
    Worker { operation: &'static str },
}

fn fault_kind(err: &rusqlite::Error) -> &'static str {
    use rusqlite::ErrorCode;
    match err {
        rusqlite::Error::SqliteFailure(cause, _) => match cause.code {
            ErrorCode::ConstraintViolation => "constraint violation",
            ErrorCode::TypeMismatch => "type coercion failure",
            ErrorCode::OutOfMemory | ErrorCode::DiskFull | ErrorCode::TooBig => {
                "resource exhaustion"
            }
            _ => "engine fault",
        },
        rusqlite::Error::InvalidColumnType(..) => "type coercion failure",
        _ => "engine fault",
    }
}

async fn run_blocking<T, F>(operation: &'static str, f: F) -> StorageResult<T>
where
    F: FnOnce() -> rusqlite::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            debug!("sqlite failure during {operation}: {err}");
            Err(StorageError::Engine {
                operation,
                kind: fault_kind(&err),
            })
        }
        Err(err) => {
            debug!("blocking task failure during {operation}: {err}");
            Err(StorageError::Worker { operation })
        }
    }
}

/// A disposable relation scoped to one pivot session.
///
/// States: empty after [`create`](Self::create), loaded after
/// [`load`](Self::load), queried repeatedly, cleared by
/// [`clear`](Self::clear). Dropping the dataset drops the whole in-memory
/// database, so nothing carries over into unrelated sessions.
#[derive(Clone, Debug)]
pub struct EphemeralDataset {
    conn: Arc<Mutex<Connection>>,
    columns: Arc<Vec<(String, ColumnType)>>,
}

impl EphemeralDataset {
    /// Provision a relation matching the inferred schema on a fresh private
    /// in-memory database. A schema column named `id` becomes the identity
    /// key; duplicate identities are skipped on load.
    pub async fn create(schema: &ColumnSchema) -> StorageResult<Self> {
        let columns: Vec<(String, ColumnType)> = schema
            .columns()
            .map(|(name, ty)| (name.to_string(), ty))
            .collect();
        let ddl = create_table_sql(&columns);

        let conn = run_blocking("create", move || {
            let conn = Connection::open_in_memory()?;
            conn.execute_batch(&ddl)?;
            Ok(conn)
        })
        .await?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            columns: Arc::new(columns),
        })
    }

    /// Bulk-insert all records inside one transaction. Records colliding with
    /// an existing row's identity key are silently skipped; fields missing
    /// from a record insert as NULL.
    pub async fn load(&self, records: &[Record]) -> StorageResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let conn = Arc::clone(&self.conn);
        let columns = Arc::clone(&self.columns);
        let records = records.to_vec();

        run_blocking("load", move || {
            let mut conn = conn.lock().expect("dataset mutex poisoned");
            let tx = conn.transaction()?;
            {
                let column_list: Vec<String> =
                    columns.iter().map(|(name, _)| quote_ident(name)).collect();
                let placeholders: Vec<String> =
                    (1..=columns.len()).map(|i| format!("?{i}")).collect();
                let sql = format!(
                    "INSERT OR IGNORE INTO {} ({}) VALUES ({})",
                    quote_ident(RELATION_NAME),
                    column_list.join(", "),
                    placeholders.join(", "),
                );
                let mut stmt = tx.prepare(&sql)?;
                for record in &records {
                    let params = columns.iter().map(|(name, _)| sql_value(record.get(name)));
                    stmt.execute(rusqlite::params_from_iter(params))?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Execute one query and return its rows as a column-ordered grid.
    pub async fn query(&self, sql: &str) -> StorageResult<PivotResult> {
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();

        run_blocking("query", move || {
            let conn = conn.lock().expect("dataset mutex poisoned");
            let mut stmt = conn.prepare(&sql)?;
            let columns: Vec<String> = stmt
                .column_names()
                .into_iter()
                .map(|name| name.to_string())
                .collect();
            let width = columns.len();

            let mut rows = stmt.query([])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let mut values = Vec::with_capacity(width);
                for idx in 0..width {
                    values.push(field_value(row.get_ref(idx)?));
                }
                out.push(values);
            }
            Ok(PivotResult { columns, rows: out })
        })
        .await
    }

    /// Distinct values of one column in first-encounter (load) order. Used by
    /// bucket auto-discovery; issued as a single scan.
    pub async fn distinct_values(&self, column: &str) -> StorageResult<Vec<FieldValue>> {
        let sql = format!(
            "SELECT {col} FROM {rel} GROUP BY {col} ORDER BY MIN(rowid)",
            col = quote_ident(column),
            rel = quote_ident(RELATION_NAME),
        );
        let result = self.query(&sql).await?;
        Ok(result
            .rows
            .into_iter()
            .filter_map(|mut row| row.pop())
            .collect())
    }

    /// Number of rows currently loaded.
    pub async fn row_count(&self) -> StorageResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(RELATION_NAME));
        let result = self.query(&sql).await?;
        match result.rows.first().and_then(|row| row.first()) {
            Some(FieldValue::Number(n)) => Ok(*n as u64),
            _ => Ok(0),
        }
    }

    /// Truncate all rows and reset the autoincrement counter while keeping
    /// the relation definition. Idempotent; a no-op on a never-loaded or
    /// already-cleared dataset.
    pub async fn clear(&self) -> StorageResult<()> {
        let conn = Arc::clone(&self.conn);

        run_blocking("clear", move || {
            let conn = conn.lock().expect("dataset mutex poisoned");
            conn.execute(&format!("DELETE FROM {}", quote_ident(RELATION_NAME)), [])?;

            // sqlite_sequence only exists once an AUTOINCREMENT table has
            // been written to.
            let has_sequence: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'sqlite_sequence')",
                [],
                |row| row.get(0),
            )?;
            if has_sequence {
                conn.execute(
                    "DELETE FROM sqlite_sequence WHERE name = ?1",
                    [RELATION_NAME],
                )?;
            }
            Ok(())
        })
        .await
    }
}

fn create_table_sql(columns: &[(String, ColumnType)]) -> String {
    let defs: Vec<String> = columns
        .iter()
        .map(|(name, ty)| {
            let sql_type = match ty {
                ColumnType::Numeric => "REAL",
                ColumnType::Text => "TEXT",
            };
            if name == "id" {
                format!("{} {} PRIMARY KEY", quote_ident(name), sql_type)
            } else {
                format!("{} {}", quote_ident(name), sql_type)
            }
        })
        .collect();
    format!(
        "CREATE TABLE {} ({});",
        quote_ident(RELATION_NAME),
        defs.join(", ")
    )
}

fn sql_value(value: Option<&FieldValue>) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;
    match value {
        None | Some(FieldValue::Null) => Sql::Null,
        Some(FieldValue::Number(n)) => Sql::Real(*n),
        Some(FieldValue::Text(s)) => Sql::Text(s.clone()),
        // Booleans are Text-typed by inference and compared as text literals.
        Some(FieldValue::Bool(b)) => Sql::Text(if *b { "true" } else { "false" }.to_string()),
    }
}

fn field_value(value: ValueRef<'_>) -> FieldValue {
    match value {
        ValueRef::Null => FieldValue::Null,
        ValueRef::Integer(i) => FieldValue::Number(i as f64),
        ValueRef::Real(f) => FieldValue::Number(f),
        ValueRef::Text(bytes) => FieldValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        // This engine never writes blobs.
        ValueRef::Blob(_) => FieldValue::Null,
    }
}

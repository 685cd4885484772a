//! Purpose: Uncached execution of arbitrary SQL text with per-row callbacks.
//! Exports: `SqlRow`, `RowControl`, `SqlSummary`.
//! Role: Escape hatch behind `Store::run_sql`; none of these statements are cached.
//! Invariants: Values are rendered as text the way the engine's exec interface does;
//! NULL stays `None`.
use rusqlite::types::ValueRef;
use rusqlite::{Batch, Connection, ffi};

use crate::core::error::{Error, ErrorKind};

/// Returned by a row callback to keep going or stop the whole run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RowControl {
    Continue,
    Abort,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SqlSummary {
    pub statements: usize,
    pub rows: usize,
}

/// One result row; valid only for the duration of the callback.
#[derive(Clone, Copy, Debug)]
pub struct SqlRow<'a> {
    columns: &'a [String],
    values: &'a [Option<String>],
}

impl<'a> SqlRow<'a> {
    pub fn columns(&self) -> &'a [String] {
        self.columns
    }

    pub fn values(&self) -> &'a [Option<String>] {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of the first column named `name`; `None` for NULL or unknown columns.
    pub fn get(&self, name: &str) -> Option<&'a str> {
        let index = self.columns.iter().position(|column| column == name)?;
        self.values[index].as_deref()
    }
}

pub(crate) fn run<F>(conn: &Connection, sql: &str, mut on_row: F) -> Result<SqlSummary, Error>
where
    F: FnMut(&SqlRow<'_>) -> RowControl,
{
    let mut summary = SqlSummary::default();
    let mut batch = Batch::new(conn, sql);
    while let Some(mut stmt) = batch.next().map_err(engine_error)? {
        summary.statements += 1;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut values = Vec::with_capacity(columns.len());
        let mut rows = stmt.raw_query();
        while let Some(row) = rows.next().map_err(engine_error)? {
            values.clear();
            for index in 0..columns.len() {
                values.push(render(row.get_ref(index).map_err(engine_error)?));
            }
            summary.rows += 1;
            let row = SqlRow {
                columns: &columns,
                values: &values,
            };
            if on_row(&row) == RowControl::Abort {
                return Err(Error::new(ErrorKind::Engine)
                    .with_engine_code(ffi::SQLITE_ABORT)
                    .with_message("query aborted by row callback"));
            }
        }
    }
    Ok(summary)
}

fn render(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(int) => Some(int.to_string()),
        ValueRef::Real(real) => Some(render_real(real)),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

// Integral reals keep a trailing ".0" so they stay distinguishable from integers.
fn render_real(real: f64) -> String {
    if real.is_finite() && real.fract() == 0.0 && real.abs() < 1e15 {
        format!("{real:.1}")
    } else {
        real.to_string()
    }
}

fn engine_error(err: rusqlite::Error) -> Error {
    Error::from_engine(ErrorKind::Engine, err)
}

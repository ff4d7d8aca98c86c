//! Text rendering of query results.

use std::fmt;

use sqlx::postgres::PgRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

/// Width of every rendered column.
const COLUMN_WIDTH: usize = 12;

/// Rows returned by a query, with every cell rendered as text.
///
/// `None` cells are SQL `NULL`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { columns, rows }
    }

    /// Convert raw rows. Column names are taken from the first row, so an
    /// empty result has no columns.
    pub fn from_rows(rows: &[PgRow]) -> Result<Self, sqlx::Error> {
        let columns = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_owned()).collect())
            .unwrap_or_default();

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut cells = Vec::with_capacity(row.len());
            for idx in 0..row.len() {
                cells.push(cell_text(row, idx)?);
            }
            out.push(cells);
        }

        Ok(Self::new(columns, out))
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the named column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Text of a cell in the named column, or `None` when the row, column,
    /// or value is missing.
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)?.as_deref()
    }
}

fn cell_text(row: &PgRow, idx: usize) -> Result<Option<String>, sqlx::Error> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(None);
    }
    let type_name = raw.type_info().name().to_owned();
    let text = match type_name.as_str() {
        "INT2" => row.try_get::<i16, _>(idx)?.to_string(),
        "INT4" => row.try_get::<i32, _>(idx)?.to_string(),
        "INT8" => row.try_get::<i64, _>(idx)?.to_string(),
        "BOOL" => row.try_get::<bool, _>(idx)?.to_string(),
        "FLOAT4" => row.try_get::<f32, _>(idx)?.to_string(),
        "FLOAT8" => row.try_get::<f64, _>(idx)?.to_string(),
        // Simple-protocol results arrive in text format, so any other type
        // can be read back verbatim.
        _ => row.try_get_unchecked::<String, _>(idx)?,
    };
    Ok(Some(text))
}

impl fmt::Display for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rows.is_empty() {
            return f.write_str("EMPTY");
        }

        for name in &self.columns {
            write!(f, "|{name:>width$}", width = COLUMN_WIDTH)?;
        }
        f.write_str("|")?;

        for row in &self.rows {
            f.write_str("\n")?;
            for cell in row {
                let text = cell.as_deref().unwrap_or("NULL");
                write!(f, "|{text:>width$}", width = COLUMN_WIDTH)?;
            }
            f.write_str("|")?;
        }
        Ok(())
    }
}

use sqlweave_core::driver::{ColumnRef, RowCursor};
use sqlweave_core::{DbType, Error, Result, Value};

/// Pagination bounds applied while consuming the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowBounds {
    pub offset: usize,
    pub limit: usize,
}

impl Default for RowBounds {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: usize::MAX,
        }
    }
}

impl RowBounds {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Rows drained off a driver cursor, replayable as a cursor themselves.
///
/// Buffering lets the mapper run after the driver statement is closed,
/// which is what allows nested selects to reuse the connection.
pub struct RowBuffer {
    columns: Vec<String>,
    db_types: Vec<DbType>,
    rows: Vec<Vec<Value>>,
    /// 1-based current row; 0 is before the first.
    position: usize,
}

impl RowBuffer {
    /// Drains `cursor`, honoring the row bounds: `offset` rows are
    /// skipped, at most `limit` rows are kept.
    pub fn fetch(cursor: &mut dyn RowCursor, bounds: RowBounds) -> Result<Self> {
        let columns: Vec<String> = cursor.columns().to_vec();
        let mut db_types = Vec::new();
        let mut rows = Vec::new();
        let mut index = 0usize;

        while cursor.advance()? {
            if db_types.is_empty() {
                db_types = columns
                    .iter()
                    .map(|name| cursor.db_type(&ColumnRef::Name(name)))
                    .collect();
            }
            if index < bounds.offset {
                index += 1;
                continue;
            }
            if rows.len() >= bounds.limit {
                break;
            }
            index += 1;
            let row = columns
                .iter()
                .map(|name| cursor.get(&ColumnRef::Name(name)))
                .collect::<Result<Vec<Value>>>()?;
            rows.push(row);
        }

        if db_types.is_empty() {
            db_types = vec![DbType::Other; columns.len()];
        }

        Ok(Self {
            columns,
            db_types,
            rows,
            position: 0,
        })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn column_index(&self, column: &ColumnRef<'_>) -> Result<usize> {
        match column {
            ColumnRef::Ordinal(ordinal) => {
                if *ordinal >= 1 && *ordinal <= self.columns.len() {
                    Ok(ordinal - 1)
                } else {
                    Err(Error::mapping(format!(
                        "column ordinal {ordinal} out of range"
                    )))
                }
            }
            ColumnRef::Name(name) => self
                .columns
                .iter()
                .position(|label| label.eq_ignore_ascii_case(name))
                .ok_or_else(|| Error::mapping(format!("unknown column `{name}`"))),
        }
    }
}

impl RowCursor for RowBuffer {
    fn advance(&mut self) -> Result<bool> {
        if self.position < self.rows.len() {
            self.position += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn get(&self, column: &ColumnRef<'_>) -> Result<Value> {
        let index = self.column_index(column)?;
        let row = self
            .rows
            .get(self.position.wrapping_sub(1))
            .ok_or_else(|| Error::mapping("cursor is not positioned on a row".to_string()))?;
        Ok(row[index].clone())
    }

    fn db_type(&self, column: &ColumnRef<'_>) -> DbType {
        self.column_index(column)
            .map(|index| self.db_types[index])
            .unwrap_or(DbType::Other)
    }
}

//! The database driver interface sqlweave consumes.
//!
//! Drivers are external collaborators: the core prepares statements,
//! binds values through codecs, executes, and walks row cursors. One
//! invocation blocks the calling thread inside [`PreparedStatement::execute`]
//! and cursor iteration; everything else is in-memory work.

use crate::{DbType, Result, Value};

use std::fmt;

/// A live database connection.
pub trait Connection: fmt::Debug {
    /// Prepares a parameterized statement. Placeholders are `?`, ordinals
    /// are 1-based.
    fn prepare<'a>(&'a mut self, sql: &str) -> Result<Box<dyn PreparedStatement + 'a>>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    /// True once the driver has signaled that the connection is unusable;
    /// the owning session must be closed.
    fn is_broken(&self) -> bool {
        false
    }
}

/// A prepared, parameterized statement.
pub trait PreparedStatement {
    fn bind(&mut self, ordinal: usize, value: Value, db_ty: DbType) -> Result<()>;

    /// Registers an OUT-mode parameter at the given ordinal.
    fn register_out(&mut self, ordinal: usize, db_ty: DbType) -> Result<()>;

    fn set_timeout(&mut self, seconds: u64) -> Result<()>;

    fn set_fetch_size(&mut self, size: u32) -> Result<()>;

    fn execute(&mut self) -> Result<Response>;
}

/// The outcome of executing a statement.
pub struct Response {
    pub rows: Rows,
    /// Keys produced by the database for generated-key inserts.
    pub generated_keys: Option<Box<dyn RowCursor>>,
}

pub enum Rows {
    /// Number of rows impacted by the operation.
    Count(u64),

    /// Result rows, as a forward-only cursor.
    Cursor(Box<dyn RowCursor>),
}

impl Response {
    pub fn count(count: u64) -> Self {
        Self {
            rows: Rows::Count(count),
            generated_keys: None,
        }
    }

    pub fn cursor(cursor: Box<dyn RowCursor>) -> Self {
        Self {
            rows: Rows::Cursor(cursor),
            generated_keys: None,
        }
    }

    pub fn with_generated_keys(mut self, keys: Box<dyn RowCursor>) -> Self {
        self.generated_keys = Some(keys);
        self
    }
}

impl Rows {
    pub fn is_count(&self) -> bool {
        matches!(self, Self::Count(_))
    }

    #[track_caller]
    pub fn into_count(self) -> u64 {
        match self {
            Rows::Count(count) => count,
            Rows::Cursor(_) => panic!("expected Rows::Count"),
        }
    }
}

/// Addresses a result column by label or 1-based ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRef<'a> {
    Name(&'a str),
    Ordinal(usize),
}

impl fmt::Display for ColumnRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnRef::Name(name) => f.write_str(name),
            ColumnRef::Ordinal(i) => write!(f, "#{i}"),
        }
    }
}

/// A forward-only row cursor.
pub trait RowCursor {
    /// Advances to the next row; false once the result set is exhausted.
    fn advance(&mut self) -> Result<bool>;

    /// Column labels of the current result set.
    fn columns(&self) -> &[String];

    /// The raw cell value of the current row.
    fn get(&self, column: &ColumnRef<'_>) -> Result<Value>;

    /// The declared database type of the column.
    fn db_type(&self, column: &ColumnRef<'_>) -> DbType;
}

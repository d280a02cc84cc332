use crate::catalog::Catalog;
use crate::executor::Executor;
use crate::result::RowBounds;
use sqlweave_core::meta::Navigator;
use sqlweave_core::value::LazyLoader;
use sqlweave_core::{Connection, Error, Result, Value};

use std::cell::RefCell;
use std::sync::Arc;

/// Opens sessions against a compiled catalog. The factory is cheap to
/// clone and safe to share; sessions are not.
#[derive(Clone)]
pub struct SessionFactory {
    catalog: Arc<Catalog>,
}

impl SessionFactory {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Opens a session over a caller-supplied connection. Sessions must
    /// not be shared between threads.
    pub fn open_session(&self, conn: Box<dyn Connection>) -> Session {
        Session {
            catalog: self.catalog.clone(),
            exec: RefCell::new(Executor::new(self.catalog.clone(), conn)),
        }
    }
}

/// A single-threaded unit of work: statements, the session-local cache
/// tier, and the staging buffers live here until commit, rollback, or
/// close.
pub struct Session {
    catalog: Arc<Catalog>,
    exec: RefCell<Executor>,
}

impl Session {
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn select_list(&self, statement: &str, param: &Value) -> Result<Vec<Value>> {
        self.select_list_with_bounds(statement, param, RowBounds::default())
    }

    pub fn select_list_with_bounds(
        &self,
        statement: &str,
        param: &Value,
        bounds: RowBounds,
    ) -> Result<Vec<Value>> {
        self.exec.borrow_mut().query(statement, param, bounds)
    }

    /// Expects at most one row; more than one fails the invocation.
    pub fn select_one(&self, statement: &str, param: &Value) -> Result<Value> {
        let mut rows = self.select_list(statement, param)?;
        match rows.len() {
            0 => Ok(Value::Null),
            1 => Ok(rows.remove(0)),
            n => Err(Error::mapping(format!(
                "statement `{statement}` returned {n} rows where one was expected"
            ))),
        }
    }

    pub fn insert(&self, statement: &str, param: &mut Value) -> Result<u64> {
        self.exec.borrow_mut().update(statement, param)
    }

    pub fn update(&self, statement: &str, param: &mut Value) -> Result<u64> {
        self.exec.borrow_mut().update(statement, param)
    }

    pub fn delete(&self, statement: &str, param: &mut Value) -> Result<u64> {
        self.exec.borrow_mut().update(statement, param)
    }

    pub fn commit(&self) -> Result<()> {
        self.exec.borrow_mut().commit()
    }

    pub fn rollback(&self) -> Result<()> {
        self.exec.borrow_mut().rollback()
    }

    pub fn close(&self) {
        self.exec.borrow_mut().close();
    }

    /// A navigator wired to this session: reading a deferred property
    /// through it triggers the pending sub-select.
    pub fn navigator(&self) -> Navigator<'_> {
        Navigator::new(&self.catalog.shapes)
            .with_loader(self)
            .aggressive_lazy(self.catalog.settings.aggressive_lazy_loading)
    }
}

impl LazyLoader for Session {
    fn load(&self, statement: &str, param: &Value) -> Result<Value> {
        let rows = self
            .exec
            .borrow_mut()
            .query(statement, param, RowBounds::default())?;
        Ok(Value::List(rows))
    }
}

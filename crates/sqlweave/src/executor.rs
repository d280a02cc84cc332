//! The invocation path: evaluate the SQL source, bind parameters,
//! execute through the driver, map rows, and keep the two cache tiers
//! coherent.

use crate::binder::{self, BoundParam};
use crate::cache::{self, CacheKey, TransactionalCacheManager};
use crate::catalog::{Catalog, CommandKind, MappedStatement};
use crate::result::{NestedQueryRunner, RowBounds, RowBuffer, RowMapper};
use sqlweave_core::driver::{ColumnRef, Connection, Rows};
use sqlweave_core::meta::Navigator;
use sqlweave_core::settings::LocalCacheScope;
use sqlweave_core::{Error, Result, Value};
use sqlweave_sql::BoundSql;

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Drives statements over one connection.
///
/// The executor owns the session-local first cache tier and the staging
/// buffers in front of every shared cache it has touched. It is
/// single-threaded by construction.
pub struct Executor {
    catalog: Arc<Catalog>,
    conn: Box<dyn Connection>,
    local_cache: HashMap<CacheKey, Arc<Vec<Value>>>,
    staging: TransactionalCacheManager,
    closed: bool,
}

impl Executor {
    pub fn new(catalog: Arc<Catalog>, conn: Box<dyn Connection>) -> Self {
        Self {
            catalog,
            conn,
            local_cache: HashMap::new(),
            staging: TransactionalCacheManager::new(),
            closed: false,
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Executes a SELECT and maps its rows.
    pub fn query(&mut self, name: &str, param: &Value, bounds: RowBounds) -> Result<Vec<Value>> {
        self.check_usable()?;
        let catalog = self.catalog.clone();
        let stmt = catalog.statement(name)?;
        if !stmt.kind.is_select() {
            return Err(Error::binding(format!(
                "statement `{}` is not a select",
                stmt.name
            )));
        }

        let bound = self.bind_source(&stmt, param)?;
        let params = binder::resolve_parameters(&bound, param, &catalog)
            .map_err(|err| err.context(Error::binding(format!("in statement `{}`", stmt.name))))?;
        let key = cache_key(&catalog, &stmt, &bound, &params, bounds);

        let shared = stmt.cache.as_ref().and_then(|ns| catalog.cache(ns)).cloned();
        let caching = catalog.settings.cache_enabled && stmt.use_cache;

        if catalog.settings.safe_row_bounds_enabled && !bounds.is_default() && caching {
            return Err(Error::binding(format!(
                "statement `{}` uses the result cache; row bounds are disallowed by safeRowBoundsEnabled",
                stmt.name
            )));
        }

        if let Some(cache) = &shared {
            if stmt.flush_cache {
                self.staging.clear(cache);
            }
            if caching {
                if let Some(hit) = self.staging.get(cache, &key) {
                    if let Some(rows) = cache::as_results(&hit) {
                        debug!(statement = %stmt.name, "second-tier cache hit");
                        return Ok((*rows).clone());
                    }
                }
            }
        }

        if stmt.flush_cache {
            self.local_cache.clear();
        }
        if let Some(rows) = self.local_cache.get(&key) {
            debug!(statement = %stmt.name, "first-tier cache hit");
            return Ok((**rows).clone());
        }

        let results = self.execute_select(&catalog, &stmt, &bound, &params, bounds)?;

        let shared_copy = Arc::new(results.clone());
        self.local_cache.insert(key.clone(), shared_copy.clone());
        if caching {
            if let Some(cache) = &shared {
                self.staging.put(cache, key, shared_copy);
            }
        }
        if catalog.settings.local_cache_scope == LocalCacheScope::Statement {
            self.local_cache.clear();
        }
        Ok(results)
    }

    /// Executes an INSERT, UPDATE, or DELETE and returns the affected row
    /// count. Generated keys are written back into the parameter object.
    pub fn update(&mut self, name: &str, param: &mut Value) -> Result<u64> {
        self.check_usable()?;
        let catalog = self.catalog.clone();
        let stmt = catalog.statement(name)?;
        if stmt.kind.is_select() {
            return Err(Error::binding(format!(
                "statement `{}` is a select; use query",
                stmt.name
            )));
        }

        let bound = self.bind_source(&stmt, param)?;
        let params = binder::resolve_parameters(&bound, param, &catalog)
            .map_err(|err| err.context(Error::binding(format!("in statement `{}`", stmt.name))))?;

        // Writes invalidate the session-local tier immediately and stage
        // a namespace-wide invalidation for commit.
        self.local_cache.clear();
        if stmt.flush_cache {
            if let Some(cache) = stmt.cache.as_ref().and_then(|ns| catalog.cache(ns)) {
                self.staging.clear(cache);
            }
        }

        debug!(statement = %stmt.name, sql = %bound.sql, "executing update");
        let mut prepared = self
            .conn
            .prepare(&bound.sql)
            .map_err(|err| Error::driver(format!("prepare failed: {err}")))?;
        if let Some(timeout) = stmt.timeout {
            prepared.set_timeout(timeout)?;
        }
        binder::apply_parameters(&mut *prepared, &params, &catalog)?;
        let response = prepared.execute().map_err(|err| {
            Error::execution(&stmt.name, &bound.sql, &binder::bound_values(&params), err)
        })?;

        let count = match response.rows {
            Rows::Count(count) => count,
            Rows::Cursor(_) => {
                return Err(Error::mapping(format!(
                    "statement `{}` returned rows where a count was expected",
                    stmt.name
                )))
            }
        };

        if stmt.use_generated_keys && stmt.kind == CommandKind::Insert {
            if let Some(mut keys) = response.generated_keys {
                drop(prepared);
                self.assign_generated_key(&catalog, &stmt, &mut *keys, param)?;
            }
        }

        Ok(count)
    }

    pub fn commit(&mut self) -> Result<()> {
        self.check_usable()?;
        self.conn
            .commit()
            .map_err(|err| err.context(Error::driver("commit failed".to_string())))?;
        self.staging.commit();
        self.local_cache.clear();
        Ok(())
    }

    pub fn rollback(&mut self) -> Result<()> {
        self.check_usable()?;
        self.conn
            .rollback()
            .map_err(|err| err.context(Error::driver("rollback failed".to_string())))?;
        self.staging.rollback();
        self.local_cache.clear();
        Ok(())
    }

    /// Discards session state. Staged cache writes since the last commit
    /// are dropped.
    pub fn close(&mut self) {
        self.staging.rollback();
        self.local_cache.clear();
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn check_usable(&self) -> Result<()> {
        if self.closed {
            return Err(Error::driver("session is closed".to_string()));
        }
        if self.conn.is_broken() {
            return Err(Error::driver(
                "connection is broken; the session must be closed".to_string(),
            ));
        }
        Ok(())
    }

    fn bind_source(&self, stmt: &MappedStatement, param: &Value) -> Result<BoundSql> {
        stmt.source.bind(param, &self.catalog.shapes).map_err(|err| {
            err.context(Error::binding(format!(
                "cannot evaluate statement `{}`",
                stmt.name
            )))
        })
    }

    fn execute_select(
        &mut self,
        catalog: &Arc<Catalog>,
        stmt: &Arc<MappedStatement>,
        bound: &BoundSql,
        params: &[BoundParam],
        bounds: RowBounds,
    ) -> Result<Vec<Value>> {
        debug!(statement = %stmt.name, sql = %bound.sql, "executing query");
        let mut buffer = {
            let mut prepared = self
                .conn
                .prepare(&bound.sql)
                .map_err(|err| Error::driver(format!("prepare failed: {err}")))?;
            if let Some(timeout) = stmt.timeout {
                prepared.set_timeout(timeout)?;
            }
            if let Some(fetch_size) = stmt.fetch_size {
                prepared.set_fetch_size(fetch_size)?;
            }
            binder::apply_parameters(&mut *prepared, params, catalog)?;
            let response = prepared.execute().map_err(|err| {
                Error::execution(&stmt.name, &bound.sql, &binder::bound_values(params), err)
            })?;
            match response.rows {
                Rows::Cursor(mut cursor) => RowBuffer::fetch(&mut *cursor, bounds)?,
                Rows::Count(_) => {
                    return Err(Error::mapping(format!(
                        "statement `{}` returned a count where rows were expected",
                        stmt.name
                    )))
                }
            }
        };

        let mapper = RowMapper::new(catalog);
        mapper.map_results(&mut buffer, &stmt.result_maps[0], self)
    }

    fn assign_generated_key(
        &mut self,
        catalog: &Arc<Catalog>,
        stmt: &Arc<MappedStatement>,
        keys: &mut dyn sqlweave_core::driver::RowCursor,
        param: &mut Value,
    ) -> Result<()> {
        let Some(property) = &stmt.key_property else {
            return Ok(());
        };
        if !keys.advance()? {
            return Ok(());
        }
        let column = match &stmt.key_column {
            Some(column) => ColumnRef::Name(column),
            None => ColumnRef::Ordinal(1),
        };
        let value = keys.get(&column)?;
        Navigator::new(&catalog.shapes)
            .set(param, property, value)
            .map_err(|err| {
                err.context(Error::binding(format!(
                    "cannot assign generated key to `{property}`"
                )))
            })
    }
}

impl NestedQueryRunner for Executor {
    fn run_select(&mut self, statement: &str, param: &Value) -> Result<Vec<Value>> {
        self.query(statement, param, RowBounds::default())
    }
}

/// Builds the cache key from the statement name, pagination bounds,
/// final SQL, ordered bound values, and environment id.
fn cache_key(
    catalog: &Catalog,
    stmt: &MappedStatement,
    bound: &BoundSql,
    params: &[BoundParam],
    bounds: RowBounds,
) -> CacheKey {
    let mut key = CacheKey::new();
    key.update(stmt.name.as_str());
    key.update(Value::U64(bounds.offset as u64));
    key.update(Value::U64(bounds.limit as u64));
    key.update(bound.sql.as_str());
    for value in binder::bound_values(params) {
        key.update(value);
    }
    key.update(catalog.environment.as_str());
    key
}

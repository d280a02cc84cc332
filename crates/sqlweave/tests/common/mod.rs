//! A scripted stub driver: records every prepared SQL and bound value,
//! and replays queued responses in execution order.

#![allow(dead_code)]

use sqlweave_core::driver::{
    ColumnRef, Connection, PreparedStatement, Response, RowCursor,
};
use sqlweave_core::{DbType, Error, Result, Value};

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// One recorded execution: final SQL plus the ordered bind calls.
#[derive(Debug, Clone)]
pub struct Executed {
    pub sql: String,
    pub binds: Vec<(usize, Value, DbType)>,
}

#[derive(Debug, Default)]
pub struct Log {
    pub executed: Vec<Executed>,
    pub commits: usize,
    pub rollbacks: usize,
}

/// A scripted response for one execution.
#[derive(Debug, Clone)]
pub enum Reply {
    Rows {
        columns: Vec<&'static str>,
        rows: Vec<Vec<Value>>,
    },
    Count(u64),
    CountWithKey(u64, Value),
}

#[derive(Debug)]
pub struct StubConnection {
    log: Rc<RefCell<Log>>,
    replies: Rc<RefCell<VecDeque<Reply>>>,
}

impl StubConnection {
    pub fn new() -> (Box<dyn Connection>, Handle) {
        let log = Rc::new(RefCell::new(Log::default()));
        let replies = Rc::new(RefCell::new(VecDeque::new()));
        let conn = StubConnection {
            log: log.clone(),
            replies: replies.clone(),
        };
        (Box::new(conn), Handle { log, replies })
    }
}

/// Test-side handle to the stub's log and reply queue.
#[derive(Clone)]
pub struct Handle {
    pub log: Rc<RefCell<Log>>,
    pub replies: Rc<RefCell<VecDeque<Reply>>>,
}

impl Handle {
    pub fn enqueue(&self, reply: Reply) {
        self.replies.borrow_mut().push_back(reply);
    }

    pub fn executed(&self) -> Vec<Executed> {
        self.log.borrow().executed.clone()
    }

    pub fn last_sql(&self) -> String {
        self.log
            .borrow()
            .executed
            .last()
            .expect("nothing executed")
            .sql
            .clone()
    }

    pub fn last_binds(&self) -> Vec<Value> {
        self.log
            .borrow()
            .executed
            .last()
            .expect("nothing executed")
            .binds
            .iter()
            .map(|(_, value, _)| value.clone())
            .collect()
    }
}

impl Connection for StubConnection {
    fn prepare<'a>(&'a mut self, sql: &str) -> Result<Box<dyn PreparedStatement + 'a>> {
        Ok(Box::new(StubStatement {
            sql: sql.to_string(),
            binds: Vec::new(),
            log: self.log.clone(),
            replies: self.replies.clone(),
        }))
    }

    fn commit(&mut self) -> Result<()> {
        self.log.borrow_mut().commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.log.borrow_mut().rollbacks += 1;
        Ok(())
    }
}

struct StubStatement {
    sql: String,
    binds: Vec<(usize, Value, DbType)>,
    log: Rc<RefCell<Log>>,
    replies: Rc<RefCell<VecDeque<Reply>>>,
}

impl PreparedStatement for StubStatement {
    fn bind(&mut self, ordinal: usize, value: Value, db_ty: DbType) -> Result<()> {
        self.binds.push((ordinal, value, db_ty));
        Ok(())
    }

    fn register_out(&mut self, _ordinal: usize, _db_ty: DbType) -> Result<()> {
        Ok(())
    }

    fn set_timeout(&mut self, _seconds: u64) -> Result<()> {
        Ok(())
    }

    fn set_fetch_size(&mut self, _size: u32) -> Result<()> {
        Ok(())
    }

    fn execute(&mut self) -> Result<Response> {
        self.log.borrow_mut().executed.push(Executed {
            sql: self.sql.clone(),
            binds: self.binds.clone(),
        });
        let reply = self
            .replies
            .borrow_mut()
            .pop_front()
            .unwrap_or(Reply::Count(0));
        Ok(match reply {
            Reply::Rows { columns, rows } => {
                Response::cursor(Box::new(VecCursor::new(columns, rows)))
            }
            Reply::Count(count) => Response::count(count),
            Reply::CountWithKey(count, key) => Response::count(count).with_generated_keys(
                Box::new(VecCursor::new(vec!["key"], vec![vec![key]])),
            ),
        })
    }
}

pub struct VecCursor {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    at: usize,
}

impl VecCursor {
    pub fn new(columns: Vec<&'static str>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns: columns.into_iter().map(String::from).collect(),
            rows,
            at: 0,
        }
    }
}

impl RowCursor for VecCursor {
    fn advance(&mut self) -> Result<bool> {
        if self.at < self.rows.len() {
            self.at += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn get(&self, column: &ColumnRef<'_>) -> Result<Value> {
        let index = match column {
            ColumnRef::Name(name) => self
                .columns
                .iter()
                .position(|label| label.eq_ignore_ascii_case(name))
                .ok_or_else(|| Error::mapping(format!("unknown column `{name}`")))?,
            ColumnRef::Ordinal(ordinal) => ordinal - 1,
        };
        Ok(self.rows[self.at - 1][index].clone())
    }

    fn db_type(&self, _column: &ColumnRef<'_>) -> DbType {
        DbType::Other
    }
}

/// Builds an entry-per-pair map value, the common parameter shape in
/// these tests.
pub fn map(entries: &[(&str, Value)]) -> Value {
    Value::Map(
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
    )
}

//! sqlweave compiles XML mapping definitions into an executable
//! statement catalog, evaluates dynamic SQL against parameter objects,
//! binds typed parameters through codecs, and maps result rows back into
//! object graphs.

pub mod binder;
pub mod cache;
pub mod catalog;
mod compile;
pub mod executor;
pub mod result;
mod session;

pub use catalog::{
    Catalog, CommandKind, Discriminator, MappedStatement, ResultMap, ResultMapping,
};
pub use compile::CatalogBuilder;
pub use executor::Executor;
pub use result::{RowBounds, RowBuffer, RowMapper};
pub use session::{Session, SessionFactory};

pub use sqlweave_core::{
    driver, meta, path, settings, Codec, CodecRegistry, Connection, DbType, Error, ErrorKind,
    Navigator, Result, Settings, Shape, ShapeRegistry, Type, Value,
};
pub use sqlweave_sql as sql;

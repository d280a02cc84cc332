//! Result-set consumption: buffering rows off the driver cursor,
//! splitting mapped from unmapped columns, and mapping rows into object
//! graphs.

mod buffer;
pub use buffer::{RowBounds, RowBuffer};

mod meta;
pub use meta::ResultSetMeta;

mod mapper;
pub use mapper::{NestedQueryRunner, RowMapper};

//! Dynamic SQL for sqlweave: the node tree that statement bodies compile
//! into, the placeholder parser that turns `#{…}` tokens into ordered
//! parameter descriptors, and the evaluation scope dynamic nodes resolve
//! against.

mod buf;
pub use buf::SqlText;

mod descriptor;
pub use descriptor::{ParamMode, ParameterDescriptor};

mod expr;
pub use expr::TestExpr;

mod node;
pub use node::SqlNode;

mod node_bind;
pub use node_bind::BindNode;

mod node_choose;
pub use node_choose::ChooseNode;

mod node_foreach;
pub use node_foreach::ForEachNode;

mod node_if;
pub use node_if::IfNode;

mod node_text;
pub use node_text::{StaticTextNode, TextNode};

mod node_trim;
pub use node_trim::{SetNode, TrimNode, WhereNode};

mod scope;
pub use scope::Scope;

mod source;
pub use source::{BoundSql, DynamicSqlSource, SqlSource, StaticSqlSource};

pub mod token;

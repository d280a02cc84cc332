use crate::{
    BindNode, ChooseNode, ForEachNode, IfNode, Scope, SetNode, SqlText, StaticTextNode, TextNode,
    TrimNode, WhereNode,
};
use sqlweave_core::Result;

/// A fragment of a statement body.
///
/// The variant set is closed: evaluation matches exhaustively, so adding
/// a node kind without handling it is a compile error.
#[derive(Debug, Clone)]
pub enum SqlNode {
    /// Literal text appended unchanged.
    StaticText(StaticTextNode),

    /// Text containing `${…}` segments resolved at evaluation time.
    Text(TextNode),

    If(IfNode),

    Choose(ChooseNode),

    Trim(TrimNode),

    Where(WhereNode),

    Set(SetNode),

    ForEach(ForEachNode),

    /// `<bind>`: computes a value into the evaluation scope.
    Bind(BindNode),

    /// An ordered sequence of children.
    Mixed(Vec<SqlNode>),
}

impl SqlNode {
    /// Evaluates the node against the scope, appending into the
    /// accumulator.
    pub fn apply(&self, scope: &mut Scope<'_>, out: &mut SqlText) -> Result<()> {
        match self {
            SqlNode::StaticText(node) => node.apply(out),
            SqlNode::Text(node) => node.apply(scope, out),
            SqlNode::If(node) => node.apply(scope, out),
            SqlNode::Choose(node) => node.apply(scope, out),
            SqlNode::Trim(node) => node.apply(scope, out),
            SqlNode::Where(node) => node.apply(scope, out),
            SqlNode::Set(node) => node.apply(scope, out),
            SqlNode::ForEach(node) => node.apply(scope, out),
            SqlNode::Bind(node) => node.apply(scope, out),
            SqlNode::Mixed(children) => {
                for child in children {
                    child.apply(scope, out)?;
                }
                Ok(())
            }
        }
    }

    /// A statement body is dynamic when any node requires per-invocation
    /// evaluation.
    pub fn is_dynamic(&self) -> bool {
        match self {
            SqlNode::StaticText(_) => false,
            SqlNode::Mixed(children) => children.iter().any(SqlNode::is_dynamic),
            _ => true,
        }
    }

    pub fn static_text(text: impl Into<String>) -> Self {
        Self::StaticText(StaticTextNode::new(text))
    }

    pub fn mixed(children: Vec<SqlNode>) -> Self {
        Self::Mixed(children)
    }
}

use crate::{Scope, SqlNode, SqlText, TestExpr};
use sqlweave_core::Result;

/// `<choose>`: evaluates `<when>` branches in declaration order, stopping
/// at the first truthy test; falls through to `<otherwise>` when none
/// match.
#[derive(Debug, Clone)]
pub struct ChooseNode {
    whens: Vec<(TestExpr, SqlNode)>,
    otherwise: Option<Box<SqlNode>>,
}

impl ChooseNode {
    pub fn new(whens: Vec<(TestExpr, SqlNode)>, otherwise: Option<SqlNode>) -> Self {
        Self {
            whens,
            otherwise: otherwise.map(Box::new),
        }
    }

    pub fn apply(&self, scope: &mut Scope<'_>, out: &mut SqlText) -> Result<()> {
        for (test, body) in &self.whens {
            if test.eval_bool(scope)? {
                return body.apply(scope, out);
            }
        }
        if let Some(otherwise) = &self.otherwise {
            otherwise.apply(scope, out)?;
        }
        Ok(())
    }
}

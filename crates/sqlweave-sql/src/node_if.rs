use crate::{Scope, SqlNode, SqlText, TestExpr};
use sqlweave_core::Result;

/// `<if test="…">`: evaluates its child only when the test is truthy.
#[derive(Debug, Clone)]
pub struct IfNode {
    test: TestExpr,
    body: Box<SqlNode>,
}

impl IfNode {
    pub fn new(test: TestExpr, body: SqlNode) -> Self {
        Self {
            test,
            body: Box::new(body),
        }
    }

    pub fn apply(&self, scope: &mut Scope<'_>, out: &mut SqlText) -> Result<()> {
        if self.test.eval_bool(scope)? {
            self.body.apply(scope, out)?;
        }
        Ok(())
    }
}

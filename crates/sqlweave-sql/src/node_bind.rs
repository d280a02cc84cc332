use crate::{Scope, SqlText, TestExpr};
use sqlweave_core::Result;

/// `<bind name="…" value="…">`: computes a value into the current scope
/// for subsequent nodes. The binding also travels with the bound SQL so
/// `#{…}` references to it resolve at binding time.
#[derive(Debug, Clone)]
pub struct BindNode {
    name: String,
    value: TestExpr,
}

impl BindNode {
    pub fn new(name: impl Into<String>, value: TestExpr) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn apply(&self, scope: &mut Scope<'_>, out: &mut SqlText) -> Result<()> {
        let value = self.value.eval(scope)?;
        scope.bind(&self.name, value.clone());
        out.bind_extra(&self.name, value);
        Ok(())
    }
}

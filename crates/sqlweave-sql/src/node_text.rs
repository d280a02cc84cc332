use crate::{token, Scope, SqlText};
use sqlweave_core::{Error, Result, Value};

/// Literal SQL text; whitespace is preserved verbatim.
#[derive(Debug, Clone)]
pub struct StaticTextNode {
    text: String,
}

impl StaticTextNode {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn apply(&self, out: &mut SqlText) -> Result<()> {
        out.push_str(&self.text);
        Ok(())
    }
}

/// Text containing `${…}` segments substituted literally at evaluation
/// time (schema names, ORDER BY columns). No binding is produced.
#[derive(Debug, Clone)]
pub struct TextNode {
    text: String,
}

impl TextNode {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn apply(&self, scope: &mut Scope<'_>, out: &mut SqlText) -> Result<()> {
        let rendered = token::parse_tokens(&self.text, "${", "}", &mut |expr| {
            let value = scope.resolve(expr.trim())?;
            stringify(&value)
        })?;
        out.push_str(&rendered);
        Ok(())
    }
}

/// Renders a scope value as literal SQL text, unquoted.
fn stringify(value: &Value) -> Result<String> {
    Ok(match value {
        Value::Null => "null".to_string(),
        Value::String(s) => s.clone(),
        Value::Bool(v) => v.to_string(),
        Value::Uuid(v) => v.to_string(),
        Value::Enum(v) => v.variant.clone(),
        Value::F32(v) => v.to_string(),
        Value::F64(v) => v.to_string(),
        other => match other.as_i128() {
            Some(wide) => wide.to_string(),
            None => {
                return Err(Error::binding(format!(
                    "cannot interpolate a {} into SQL text",
                    other.kind_name()
                )))
            }
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlweave_core::meta::Navigator;
    use sqlweave_core::ShapeRegistry;

    #[test]
    fn interpolation_substitutes_unquoted() {
        let reg = ShapeRegistry::new();
        let param = Value::Map(
            [
                ("alias".to_string(), Value::string("p")),
                ("limit".to_string(), Value::I64(10)),
            ]
            .into_iter()
            .collect(),
        );
        let mut scope = Scope::new(Navigator::new(&reg), &param);
        let mut out = SqlText::new();
        TextNode::new("SELECT ${alias}.id FROM t LIMIT ${limit}")
            .apply(&mut scope, &mut out)
            .unwrap();
        let (sql, _) = out.into_parts();
        assert_eq!(sql, "SELECT p.id FROM t LIMIT 10");
    }

    #[test]
    fn interpolating_a_container_fails() {
        let reg = ShapeRegistry::new();
        let param = Value::Map(
            [("xs".to_string(), Value::List(vec![Value::I64(1)]))]
                .into_iter()
                .collect(),
        );
        let mut scope = Scope::new(Navigator::new(&reg), &param);
        let mut out = SqlText::new();
        let err = TextNode::new("${xs}").apply(&mut scope, &mut out).unwrap_err();
        assert_eq!(err.kind(), sqlweave_core::ErrorKind::Binding);
    }
}

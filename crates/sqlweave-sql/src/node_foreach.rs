use crate::{token, Scope, SqlNode, SqlText, TestExpr};
use sqlweave_core::{path, Error, Result, Value};

/// `<foreach>`: iterates a sequence or mapping, evaluating its body once
/// per element under a fresh local scope.
///
/// Placeholders inside the body that reference the item or index variable
/// are rewritten to uniquified names bound alongside the SQL, so each
/// iteration produces its own `?` binding.
#[derive(Debug, Clone)]
pub struct ForEachNode {
    collection: TestExpr,
    item: String,
    index: Option<String>,
    open: String,
    close: String,
    separator: String,
    body: Box<SqlNode>,
}

impl ForEachNode {
    pub fn new(
        collection: TestExpr,
        item: impl Into<String>,
        index: Option<String>,
        open: impl Into<String>,
        close: impl Into<String>,
        separator: impl Into<String>,
        body: SqlNode,
    ) -> Self {
        Self {
            collection,
            item: item.into(),
            index,
            open: open.into(),
            close: close.into(),
            separator: separator.into(),
            body: Box::new(body),
        }
    }

    pub fn apply(&self, scope: &mut Scope<'_>, out: &mut SqlText) -> Result<()> {
        let collection = self.collection.eval(scope)?;
        let entries: Vec<(Value, Value)> = match collection {
            Value::Null => {
                return Err(Error::binding(format!(
                    "foreach collection `{}` resolved to null",
                    self.collection.src()
                )))
            }
            Value::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| (Value::I64(i as i64), item))
                .collect(),
            Value::Map(map) => map
                .into_iter()
                .map(|(key, value)| (Value::String(key), value))
                .collect(),
            other => {
                return Err(Error::binding(format!(
                    "foreach collection `{}` must be a sequence or mapping, found {}",
                    self.collection.src(),
                    other.kind_name()
                )))
            }
        };

        out.push_str(&self.open);
        for (n, (index, item)) in entries.into_iter().enumerate() {
            if n > 0 {
                out.push_str(&self.separator);
            }

            let unique = out.next_unique();
            let item_key = frame_name(&self.item, unique);
            out.bind_extra(item_key.clone(), item.clone());
            let index_key = self.index.as_deref().map(|name| {
                let key = frame_name(name, unique);
                out.bind_extra(key.clone(), index.clone());
                key
            });

            scope.push_frame();
            scope.bind(&self.item, item);
            if let Some(name) = &self.index {
                scope.bind(name, index);
            }
            let start = out.len();
            let applied = self.body.apply(scope, out);
            scope.pop_frame();
            applied?;

            let fragment = out.split_off(start);
            let rewritten = rewrite_placeholders(
                &fragment,
                &self.item,
                &item_key,
                self.index.as_deref(),
                index_key.as_deref(),
            )?;
            out.push_str(&rewritten);
        }
        out.push_str(&self.close);
        Ok(())
    }
}

fn frame_name(name: &str, unique: usize) -> String {
    format!("__frch_{name}_{unique}")
}

/// Rewrites `#{item…}` and `#{index…}` references in the fragment to the
/// uniquified frame names.
fn rewrite_placeholders(
    fragment: &str,
    item: &str,
    item_key: &str,
    index: Option<&str>,
    index_key: Option<&str>,
) -> Result<String> {
    token::parse_tokens(fragment, "#{", "}", &mut |content| {
        let (prop, options) = match content.find(',') {
            Some(split) => (&content[..split], &content[split..]),
            None => (content, ""),
        };
        let prop = prop.trim();
        let (first, _) = path::split_first(prop)?;

        let replaced = if first.name == item {
            Some(item_key)
        } else if index.is_some_and(|name| name == first.name) {
            index_key
        } else {
            None
        };

        Ok(match replaced {
            Some(key) => {
                let rest = &prop[first.name.len()..];
                format!("#{{{key}{rest}{options}}}")
            }
            None => format!("#{{{content}}}"),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_item_references_only() {
        let out = rewrite_placeholders(
            "#{i} #{i.x} #{other} #{ix}",
            "i",
            "__frch_i_0",
            Some("ix"),
            Some("__frch_ix_0"),
        )
        .unwrap();
        assert_eq!(
            out,
            "#{__frch_i_0} #{__frch_i_0.x} #{other} #{__frch_ix_0}"
        );
    }

    #[test]
    fn keeps_options_intact() {
        let out = rewrite_placeholders(
            "#{i, jdbcType=BIGINT}",
            "i",
            "__frch_i_3",
            None,
            None,
        )
        .unwrap();
        assert_eq!(out, "#{__frch_i_3, jdbcType=BIGINT}");
    }
}

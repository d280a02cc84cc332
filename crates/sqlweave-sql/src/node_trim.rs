use crate::{Scope, SqlNode, SqlText};
use sqlweave_core::Result;

/// `<trim>`: evaluates its child into an isolated region, strips one
/// matching prefix override and one matching suffix override
/// (case-insensitively), and wraps the remainder in prefix/suffix when it
/// is non-empty. An empty region emits nothing at all.
#[derive(Debug, Clone)]
pub struct TrimNode {
    prefix: Option<String>,
    suffix: Option<String>,
    prefix_overrides: Vec<String>,
    suffix_overrides: Vec<String>,
    body: Box<SqlNode>,
}

impl TrimNode {
    pub fn new(
        prefix: Option<String>,
        suffix: Option<String>,
        prefix_overrides: Vec<String>,
        suffix_overrides: Vec<String>,
        body: SqlNode,
    ) -> Self {
        Self {
            prefix,
            suffix,
            prefix_overrides,
            suffix_overrides,
            body: Box::new(body),
        }
    }

    pub fn apply(&self, scope: &mut Scope<'_>, out: &mut SqlText) -> Result<()> {
        let start = out.len();
        self.body.apply(scope, out)?;
        let fragment = out.split_off(start);

        let trimmed = fragment.trim();
        if trimmed.is_empty() {
            return Ok(());
        }

        let mut text = trimmed;
        for over in &self.prefix_overrides {
            if starts_with_ignore_case(text, over) {
                text = &text[over.len()..];
                break;
            }
        }
        for over in &self.suffix_overrides {
            if ends_with_ignore_case(text, over) {
                text = &text[..text.len() - over.len()];
                break;
            }
        }

        if let Some(prefix) = &self.prefix {
            out.push_str(prefix);
            out.push_str(" ");
        }
        out.push_str(text);
        if let Some(suffix) = &self.suffix {
            out.push_str(" ");
            out.push_str(suffix);
        }
        Ok(())
    }
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.is_char_boundary(prefix.len())
        && text
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

fn ends_with_ignore_case(text: &str, suffix: &str) -> bool {
    text.len() >= suffix.len()
        && text.is_char_boundary(text.len() - suffix.len())
        && text
            .get(text.len() - suffix.len()..)
            .is_some_and(|tail| tail.eq_ignore_ascii_case(suffix))
}

/// `<where>`: a trim that strips a leading AND/OR and prefixes `WHERE`.
#[derive(Debug, Clone)]
pub struct WhereNode {
    inner: TrimNode,
}

impl WhereNode {
    pub fn new(body: SqlNode) -> Self {
        Self {
            inner: TrimNode::new(
                Some("WHERE".to_string()),
                None,
                ["AND ", "OR ", "AND\t", "OR\t", "AND\n", "OR\n"]
                    .map(String::from)
                    .to_vec(),
                Vec::new(),
                body,
            ),
        }
    }

    pub fn apply(&self, scope: &mut Scope<'_>, out: &mut SqlText) -> Result<()> {
        self.inner.apply(scope, out)
    }
}

/// `<set>`: a trim that strips a trailing comma and prefixes `SET`.
#[derive(Debug, Clone)]
pub struct SetNode {
    inner: TrimNode,
}

impl SetNode {
    pub fn new(body: SqlNode) -> Self {
        Self {
            inner: TrimNode::new(
                Some("SET".to_string()),
                None,
                Vec::new(),
                vec![",".to_string()],
                body,
            ),
        }
    }

    pub fn apply(&self, scope: &mut Scope<'_>, out: &mut SqlText) -> Result<()> {
        self.inner.apply(scope, out)
    }
}

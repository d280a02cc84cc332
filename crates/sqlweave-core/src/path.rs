//! Property expression tokenizer.
//!
//! A property expression addresses a location in a value tree:
//! `a.b[k].c[0]`. Each segment has a name and an optional bracketed
//! index. Brackets capture their content uninterpreted, so `a[b.c]` is a
//! single segment with index `b.c`. Nested brackets are not supported.

use crate::{Error, Result};

/// One step of a property expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub name: &'a str,
    pub index: Option<&'a str>,
}

impl Segment<'_> {
    /// Renders the segment back to its source form.
    pub fn reassemble(&self) -> String {
        match self.index {
            Some(index) => format!("{}[{}]", self.name, index),
            None => self.name.to_string(),
        }
    }
}

/// Tokenizes `expr`, yielding segments left to right.
///
/// The returned iterator is lazy and re-entrant: calling this again on
/// the same expression produces a fresh, identical sequence.
pub fn segments(expr: &str) -> Segments<'_> {
    Segments {
        expr,
        rest: Some(expr),
    }
}

/// Collects every segment of `expr`.
pub fn parse(expr: &str) -> Result<Vec<Segment<'_>>> {
    segments(expr).collect()
}

/// Splits off the first segment, returning the remainder expression
/// after the dot (if any).
pub fn split_first(expr: &str) -> Result<(Segment<'_>, Option<&str>)> {
    let (chunk, rest) = split_chunk(expr).map_err(|msg| malformed(expr, msg))?;
    let segment = parse_chunk(chunk).map_err(|msg| malformed(expr, msg))?;
    Ok((segment, rest))
}

/// Lazy segment iterator; see [`segments`].
pub struct Segments<'a> {
    expr: &'a str,
    rest: Option<&'a str>,
}

impl<'a> Iterator for Segments<'a> {
    type Item = Result<Segment<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.rest?;
        match split_chunk(rest).and_then(|(chunk, rest)| {
            let segment = parse_chunk(chunk)?;
            Ok((segment, rest))
        }) {
            Ok((segment, rest)) => {
                self.rest = rest;
                Some(Ok(segment))
            }
            Err(msg) => {
                self.rest = None;
                Some(Err(malformed(self.expr, msg)))
            }
        }
    }
}

fn malformed(expr: &str, msg: &'static str) -> Error {
    Error::malformed_path(format!("{msg} in property expression `{expr}`"))
}

/// Splits the leading chunk at the first dot outside brackets.
fn split_chunk(expr: &str) -> Result<(&str, Option<&str>), &'static str> {
    let mut depth = 0usize;
    for (pos, ch) in expr.char_indices() {
        match ch {
            '[' => {
                if depth > 0 {
                    return Err("nested brackets");
                }
                depth += 1;
            }
            ']' => {
                if depth == 0 {
                    return Err("unmatched `]`");
                }
                depth -= 1;
            }
            '.' if depth == 0 => {
                let rest = &expr[pos + 1..];
                return Ok((&expr[..pos], Some(rest)));
            }
            _ => {}
        }
    }
    if depth > 0 {
        return Err("unclosed `[`");
    }
    Ok((expr, None))
}

fn parse_chunk(chunk: &str) -> Result<Segment<'_>, &'static str> {
    if chunk.is_empty() {
        return Err("empty segment");
    }
    match chunk.find('[') {
        None => {
            if chunk.contains(']') {
                return Err("unmatched `]`");
            }
            Ok(Segment {
                name: chunk,
                index: None,
            })
        }
        Some(open) => {
            let name = &chunk[..open];
            let after = &chunk[open + 1..];
            let close = after.find(']').ok_or("unclosed `[`")?;
            if after[..close].contains('[') {
                return Err("nested brackets");
            }
            if !after[close + 1..].is_empty() {
                return Err("trailing characters after `]`");
            }
            Ok(Segment {
                name,
                index: Some(&after[..close]),
            })
        }
    }
}

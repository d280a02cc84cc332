//! Single-pass token scanning for `#{…}` and `${…}` placeholders.

use crate::descriptor::{ParamMode, ParameterDescriptor};
use sqlweave_core::{DbType, Error, Result};

/// Scans `text` for `open…close` tokens, replacing each token with the
/// handler's output. A backslash escapes an opening token (`\#{` emits a
/// literal `#{`); an unterminated token is passed through verbatim.
pub fn parse_tokens(
    text: &str,
    open: &str,
    close: &str,
    handler: &mut dyn FnMut(&str) -> Result<String>,
) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(open) {
        if rest[..start].ends_with('\\') {
            out.push_str(&rest[..start - 1]);
            out.push_str(open);
            rest = &rest[start + open.len()..];
            continue;
        }

        out.push_str(&rest[..start]);
        let after_open = &rest[start + open.len()..];
        match after_open.find(close) {
            None => {
                // No closing token; the remainder is literal text.
                out.push_str(&rest[start..]);
                rest = "";
                break;
            }
            Some(end) => {
                out.push_str(&handler(&after_open[..end])?);
                rest = &after_open[end + close.len()..];
            }
        }
    }

    out.push_str(rest);
    Ok(out)
}

/// A parsed `#{property, option=value, …}` token.
#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder {
    pub property: String,
    pub java_type: Option<String>,
    pub db_ty: Option<DbType>,
    pub mode: ParamMode,
    pub numeric_scale: Option<u32>,
    pub result_map: Option<String>,
    pub type_handler: Option<String>,
    pub db_type_name: Option<String>,
}

impl Placeholder {
    pub fn parse(content: &str) -> Result<Self> {
        let mut parts = content.split(',');
        let property = parts
            .next()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::config(format!("empty parameter token `#{{{content}}}`")))?
            .to_string();

        let mut placeholder = Self {
            property,
            java_type: None,
            db_ty: None,
            mode: ParamMode::In,
            numeric_scale: None,
            result_map: None,
            type_handler: None,
            db_type_name: None,
        };

        for part in parts {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (name, value) = part.split_once('=').ok_or_else(|| {
                Error::config(format!(
                    "malformed option `{part}` in parameter token `#{{{content}}}`"
                ))
            })?;
            let (name, value) = (name.trim(), value.trim());
            match name {
                "javaType" => placeholder.java_type = Some(value.to_string()),
                "jdbcType" => {
                    placeholder.db_ty = Some(DbType::parse(value).ok_or_else(|| {
                        Error::config(format!(
                            "unknown jdbcType `{value}` in parameter token `#{{{content}}}`"
                        ))
                    })?)
                }
                "mode" => placeholder.mode = ParamMode::parse(value)?,
                "numericScale" => {
                    placeholder.numeric_scale = Some(value.parse().map_err(|_| {
                        Error::config(format!(
                            "invalid numericScale `{value}` in parameter token `#{{{content}}}`"
                        ))
                    })?)
                }
                "resultMap" => placeholder.result_map = Some(value.to_string()),
                "typeHandler" => placeholder.type_handler = Some(value.to_string()),
                "jdbcTypeName" => placeholder.db_type_name = Some(value.to_string()),
                other => {
                    return Err(Error::config(format!(
                        "unknown parameter option `{other}` in `#{{{content}}}`"
                    )))
                }
            }
        }

        Ok(placeholder)
    }

    /// Converts into a descriptor with the given resolved application
    /// type.
    pub fn into_descriptor(self, app_ty: sqlweave_core::Type) -> ParameterDescriptor {
        ParameterDescriptor {
            property: self.property,
            mode: self.mode,
            app_ty,
            db_ty: self.db_ty,
            numeric_scale: self.numeric_scale,
            codec: self.type_handler,
            result_map: self.result_map,
            db_type_name: self.db_type_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlweave_core::ErrorKind;

    fn sub(text: &str) -> String {
        parse_tokens(text, "${", "}", &mut |content| {
            Ok(format!("<{content}>"))
        })
        .unwrap()
    }

    #[test]
    fn replaces_tokens() {
        assert_eq!(sub("a ${x} b ${y}"), "a <x> b <y>");
    }

    #[test]
    fn escaped_open_is_literal() {
        assert_eq!(sub(r"a \${x} b"), "a ${x} b");
    }

    #[test]
    fn unterminated_token_is_literal() {
        assert_eq!(sub("a ${x"), "a ${x");
    }

    #[test]
    fn parse_placeholder_options() {
        let p = Placeholder::parse("dept.id, jdbcType=BIGINT, mode=INOUT, numericScale=2").unwrap();
        assert_eq!(p.property, "dept.id");
        assert_eq!(p.db_ty, Some(DbType::BigInt));
        assert_eq!(p.mode, ParamMode::InOut);
        assert_eq!(p.numeric_scale, Some(2));
    }

    #[test]
    fn unknown_option_fails_compilation() {
        let err = Placeholder::parse("id, frobnicate=yes").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}

use super::fragment::{Fragment, FragmentElement};
use sqlweave_core::{Error, Result, ShapeRegistry, Type};
use sqlweave_sql::{
    BindNode, ChooseNode, DynamicSqlSource, ForEachNode, IfNode, SetNode, SqlNode, SqlSource,
    StaticSqlSource, StaticTextNode, TestExpr, TextNode, TrimNode, WhereNode,
};

/// Builds the executable source for a statement body.
///
/// Bodies containing any dynamic tag or `${…}` interpolation become
/// dynamic sources; otherwise the placeholder parser runs once here and
/// the statement stays static.
pub fn build_sql_source(
    body: &FragmentElement,
    param_ty: &Type,
    registry: &ShapeRegistry,
) -> Result<SqlSource> {
    let root = parse_children(&body.children)?;
    if root.is_dynamic() {
        Ok(SqlSource::Dynamic(DynamicSqlSource {
            root,
            param_ty: param_ty.clone(),
        }))
    } else {
        let mut text = String::new();
        collect_static(&root, &mut text);
        Ok(SqlSource::Static(StaticSqlSource::compile(
            &text, param_ty, registry,
        )?))
    }
}

fn collect_static(node: &SqlNode, out: &mut String) {
    match node {
        SqlNode::StaticText(text) => out.push_str(text.text()),
        SqlNode::Mixed(children) => {
            for child in children {
                collect_static(child, out);
            }
        }
        // A non-dynamic tree contains only the two variants above.
        _ => unreachable!("collect_static called on a dynamic node"),
    }
}

fn parse_children(children: &[Fragment]) -> Result<SqlNode> {
    let mut nodes = Vec::with_capacity(children.len());
    for child in children {
        match child {
            Fragment::Text(text) => {
                if text.contains("${") {
                    nodes.push(SqlNode::Text(TextNode::new(text.clone())));
                } else {
                    nodes.push(SqlNode::StaticText(StaticTextNode::new(text.clone())));
                }
            }
            Fragment::Element(element) => nodes.push(parse_element(element)?),
        }
    }
    Ok(SqlNode::Mixed(nodes))
}

fn parse_element(element: &FragmentElement) -> Result<SqlNode> {
    Ok(match element.name.as_str() {
        "if" => {
            let test = TestExpr::parse(element.required_attr("test")?)?;
            SqlNode::If(IfNode::new(test, parse_children(&element.children)?))
        }
        "choose" => {
            let mut whens = Vec::new();
            let mut otherwise = None;
            for child in element.child_elements() {
                match child.name.as_str() {
                    "when" => {
                        let test = TestExpr::parse(child.required_attr("test")?)?;
                        whens.push((test, parse_children(&child.children)?));
                    }
                    "otherwise" => {
                        if otherwise.is_some() {
                            return Err(Error::config(
                                "`<choose>` allows at most one `<otherwise>`".to_string(),
                            ));
                        }
                        otherwise = Some(parse_children(&child.children)?);
                    }
                    other => {
                        return Err(Error::config(format!(
                            "unexpected `<{other}>` inside `<choose>`"
                        )))
                    }
                }
            }
            SqlNode::Choose(ChooseNode::new(whens, otherwise))
        }
        "where" => SqlNode::Where(WhereNode::new(parse_children(&element.children)?)),
        "set" => SqlNode::Set(SetNode::new(parse_children(&element.children)?)),
        "trim" => {
            let overrides = |attr: Option<&str>| -> Vec<String> {
                attr.map(|list| list.split('|').map(str::to_string).collect())
                    .unwrap_or_default()
            };
            SqlNode::Trim(TrimNode::new(
                element.attr("prefix").map(str::to_string),
                element.attr("suffix").map(str::to_string),
                overrides(element.attr("prefixOverrides")),
                overrides(element.attr("suffixOverrides")),
                parse_children(&element.children)?,
            ))
        }
        "foreach" => {
            let collection = TestExpr::parse(element.required_attr("collection")?)?;
            SqlNode::ForEach(ForEachNode::new(
                collection,
                element.required_attr("item")?,
                element.attr("index").map(str::to_string),
                element.attr("open").unwrap_or_default(),
                element.attr("close").unwrap_or_default(),
                element.attr("separator").unwrap_or_default(),
                parse_children(&element.children)?,
            ))
        }
        "bind" => SqlNode::Bind(BindNode::new(
            element.required_attr("name")?,
            TestExpr::parse(element.required_attr("value")?)?,
        )),
        other => {
            return Err(Error::config(format!(
                "unknown dynamic SQL element `<{other}>`"
            )))
        }
    })
}

use super::fragment::{Fragment, FragmentElement};
use crate::catalog::qualify;
use sqlweave_core::{Error, Result};
use sqlweave_sql::token;

use indexmap::IndexMap;

/// Substitutes every `<include refid>` in a statement body with the
/// referenced `<sql>` subtree, applying `<property>` bindings as `${…}`
/// substitutions on attribute values and text nodes of the included
/// content. Recursive includes are followed; cycles fail.
pub fn resolve_includes(
    body: &FragmentElement,
    fragments: &IndexMap<String, FragmentElement>,
    namespace: &str,
) -> Result<FragmentElement> {
    let mut stack = Vec::new();
    let children = resolve_children(
        &body.children,
        fragments,
        namespace,
        &IndexMap::new(),
        false,
        &mut stack,
    )?;
    Ok(FragmentElement {
        name: body.name.clone(),
        attrs: body.attrs.clone(),
        children,
    })
}

fn resolve_children(
    children: &[Fragment],
    fragments: &IndexMap<String, FragmentElement>,
    namespace: &str,
    props: &IndexMap<String, String>,
    included: bool,
    stack: &mut Vec<String>,
) -> Result<Vec<Fragment>> {
    let mut out = Vec::with_capacity(children.len());
    for child in children {
        match child {
            Fragment::Text(text) => {
                let text = if included {
                    substitute(text, props)?
                } else {
                    text.clone()
                };
                out.push(Fragment::Text(text));
            }
            Fragment::Element(element) if element.name == "include" => {
                let mut spliced =
                    resolve_include(element, fragments, namespace, props, stack)?;
                out.append(&mut spliced);
            }
            Fragment::Element(element) => {
                let attrs = if included {
                    let mut attrs = IndexMap::new();
                    for (name, value) in &element.attrs {
                        attrs.insert(name.clone(), substitute(value, props)?);
                    }
                    attrs
                } else {
                    element.attrs.clone()
                };
                let children = resolve_children(
                    &element.children,
                    fragments,
                    namespace,
                    props,
                    included,
                    stack,
                )?;
                out.push(Fragment::Element(FragmentElement {
                    name: element.name.clone(),
                    attrs,
                    children,
                }));
            }
        }
    }
    Ok(out)
}

/// Splices one `<include>`: the referenced fragment's children replace
/// the include element.
fn resolve_include(
    include: &FragmentElement,
    fragments: &IndexMap<String, FragmentElement>,
    namespace: &str,
    outer_props: &IndexMap<String, String>,
    stack: &mut Vec<String>,
) -> Result<Vec<Fragment>> {
    let refid = include.required_attr("refid")?;
    // The refid itself may use properties from the enclosing scope.
    let refid = qualify(namespace, &substitute(refid, outer_props)?);

    if stack.iter().any(|seen| *seen == refid) {
        return Err(Error::cyclic_include(format!(
            "include chain revisits `{refid}`: {}",
            stack.join(" -> ")
        )));
    }

    let fragment = fragments.get(&refid).ok_or_else(|| {
        Error::incomplete_element(format!("sql fragment `{refid}` could not be resolved"))
    })?;

    // Declared <property> values resolve against the enclosing scope and
    // shadow it inside the included subtree.
    let mut props = outer_props.clone();
    for child in include.child_elements() {
        if child.name == "property" {
            let name = child.required_attr("name")?;
            let value = substitute(child.required_attr("value")?, outer_props)?;
            props.insert(name.to_string(), value);
        }
    }

    stack.push(refid.clone());
    let target_namespace = refid.rsplit_once('.').map(|(ns, _)| ns).unwrap_or(namespace);
    let resolved = resolve_children(
        &fragment.children,
        fragments,
        target_namespace,
        &props,
        true,
        stack,
    );
    stack.pop();
    resolved
}

/// `${name}` substitution over included text and attribute values.
/// Unknown names pass through verbatim.
fn substitute(text: &str, props: &IndexMap<String, String>) -> Result<String> {
    if !text.contains("${") {
        return Ok(text.to_string());
    }
    token::parse_tokens(text, "${", "}", &mut |name| {
        Ok(match props.get(name.trim()) {
            Some(value) => value.clone(),
            None => format!("${{{name}}}"),
        })
    })
}

use super::fragment::FragmentElement;
use super::verify_mapping_arms;
use crate::catalog::{qualify, Discriminator, ResultMap, ResultMapping};
use sqlweave_core::{DbType, Error, Result, ShapeRegistry, Type};

use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::Arc;

/// Pass-1 form of a result map; `extends` is still a name.
#[derive(Debug)]
pub struct RawResultMap {
    pub id: String,
    pub ty: Type,
    pub extends: Option<String>,
    pub auto_mapping: Option<bool>,
    pub constructor: Vec<ResultMapping>,
    pub mappings: Vec<ResultMapping>,
    pub discriminator: Option<Discriminator>,
}

/// Parses a `<resultMap>` element; anonymous maps generated for inline
/// associations, collections, and discriminator cases are appended to
/// `out` alongside the named map.
pub fn parse_result_map(
    element: &FragmentElement,
    namespace: &str,
    shapes: &ShapeRegistry,
    out: &mut Vec<RawResultMap>,
) -> Result<String> {
    let id = qualify(namespace, element.required_attr("id")?);
    let ty = shapes.resolve_type(element.required_attr("type")?);
    let extends = element
        .attr("extends")
        .map(|parent| qualify(namespace, parent));
    let auto_mapping = element.bool_attr("autoMapping")?;
    parse_into(element, id.clone(), ty, extends, auto_mapping, namespace, shapes, out)?;
    Ok(id)
}

#[allow(clippy::too_many_arguments)]
fn parse_into(
    element: &FragmentElement,
    id: String,
    ty: Type,
    extends: Option<String>,
    auto_mapping: Option<bool>,
    namespace: &str,
    shapes: &ShapeRegistry,
    out: &mut Vec<RawResultMap>,
) -> Result<()> {
    let mut map = RawResultMap {
        id: id.clone(),
        ty: ty.clone(),
        extends,
        auto_mapping,
        constructor: Vec::new(),
        mappings: Vec::new(),
        discriminator: None,
    };

    for child in element.child_elements() {
        match child.name.as_str() {
            "constructor" => {
                for arg in child.child_elements() {
                    let is_id = match arg.name.as_str() {
                        "idArg" => true,
                        "arg" => false,
                        other => {
                            return Err(Error::config(format!(
                                "unexpected `<{other}>` inside `<constructor>` of `{id}`"
                            )))
                        }
                    };
                    let mut mapping = leaf_mapping(arg, "name", shapes)?;
                    mapping.constructor = true;
                    mapping.id = is_id;
                    map.constructor.push(mapping);
                }
            }
            "id" | "result" => {
                let mut mapping = leaf_mapping(child, "property", shapes)?;
                mapping.id = child.name == "id";
                map.mappings.push(mapping);
            }
            "association" => {
                let mapping = nested_mapping(child, &id, false, namespace, shapes, out)?;
                map.mappings.push(mapping);
            }
            "collection" => {
                let mapping = nested_mapping(child, &id, true, namespace, shapes, out)?;
                map.mappings.push(mapping);
            }
            "discriminator" => {
                if map.discriminator.is_some() {
                    return Err(Error::config(format!(
                        "result map `{id}` declares more than one discriminator"
                    )));
                }
                map.discriminator =
                    Some(parse_discriminator(child, &id, &ty, namespace, shapes, out)?);
            }
            other => {
                return Err(Error::config(format!(
                    "unexpected element `<{other}>` in result map `{id}`"
                )))
            }
        }
    }

    out.push(map);
    Ok(())
}

/// Parses the attributes shared by `<id>`, `<result>`, and constructor
/// args.
fn leaf_mapping(
    element: &FragmentElement,
    property_attr: &str,
    shapes: &ShapeRegistry,
) -> Result<ResultMapping> {
    Ok(ResultMapping {
        property: element.required_attr(property_attr)?.to_string(),
        column: element.attr("column").map(str::to_string),
        app_ty: element
            .attr("javaType")
            .map(|name| shapes.resolve_type(name)),
        db_ty: parse_db_type(element)?,
        codec: element.attr("typeHandler").map(str::to_string),
        ..ResultMapping::default()
    })
}

fn nested_mapping(
    element: &FragmentElement,
    parent_id: &str,
    is_collection: bool,
    namespace: &str,
    shapes: &ShapeRegistry,
    out: &mut Vec<RawResultMap>,
) -> Result<ResultMapping> {
    let property = element.required_attr("property")?.to_string();

    let element_ty = if is_collection {
        element.attr("ofType").map(|name| shapes.resolve_type(name))
    } else {
        element.attr("javaType").map(|name| shapes.resolve_type(name))
    };

    let mut mapping = ResultMapping {
        property: property.clone(),
        column: element.attr("column").map(str::to_string),
        app_ty: element_ty.clone().map(|ty| {
            if is_collection {
                Type::list(ty)
            } else {
                ty
            }
        }),
        db_ty: parse_db_type(element)?,
        codec: element.attr("typeHandler").map(str::to_string),
        nested_select: element
            .attr("select")
            .map(|select| qualify(namespace, select)),
        nested_map: element
            .attr("resultMap")
            .map(|name| qualify(namespace, name)),
        column_prefix: element.attr("columnPrefix").map(str::to_string),
        not_null_columns: element
            .attr("notNullColumn")
            .map(|list| list.split(',').map(|c| c.trim().to_string()).collect())
            .unwrap_or_default(),
        lazy: match element.attr("fetchType") {
            None => None,
            Some("lazy") => Some(true),
            Some("eager") => Some(false),
            Some(other) => {
                return Err(Error::config(format!("unknown fetchType `{other}`")))
            }
        },
        ..ResultMapping::default()
    };

    // Inline children define an anonymous result map.
    let has_inline = element.child_elements().next().is_some();
    if has_inline {
        if mapping.nested_map.is_some() || mapping.nested_select.is_some() {
            return Err(Error::config(format!(
                "nested mapping `{property}` of `{parent_id}` mixes inline mappings with a reference"
            )));
        }
        let ty = element_ty.ok_or_else(|| {
            Error::config(format!(
                "inline nested mapping `{property}` of `{parent_id}` requires {}",
                if is_collection { "`ofType`" } else { "`javaType`" }
            ))
        })?;
        let anonymous = format!("{parent_id}_{property}");
        parse_into(
            element,
            anonymous.clone(),
            ty,
            None,
            None,
            namespace,
            shapes,
            out,
        )?;
        mapping.nested_map = Some(anonymous);
    }

    if mapping.nested_map.is_none() && mapping.nested_select.is_none() {
        return Err(Error::config(format!(
            "nested mapping `{property}` of `{parent_id}` declares neither `resultMap`, `select`, nor inline mappings"
        )));
    }
    verify_mapping_arms(&mapping, parent_id)?;
    Ok(mapping)
}

fn parse_discriminator(
    element: &FragmentElement,
    parent_id: &str,
    parent_ty: &Type,
    namespace: &str,
    shapes: &ShapeRegistry,
    out: &mut Vec<RawResultMap>,
) -> Result<Discriminator> {
    let column = element.required_attr("column")?.to_string();
    let mut cases = IndexMap::new();
    for case in element.child_elements() {
        if case.name != "case" {
            return Err(Error::config(format!(
                "unexpected `<{}>` inside `<discriminator>` of `{parent_id}`",
                case.name
            )));
        }
        let value = case.required_attr("value")?.to_string();
        let target = if let Some(name) = case.attr("resultMap") {
            qualify(namespace, name)
        } else {
            // Inline case mappings build an anonymous map, defaulting to
            // the parent's target type.
            let ty = case
                .attr("resultType")
                .map(|name| shapes.resolve_type(name))
                .unwrap_or_else(|| parent_ty.clone());
            let anonymous = format!("{parent_id}_case_{value}");
            parse_into(case, anonymous.clone(), ty, None, None, namespace, shapes, out)?;
            anonymous
        };
        cases.insert(value, target);
    }
    Ok(Discriminator {
        column,
        app_ty: element
            .attr("javaType")
            .map(|name| shapes.resolve_type(name)),
        db_ty: parse_db_type(element)?,
        codec: element.attr("typeHandler").map(str::to_string),
        cases,
    })
}

fn parse_db_type(element: &FragmentElement) -> Result<Option<DbType>> {
    match element.attr("jdbcType") {
        None => Ok(None),
        Some(name) => DbType::parse(name)
            .map(Some)
            .ok_or_else(|| Error::config(format!("unknown jdbcType `{name}`"))),
    }
}

/// Pass-2 resolution of one result map: resolves the `extends` chain
/// (memoized, cycle-checked) and merges inherited mappings.
pub(super) fn resolve(
    name: &str,
    raw: &IndexMap<String, &RawResultMap>,
    resolved: &mut IndexMap<String, Arc<ResultMap>>,
    stack: &mut Vec<String>,
) -> Result<Arc<ResultMap>> {
    if let Some(map) = resolved.get(name) {
        return Ok(map.clone());
    }
    if stack.iter().any(|seen| seen == name) {
        return Err(Error::cyclic_result_map(format!(
            "extends chain revisits `{name}`: {}",
            stack.join(" -> ")
        )));
    }
    let map = raw.get(name).ok_or_else(|| {
        Error::incomplete_element(format!("result map `{name}` could not be resolved"))
    })?;

    let (constructor, mappings) = match &map.extends {
        None => (map.constructor.clone(), map.mappings.clone()),
        Some(parent_name) => {
            stack.push(name.to_string());
            let parent = resolve(parent_name, raw, resolved, stack)?;
            stack.pop();

            // Parent mappings survive unless the child overrides the same
            // (column, property) tuple.
            let mut mappings = map.mappings.clone();
            for inherited in &parent.mappings {
                let overridden = map.mappings.iter().any(|own| {
                    own.property == inherited.property && own.column == inherited.column
                });
                if !overridden {
                    mappings.push(inherited.clone());
                }
            }

            // A child that declares any constructor mapping replaces the
            // parent's constructor outright.
            let constructor = if map.constructor.is_empty() {
                parent.constructor.clone()
            } else {
                map.constructor.clone()
            };
            (constructor, mappings)
        }
    };

    let mut mapped_columns = HashSet::new();
    for mapping in constructor.iter().chain(mappings.iter()) {
        if let Some(column) = &mapping.column {
            mapped_columns.insert(column.to_ascii_uppercase());
        }
        for column in &mapping.not_null_columns {
            mapped_columns.insert(column.to_ascii_uppercase());
        }
    }
    if let Some(discriminator) = &map.discriminator {
        mapped_columns.insert(discriminator.column.to_ascii_uppercase());
    }

    let compiled = Arc::new(ResultMap {
        name: name.to_string(),
        ty: map.ty.clone(),
        constructor,
        mappings,
        discriminator: map.discriminator.clone(),
        auto_mapping: map.auto_mapping,
        mapped_columns,
    });
    resolved.insert(name.to_string(), compiled.clone());
    Ok(compiled)
}

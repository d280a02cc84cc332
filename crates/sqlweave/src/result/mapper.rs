use super::meta::{ResultSetMeta, UnmappedColumn};
use super::RowBuffer;
use crate::catalog::{Catalog, ResultMap, ResultMapping};
use sqlweave_core::codec::coerce;
use sqlweave_core::driver::{ColumnRef, RowCursor};
use sqlweave_core::meta::Navigator;
use sqlweave_core::settings::{AutoMappingBehavior, UnknownColumnBehavior};
use sqlweave_core::value::LazyValue;
use sqlweave_core::{Codec, Error, Result, Type, Value};

use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

/// Executes nested sub-selects on behalf of the row mapper.
pub trait NestedQueryRunner {
    fn run_select(&mut self, statement: &str, param: &Value) -> Result<Vec<Value>>;
}

/// Maps buffered result rows into object graphs per a result map.
pub struct RowMapper<'a> {
    catalog: &'a Catalog,
}

struct PendingParent {
    ids: Vec<Value>,
    map_name: String,
    object: Value,
}

impl<'a> RowMapper<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    fn navigator(&self) -> Navigator<'_> {
        Navigator::new(&self.catalog.shapes)
    }

    /// Maps every row of the buffer under `map_name`.
    ///
    /// Rows mapped through nested result maps are identity-tracked by
    /// their id-flagged columns: successive rows carrying the same parent
    /// identity attach their joined children to the same parent object.
    pub fn map_results(
        &self,
        cursor: &mut RowBuffer,
        map_name: &str,
        runner: &mut dyn NestedQueryRunner,
    ) -> Result<Vec<Value>> {
        let base = self.catalog.result_map(map_name)?;
        let mut meta = ResultSetMeta::new(cursor.columns().to_vec());
        let mut results = Vec::new();
        let mut pending: Option<PendingParent> = None;
        let keep_empty = self.catalog.settings.return_instance_for_empty_row;

        while cursor.advance()? {
            let map = self.discriminate(cursor, base.clone(), None)?;

            if map.has_nested_maps() {
                let ids = self.row_identity(cursor, &map)?;
                let same_parent = pending
                    .as_ref()
                    .is_some_and(|p| p.map_name == map.name && p.ids == ids);

                if same_parent {
                    let parent = pending.as_mut().expect("pending parent");
                    if !parent.object.is_null() {
                        self.apply_nested(cursor, &mut meta, &map, &mut parent.object, None, runner)?;
                    }
                } else {
                    if let Some(done) = pending.take() {
                        results.push(done.object);
                    }
                    let (mut object, found) =
                        self.map_row(cursor, &mut meta, &map, None, false, false, runner)?;
                    let nested_found =
                        self.apply_nested(cursor, &mut meta, &map, &mut object, None, runner)?;
                    let object = if found || nested_found || keep_empty {
                        object
                    } else {
                        Value::Null
                    };
                    pending = Some(PendingParent {
                        ids,
                        map_name: map.name.clone(),
                        object,
                    });
                }
            } else {
                let (object, found) =
                    self.map_row(cursor, &mut meta, &map, None, false, true, runner)?;
                results.push(if found || keep_empty { object } else { Value::Null });
            }
        }

        if let Some(done) = pending.take() {
            results.push(done.object);
        }
        Ok(results)
    }

    /// Maps the cursor's current row into one object.
    #[allow(clippy::too_many_arguments)]
    fn map_row(
        &self,
        cursor: &dyn RowCursor,
        meta: &mut ResultSetMeta,
        map: &Arc<ResultMap>,
        prefix: Option<&str>,
        nested: bool,
        include_nested_maps: bool,
        runner: &mut dyn NestedQueryRunner,
    ) -> Result<(Value, bool)> {
        // A scalar result map decodes the first column directly.
        if map.mappings.is_empty()
            && map.constructor.is_empty()
            && !matches!(map.ty, Type::Struct(_) | Type::Map)
        {
            let codec = self.catalog.codecs.lookup(&map.ty, None);
            let value = codec
                .decode(cursor, &ColumnRef::Ordinal(1))
                .map_err(|err| self.mapping_context(err, map, "<first column>", ""))?;
            let found = !value.is_null();
            return Ok((value, found));
        }

        let navigator = self.navigator();
        let mut found = false;
        let mut object = self.construct(cursor, map, prefix, &mut found)?;

        for mapping in &map.mappings {
            if mapping.is_nested_map() {
                continue;
            }
            if let Some(select) = &mapping.nested_select {
                found |= self.apply_nested_select(
                    cursor, map, mapping, select, &mut object, prefix, runner,
                )?;
                continue;
            }
            let Some(column) = &mapping.column else {
                continue;
            };
            let column = prefixed(column, prefix);
            if !meta.has_column(&column) {
                continue;
            }
            let target_ty = self.property_ty(map, mapping);
            let codec = self.codec_for(mapping, &target_ty)?;
            let value = codec
                .decode(cursor, &ColumnRef::Name(&column))
                .map_err(|err| self.mapping_context(err, map, &column, &mapping.property))?;
            if value.is_null() {
                if self.catalog.settings.call_setters_on_nulls {
                    navigator
                        .set(&mut object, &mapping.property, Value::Null)
                        .map_err(|err| self.mapping_context(err, map, &column, &mapping.property))?;
                }
            } else {
                found = true;
                navigator
                    .set(&mut object, &mapping.property, value)
                    .map_err(|err| self.mapping_context(err, map, &column, &mapping.property))?;
            }
        }

        if include_nested_maps {
            found |= self.apply_nested(cursor, meta, map, &mut object, prefix, runner)?;
        }

        if self.should_auto_map(map, nested) {
            found |= self.auto_map(cursor, meta, map, prefix, &mut object)?;
        }

        Ok((object, found))
    }

    /// Constructs the target object, applying constructor-flagged
    /// mappings before any property is set.
    fn construct(
        &self,
        cursor: &dyn RowCursor,
        map: &Arc<ResultMap>,
        prefix: Option<&str>,
        found: &mut bool,
    ) -> Result<Value> {
        if map.constructor.is_empty() {
            return match &map.ty {
                Type::Struct(name) => self.catalog.shapes.instantiate(name),
                Type::Map => Ok(Value::Map(Default::default())),
                other => Err(Error::mapping(format!(
                    "result map `{}` target type `{other}` has no properties to map",
                    map.name
                ))),
            };
        }

        let Type::Struct(shape) = &map.ty else {
            return Err(Error::mapping(format!(
                "result map `{}` declares constructor mappings on non-shape type `{}`",
                map.name, map.ty
            )));
        };
        let instance = self.catalog.shapes.instantiate(shape)?;
        let Value::Struct(mut instance) = instance else {
            unreachable!("instantiate returns a struct");
        };

        for mapping in &map.constructor {
            let column = mapping.column.as_ref().ok_or_else(|| {
                Error::mapping(format!(
                    "constructor mapping `{}` of `{}` declares no column",
                    mapping.property, map.name
                ))
            })?;
            let column = prefixed(column, prefix);
            let target_ty = self.property_ty(map, mapping);
            let codec = self.codec_for(mapping, &target_ty)?;
            let value = codec
                .decode(cursor, &ColumnRef::Name(&column))
                .map_err(|err| self.mapping_context(err, map, &column, &mapping.property))?;
            let value = coerce(&value, &target_ty)
                .map_err(|err| self.mapping_context(err, map, &column, &mapping.property))?;
            if !value.is_null() {
                *found = true;
            }
            // Constructor arguments may target read-only properties.
            instance.fields.insert(mapping.property.clone(), value);
        }

        Ok(Value::Struct(instance))
    }

    /// Applies one nested-select mapping: eagerly executes the sub-select
    /// keyed by the column value, or attaches a deferred resolver slot.
    #[allow(clippy::too_many_arguments)]
    fn apply_nested_select(
        &self,
        cursor: &dyn RowCursor,
        map: &Arc<ResultMap>,
        mapping: &ResultMapping,
        select: &str,
        object: &mut Value,
        prefix: Option<&str>,
        runner: &mut dyn NestedQueryRunner,
    ) -> Result<bool> {
        let navigator = self.navigator();
        let column = mapping.column.as_ref().ok_or_else(|| {
            Error::mapping(format!(
                "nested select for `{}` of `{}` declares no key column",
                mapping.property, map.name
            ))
        })?;
        let column = prefixed(column, prefix);
        let key = cursor
            .get(&ColumnRef::Name(&column))
            .map_err(|err| self.mapping_context(err, map, &column, &mapping.property))?;
        if key.is_null() {
            return Ok(false);
        }

        let wants_list = matches!(self.property_ty(map, mapping), Type::List(_));
        let lazy = mapping
            .lazy
            .unwrap_or(self.catalog.settings.lazy_loading_enabled);

        let value = if lazy {
            Value::Lazy(LazyValue::new(select, key, wants_list))
        } else {
            let rows = runner.run_select(select, &key)?;
            if wants_list {
                Value::List(rows)
            } else {
                match rows.len() {
                    0 => Value::Null,
                    1 => rows.into_iter().next().expect("one row"),
                    n => {
                        return Err(Error::mapping(format!(
                            "nested select `{select}` for `{}` of `{}` returned {n} rows where one was expected",
                            mapping.property, map.name
                        )))
                    }
                }
            }
        };

        let attached = !value.is_null();
        navigator
            .set(object, &mapping.property, value)
            .map_err(|err| self.mapping_context(err, map, &column, &mapping.property))?;
        Ok(attached)
    }

    /// Maps joined child rows for every nested-result-map mapping of
    /// `map`, attaching them to the parent object.
    fn apply_nested(
        &self,
        cursor: &dyn RowCursor,
        meta: &mut ResultSetMeta,
        map: &Arc<ResultMap>,
        parent: &mut Value,
        outer_prefix: Option<&str>,
        runner: &mut dyn NestedQueryRunner,
    ) -> Result<bool> {
        let navigator = self.navigator();
        let mut any = false;

        for mapping in map.mappings.iter().filter(|m| m.is_nested_map()) {
            let nested = mapping.nested_map.as_ref().expect("nested map reference");
            let child_map = self.catalog.result_map(nested)?;
            let combined = combine_prefix(outer_prefix, mapping.column_prefix.as_deref());
            let prefix = combined.as_deref();

            if !mapping.not_null_columns.is_empty() {
                let any_present = mapping.not_null_columns.iter().any(|column| {
                    let column = prefixed(column, prefix);
                    meta.has_column(&column)
                        && matches!(cursor.get(&ColumnRef::Name(&column)), Ok(v) if !v.is_null())
                });
                if !any_present {
                    continue;
                }
            }

            let child_map = self.discriminate(cursor, child_map, prefix)?;
            let (child, found) =
                self.map_row(cursor, meta, &child_map, prefix, true, true, runner)?;
            if !found {
                continue;
            }

            let declared = self.property_ty(map, mapping);
            let current = navigator
                .get(parent, &mapping.property)
                .map_err(|err| self.mapping_context(err, map, "", &mapping.property))?;
            match current {
                Value::List(mut items) => {
                    items.push(child);
                    navigator.set(parent, &mapping.property, Value::List(items))?;
                }
                Value::Null => {
                    let value = if matches!(declared, Type::List(_)) {
                        Value::List(vec![child])
                    } else {
                        child
                    };
                    navigator.set(parent, &mapping.property, value)?;
                }
                // An association already populated by an earlier row of
                // the same parent stays as it is.
                _ => continue,
            }
            any = true;
        }

        Ok(any)
    }

    fn auto_map(
        &self,
        cursor: &dyn RowCursor,
        meta: &mut ResultSetMeta,
        map: &Arc<ResultMap>,
        prefix: Option<&str>,
        object: &mut Value,
    ) -> Result<bool> {
        let navigator = self.navigator();
        let settings = &self.catalog.settings;
        let unmapped: Vec<UnmappedColumn> = meta.unmapped(map, prefix).to_vec();
        let mut found = false;

        for entry in unmapped {
            let probe = if settings.map_underscore_to_camel_case {
                entry.probe.replace('_', "")
            } else {
                entry.probe.clone()
            };

            match object {
                Value::Map(entries) => {
                    let value = cursor.get(&ColumnRef::Name(&entry.column))?;
                    found |= !value.is_null();
                    entries.insert(entry.probe.clone(), value);
                }
                Value::Struct(instance) => {
                    let shape_meta = self.catalog.shapes.meta(&instance.shape)?;
                    let property = shape_meta
                        .find_property(&probe)?
                        .filter(|name| shape_meta.is_writable(name))
                        .map(str::to_string);
                    match property {
                        None => match settings.auto_mapping_unknown_column_behavior {
                            UnknownColumnBehavior::None => {}
                            UnknownColumnBehavior::Warning => {
                                warn!(
                                    column = %entry.column,
                                    result_map = %map.name,
                                    "unknown column does not match any property"
                                );
                            }
                            UnknownColumnBehavior::Failing => {
                                return Err(Error::mapping(format!(
                                    "unknown column `{}` does not match any property of `{}`",
                                    entry.column, map.name
                                )))
                            }
                        },
                        Some(property) => {
                            let ty = shape_meta
                                .property(&property)
                                .map(|p| p.ty.clone())
                                .unwrap_or(Type::Any);
                            let codec = self.catalog.codecs.lookup(&ty, None);
                            let value = codec
                                .decode(cursor, &ColumnRef::Name(&entry.column))
                                .map_err(|err| {
                                    self.mapping_context(err, map, &entry.column, &property)
                                })?;
                            if value.is_null() {
                                if settings.call_setters_on_nulls {
                                    navigator.set(object, &property, Value::Null)?;
                                }
                            } else {
                                found = true;
                                navigator.set(object, &property, value)?;
                            }
                        }
                    }
                }
                _ => break,
            }
        }

        Ok(found)
    }

    /// Resolves the effective map for the current row: evaluates the
    /// discriminator column, follows the matching case, and repeats while
    /// cases themselves discriminate.
    fn discriminate(
        &self,
        cursor: &dyn RowCursor,
        map: Arc<ResultMap>,
        prefix: Option<&str>,
    ) -> Result<Arc<ResultMap>> {
        let mut current = map;
        let mut visited: HashSet<String> = HashSet::new();

        while let Some(discriminator) = current.discriminator.clone() {
            if !visited.insert(current.name.clone()) {
                break;
            }
            let column = prefixed(&discriminator.column, prefix);
            let ty = discriminator.app_ty.clone().unwrap_or(Type::String);
            let codec = match &discriminator.codec {
                Some(name) => self.catalog.codecs.named(name)?,
                None => self.catalog.codecs.lookup(&ty, discriminator.db_ty),
            };
            let value = codec
                .decode(cursor, &ColumnRef::Name(&column))
                .map_err(|err| self.mapping_context(err, &current, &column, ""))?;
            let key = match coerce(&value, &Type::String) {
                Ok(Value::String(key)) => key,
                _ => break,
            };
            match discriminator.cases.get(&key) {
                Some(target) if *target != current.name => {
                    current = self.catalog.result_map(target)?;
                }
                _ => break,
            }
        }
        Ok(current)
    }

    /// The parent identity of the current row: id-flagged column values.
    fn row_identity(&self, cursor: &dyn RowCursor, map: &Arc<ResultMap>) -> Result<Vec<Value>> {
        let mut ids = Vec::new();
        let id_constructor = map.constructor.iter().filter(|m| m.id);
        for mapping in id_constructor.chain(map.id_mappings()) {
            if mapping.is_nested_map() || mapping.nested_select.is_some() {
                continue;
            }
            if let Some(column) = &mapping.column {
                ids.push(cursor.get(&ColumnRef::Name(column)).unwrap_or(Value::Null));
            }
        }
        Ok(ids)
    }

    fn should_auto_map(&self, map: &ResultMap, nested: bool) -> bool {
        if let Some(flag) = map.auto_mapping {
            return flag;
        }
        match self.catalog.settings.auto_mapping_behavior {
            AutoMappingBehavior::None => false,
            AutoMappingBehavior::Partial => !nested,
            AutoMappingBehavior::Full => true,
        }
    }

    /// The application type a mapping decodes into: an explicit
    /// declaration wins, then the target shape's property type.
    fn property_ty(&self, map: &ResultMap, mapping: &ResultMapping) -> Type {
        if let Some(ty) = &mapping.app_ty {
            return ty.clone();
        }
        self.navigator()
            .property_type(&map.ty, &mapping.property)
            .unwrap_or(Type::Any)
    }

    fn codec_for(&self, mapping: &ResultMapping, target_ty: &Type) -> Result<Arc<dyn Codec>> {
        match &mapping.codec {
            Some(name) => self.catalog.codecs.named(name),
            None => Ok(self.catalog.codecs.lookup(target_ty, mapping.db_ty)),
        }
    }

    fn mapping_context(&self, err: Error, map: &ResultMap, column: &str, property: &str) -> Error {
        err.context(Error::mapping(format!(
            "column `{column}` -> property `{property}` of result map `{}`",
            map.name
        )))
    }
}

fn prefixed(column: &str, prefix: Option<&str>) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}{column}"),
        None => column.to_string(),
    }
}

fn combine_prefix(outer: Option<&str>, own: Option<&str>) -> Option<String> {
    match (outer, own) {
        (None, None) => None,
        (Some(outer), None) => Some(outer.to_string()),
        (None, Some(own)) => Some(own.to_string()),
        (Some(outer), Some(own)) => Some(format!("{outer}{own}")),
    }
}

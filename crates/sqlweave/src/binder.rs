//! Parameter binding: walks a statement's ordered descriptors, reads
//! values from the parameter object, and applies codecs onto the driver
//! statement. Ordinals are 1-based and contiguous.

use crate::catalog::Catalog;
use sqlweave_core::driver::PreparedStatement;
use sqlweave_core::meta::Navigator;
use sqlweave_core::{DbType, Error, Result, Value};
use sqlweave_sql::{BoundSql, ParamMode, ParameterDescriptor};

/// A descriptor paired with the value it binds.
#[derive(Debug, Clone)]
pub struct BoundParam {
    pub descriptor: ParameterDescriptor,
    pub value: Value,
}

/// Reads every IN-mode value up front, before the driver is touched; a
/// failure here leaves transactional state untouched.
pub fn resolve_parameters(
    bound: &BoundSql,
    param: &Value,
    catalog: &Catalog,
) -> Result<Vec<BoundParam>> {
    let navigator = Navigator::new(&catalog.shapes);
    bound
        .descriptors
        .iter()
        .map(|descriptor| {
            let value = if descriptor.mode == ParamMode::Out {
                Value::Null
            } else {
                bound
                    .resolve_value(&navigator, param, &descriptor.property)
                    .map_err(|err| {
                        err.context(Error::binding(format!(
                            "cannot read parameter `{}`",
                            descriptor.property
                        )))
                    })?
            };
            Ok(BoundParam {
                descriptor: descriptor.clone(),
                value,
            })
        })
        .collect()
}

/// Applies resolved parameters onto the driver statement: OUT modes
/// register, IN modes encode through the resolved codec.
pub fn apply_parameters(
    stmt: &mut dyn PreparedStatement,
    params: &[BoundParam],
    catalog: &Catalog,
) -> Result<()> {
    for (index, bound) in params.iter().enumerate() {
        let ordinal = index + 1;
        let descriptor = &bound.descriptor;

        if descriptor.mode.is_out() {
            stmt.register_out(ordinal, descriptor.db_ty.unwrap_or(DbType::Cursor))
                .map_err(|err| {
                    err.context(Error::binding(format!(
                        "cannot register output parameter `{}` at ordinal {ordinal}",
                        descriptor.property
                    )))
                })?;
        }

        if descriptor.mode.is_in() {
            // An opaque descriptor re-resolves now that the runtime value
            // is known.
            let app_ty = if descriptor.app_ty.is_any() && !bound.value.is_null() {
                bound.value.infer_ty()
            } else {
                descriptor.app_ty.clone()
            };
            let codec = match &descriptor.codec {
                Some(name) => catalog.codecs.named(name)?,
                None => catalog.codecs.lookup(&app_ty, descriptor.db_ty),
            };
            let db_ty = descriptor.db_ty.unwrap_or(if bound.value.is_null() {
                catalog.settings.jdbc_type_for_null
            } else {
                DbType::Other
            });
            codec
                .encode(stmt, ordinal, &bound.value, db_ty)
                .map_err(|err| {
                    err.context(Error::binding(format!(
                        "cannot bind parameter `{}` at ordinal {ordinal}",
                        descriptor.property
                    )))
                })?;
        }
    }
    Ok(())
}

/// The ordered IN-mode values, as attached to execution errors and cache
/// keys.
pub fn bound_values(params: &[BoundParam]) -> Vec<Value> {
    params
        .iter()
        .filter(|p| p.descriptor.mode.is_in())
        .map(|p| p.value.clone())
        .collect()
}

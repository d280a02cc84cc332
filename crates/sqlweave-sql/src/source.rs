use crate::token::{self, Placeholder};
use crate::{ParameterDescriptor, Scope, SqlNode, SqlText};
use indexmap::IndexMap;
use sqlweave_core::meta::Navigator;
use sqlweave_core::{path, Result, ShapeRegistry, Type, Value};

/// The executable form of a statement body.
///
/// Bodies without dynamic nodes or interpolation are compiled once at
/// bootstrap into a [`StaticSqlSource`]; everything else re-evaluates per
/// invocation.
#[derive(Debug, Clone)]
pub enum SqlSource {
    Static(StaticSqlSource),
    Dynamic(DynamicSqlSource),
}

/// Final SQL and its ordered descriptors, produced at compile time.
#[derive(Debug, Clone)]
pub struct StaticSqlSource {
    pub sql: String,
    pub descriptors: Vec<ParameterDescriptor>,
}

/// A node tree evaluated against each invocation's parameter object.
#[derive(Debug, Clone)]
pub struct DynamicSqlSource {
    pub root: SqlNode,
    pub param_ty: Type,
}

/// The product of evaluating an SQL source: final parameterized SQL, the
/// ordered descriptor list, and evaluation-scope values the binder must
/// still see.
#[derive(Debug, Clone)]
pub struct BoundSql {
    pub sql: String,
    pub descriptors: Vec<ParameterDescriptor>,
    pub extras: IndexMap<String, Value>,
}

impl BoundSql {
    /// Resolves the value a descriptor binds: extras first, then the
    /// parameter object.
    pub fn resolve_value(
        &self,
        navigator: &Navigator<'_>,
        param: &Value,
        property: &str,
    ) -> Result<Value> {
        let (first, _) = path::split_first(property)?;
        if self.extras.contains_key(first.name) {
            let root = Value::Map(self.extras.clone());
            return navigator.get(&root, property);
        }
        match param {
            Value::Struct(_) | Value::Map(_) => navigator.get(param, property),
            simple => {
                // A single unnamed parameter answers to any name.
                let mut root = IndexMap::new();
                root.insert(first.name.to_string(), simple.clone());
                navigator.get(&Value::Map(root), property)
            }
        }
    }
}

impl StaticSqlSource {
    /// Runs the placeholder parser once at compile time.
    pub fn compile(text: &str, param_ty: &Type, registry: &ShapeRegistry) -> Result<Self> {
        let (sql, descriptors) =
            compile_placeholders(text.trim(), param_ty, registry, &IndexMap::new())?;
        Ok(Self { sql, descriptors })
    }
}

impl SqlSource {
    /// Produces the final SQL and bindings for one invocation.
    pub fn bind(&self, param: &Value, registry: &ShapeRegistry) -> Result<BoundSql> {
        match self {
            SqlSource::Static(source) => Ok(BoundSql {
                sql: source.sql.clone(),
                descriptors: source.descriptors.clone(),
                extras: IndexMap::new(),
            }),
            SqlSource::Dynamic(source) => {
                let navigator = Navigator::new(registry);
                let mut scope = Scope::new(navigator, param);
                let mut out = SqlText::new();
                source.root.apply(&mut scope, &mut out)?;
                let (text, extras) = out.into_parts();
                let (sql, descriptors) =
                    compile_placeholders(text.trim(), &source.param_ty, registry, &extras)?;
                Ok(BoundSql {
                    sql,
                    descriptors,
                    extras,
                })
            }
        }
    }
}

/// Replaces each `#{…}` token with `?`, appending a descriptor per
/// placeholder. The descriptor's application type resolves in priority
/// order: explicit `javaType`, the carried evaluation-scope value, the
/// declared parameter type's property type, OUT-cursor mode, opaque.
fn compile_placeholders(
    text: &str,
    param_ty: &Type,
    registry: &ShapeRegistry,
    extras: &IndexMap<String, Value>,
) -> Result<(String, Vec<ParameterDescriptor>)> {
    let navigator = Navigator::new(registry);
    let mut descriptors = Vec::new();

    let sql = token::parse_tokens(text, "#{", "}", &mut |content| {
        let placeholder = Placeholder::parse(content)?;
        let app_ty = resolve_app_ty(&placeholder, param_ty, registry, &navigator, extras)?;
        descriptors.push(placeholder.into_descriptor(app_ty));
        Ok("?".to_string())
    })?;

    Ok((sql, descriptors))
}

fn resolve_app_ty(
    placeholder: &Placeholder,
    param_ty: &Type,
    registry: &ShapeRegistry,
    navigator: &Navigator<'_>,
    extras: &IndexMap<String, Value>,
) -> Result<Type> {
    if let Some(name) = &placeholder.java_type {
        return Ok(registry.resolve_type(name));
    }

    let (first, _) = path::split_first(&placeholder.property)?;
    if extras.contains_key(first.name) {
        let root = Value::Map(extras.clone());
        let value = navigator.get(&root, &placeholder.property)?;
        return Ok(match value.infer_ty() {
            Type::Null => Type::Any,
            ty => ty,
        });
    }

    let declared = navigator
        .property_type(param_ty, &placeholder.property)
        .ok()
        .filter(|ty| !ty.is_any());
    if let Some(ty) = declared {
        return Ok(ty);
    }

    // An OUT-mode cursor parameter stays opaque; the driver materializes
    // it through its registered result map.
    Ok(Type::Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ParamMode;
    use sqlweave_core::meta::Shape;
    use sqlweave_core::DbType;

    #[test]
    fn static_compile_replaces_placeholders() {
        let registry = ShapeRegistry::new();
        let source = StaticSqlSource::compile(
            "SELECT id FROM t WHERE id = #{id} AND v = #{v, jdbcType=VARCHAR}",
            &Type::Map,
            &registry,
        )
        .unwrap();
        assert_eq!(source.sql, "SELECT id FROM t WHERE id = ? AND v = ?");
        assert_eq!(source.descriptors.len(), 2);
        assert_eq!(source.descriptors[0].property, "id");
        assert_eq!(source.descriptors[0].app_ty, Type::Any);
        assert_eq!(source.descriptors[1].db_ty, Some(DbType::Varchar));
    }

    #[test]
    fn declared_param_type_resolves_property_types() {
        let registry = ShapeRegistry::new();
        registry.register(
            Shape::new("Person")
                .property("id", Type::I64)
                .property("name", Type::String),
        );
        let source = StaticSqlSource::compile(
            "UPDATE person SET name = #{name} WHERE id = #{id}",
            &Type::Struct("Person".into()),
            &registry,
        )
        .unwrap();
        assert_eq!(source.descriptors[0].app_ty, Type::String);
        assert_eq!(source.descriptors[1].app_ty, Type::I64);
    }

    #[test]
    fn out_mode_without_java_type_is_opaque() {
        let registry = ShapeRegistry::new();
        let source = StaticSqlSource::compile(
            "CALL p(#{cur, mode=OUT, jdbcType=CURSOR, resultMap=rm})",
            &Type::Map,
            &registry,
        )
        .unwrap();
        assert_eq!(source.descriptors[0].mode, ParamMode::Out);
        assert_eq!(source.descriptors[0].app_ty, Type::Any);
        assert_eq!(source.descriptors[0].result_map.as_deref(), Some("rm"));
    }

    #[test]
    fn binding_parity_holds() {
        let registry = ShapeRegistry::new();
        let source = StaticSqlSource::compile(
            "INSERT INTO t (a, b, c) VALUES (#{a}, #{b}, #{c})",
            &Type::Map,
            &registry,
        )
        .unwrap();
        let marks = source.sql.matches('?').count();
        assert_eq!(marks, source.descriptors.len());
    }
}

use super::shape::{Folded, PropertyDef, Shape, TypeMeta};
use crate::{Error, Result, Type, Value};
use crate::value::StructValue;

use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Process-wide catalog of shapes and enums, plus the analyzed metadata
/// cache.
///
/// Analysis of a shape happens at most effectively-once: concurrent first
/// lookups may compute redundantly, but only the first published entry
/// wins and every caller converges on it.
#[derive(Debug, Default)]
pub struct ShapeRegistry {
    shapes: RwLock<HashMap<String, Arc<Shape>>>,
    enums: RwLock<HashMap<String, Arc<Vec<String>>>>,
    metas: RwLock<HashMap<String, Arc<TypeMeta>>>,
}

impl ShapeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a shape, replacing any previous registration under the
    /// same name. Shapes must be registered before bootstrap completes.
    pub fn register(&self, shape: Shape) {
        let name = shape.name.clone();
        self.shapes.write().insert(name.clone(), Arc::new(shape));
        // A replaced shape invalidates its analysis.
        self.metas.write().remove(&name);
    }

    /// Registers an enumerated type and its variant names.
    pub fn register_enum<I, S>(&self, name: impl Into<String>, variants: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let variants: Vec<String> = variants.into_iter().map(Into::into).collect();
        self.enums.write().insert(name.into(), Arc::new(variants));
    }

    pub fn is_enum(&self, name: &str) -> bool {
        self.enums.read().contains_key(name)
    }

    pub fn is_shape(&self, name: &str) -> bool {
        self.shapes.read().contains_key(name)
    }

    pub fn enum_variants(&self, name: &str) -> Option<Arc<Vec<String>>> {
        self.enums.read().get(name).cloned()
    }

    /// Resolves a type name from a mapping document: primitive spellings
    /// first, then registered enums, then shapes.
    pub fn resolve_type(&self, name: &str) -> Type {
        if let Some(ty) = Type::parse_primitive(name) {
            return ty;
        }
        if self.is_enum(name) {
            return Type::Enum(name.to_string());
        }
        Type::Struct(name.to_string())
    }

    /// Returns the analyzed metadata for a shape, computing and
    /// publishing it on first use.
    pub fn meta(&self, name: &str) -> Result<Arc<TypeMeta>> {
        if let Some(meta) = self.metas.read().get(name) {
            return Ok(meta.clone());
        }

        let analyzed = Arc::new(self.analyze(name)?);

        // First publication wins; later computations converge on it.
        let mut metas = self.metas.write();
        Ok(metas
            .entry(name.to_string())
            .or_insert(analyzed)
            .clone())
    }

    /// Constructs a fresh instance of a shape with every property null.
    pub fn instantiate(&self, name: &str) -> Result<Value> {
        let meta = self.meta(name)?;
        if !meta.constructible() {
            return Err(Error::no_default_constructor(format!(
                "shape `{name}` cannot be instantiated"
            )));
        }
        let mut instance = StructValue::new(name);
        for prop in meta.properties.values() {
            instance.fields.insert(prop.name.clone(), Value::Null);
        }
        Ok(Value::Struct(instance))
    }

    /// Materializes a fresh value of the declared type, used when a write
    /// must pass through a null intermediate.
    pub fn materialize(&self, ty: &Type) -> Result<Value> {
        match ty {
            Type::Struct(name) => self.instantiate(name),
            Type::Map => Ok(Value::Map(IndexMap::new())),
            Type::List(_) => Ok(Value::List(Vec::new())),
            other => Err(Error::no_default_constructor(format!(
                "cannot materialize an intermediate value of type `{other}`"
            ))),
        }
    }

    /// Whether `child` names a shape whose supertype chain includes
    /// `ancestor`.
    pub fn descends(&self, child: &str, ancestor: &str) -> bool {
        if child == ancestor {
            return true;
        }
        let shapes = self.shapes.read();
        let mut current = shapes.get(child);
        let mut hops = 0usize;
        while let Some(shape) = current {
            match &shape.parent {
                Some(parent) if parent == ancestor => return true,
                Some(parent) => {
                    hops += 1;
                    if hops > shapes.len() {
                        return false;
                    }
                    current = shapes.get(parent);
                }
                None => return false,
            }
        }
        false
    }

    fn analyze(&self, name: &str) -> Result<TypeMeta> {
        let chain = self.supertype_chain(name)?;

        // Merge from the root supertype down; later (more derived)
        // declarations override, subject to the conflict rules.
        let mut properties: IndexMap<String, PropertyDef> = IndexMap::new();
        let mut constructible = true;
        for shape in chain.iter().rev() {
            constructible = shape.constructible;
            for prop in shape.properties.values() {
                match properties.get(&prop.name).cloned() {
                    None => {
                        properties.insert(prop.name.clone(), prop.clone());
                    }
                    Some(existing) => {
                        let ty =
                            self.more_specific(name, &prop.name, &existing.ty, &prop.ty)?;
                        properties.insert(
                            prop.name.clone(),
                            PropertyDef {
                                name: prop.name.clone(),
                                ty,
                                readable: existing.readable || prop.readable,
                                writable: existing.writable || prop.writable,
                            },
                        );
                    }
                }
            }
        }

        let mut folded: HashMap<String, Folded> = HashMap::new();
        for prop in properties.keys() {
            folded
                .entry(prop.to_ascii_lowercase())
                .and_modify(|entry| *entry = Folded::Ambiguous)
                .or_insert_with(|| Folded::One(prop.clone()));
        }

        Ok(TypeMeta {
            name: name.to_string(),
            properties,
            folded,
            constructible,
        })
    }

    /// Walks `name` up to its root supertype; index 0 is the shape
    /// itself.
    fn supertype_chain(&self, name: &str) -> Result<Vec<Arc<Shape>>> {
        let shapes = self.shapes.read();
        let mut chain = Vec::new();
        let mut current = name;
        loop {
            let shape = shapes.get(current).ok_or_else(|| {
                Error::binding(format!("shape `{current}` is not registered"))
            })?;
            if chain.iter().any(|seen: &Arc<Shape>| seen.name == shape.name) {
                return Err(Error::config(format!(
                    "shape `{name}` has a cyclic supertype chain"
                )));
            }
            chain.push(shape.clone());
            match &shape.parent {
                Some(parent) => current = parent.as_str(),
                None => return Ok(chain),
            }
        }
    }

    /// Resolves two declared types for the same property: the more
    /// specific one wins; unrelated types fail.
    fn more_specific(
        &self,
        shape: &str,
        property: &str,
        a: &Type,
        b: &Type,
    ) -> Result<Type> {
        if a == b {
            return Ok(b.clone());
        }
        match (a, b) {
            (Type::Any, other) | (other, Type::Any) => Ok(other.clone()),
            (Type::List(ea), Type::List(eb)) => Ok(Type::list(
                self.more_specific(shape, property, ea, eb)?,
            )),
            (Type::Struct(sa), Type::Struct(sb)) => {
                if self.descends(sb, sa) {
                    Ok(Type::Struct(sb.clone()))
                } else if self.descends(sa, sb) {
                    Ok(Type::Struct(sa.clone()))
                } else {
                    Err(Error::ambiguous_accessor(format!(
                        "property `{property}` of shape `{shape}` is declared with unrelated types `{sa}` and `{sb}`"
                    )))
                }
            }
            _ => Err(Error::ambiguous_accessor(format!(
                "property `{property}` of shape `{shape}` is declared with unrelated types `{a}` and `{b}`"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn registry() -> ShapeRegistry {
        let reg = ShapeRegistry::new();
        reg.register(
            Shape::new("Entity")
                .property("id", Type::I64)
                .read_only("version", Type::I32),
        );
        reg.register(
            Shape::new("Person")
                .parent("Entity")
                .property("name", Type::String)
                .property("addresses", Type::list(Type::Struct("Address".into()))),
        );
        reg.register(
            Shape::new("Address")
                .property("id", Type::I64)
                .property("street", Type::String),
        );
        reg
    }

    #[test]
    fn merges_supertype_properties() {
        let reg = registry();
        let meta = reg.meta("Person").unwrap();
        assert!(meta.is_writable("id"));
        assert!(meta.is_readable("version"));
        assert!(!meta.is_writable("version"));
        assert_eq!(meta.property("name").unwrap().ty, Type::String);
    }

    #[test]
    fn analysis_is_published_once() {
        let reg = registry();
        let a = reg.meta("Person").unwrap();
        let b = reg.meta("Person").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn case_insensitive_lookup() {
        let reg = registry();
        let meta = reg.meta("Person").unwrap();
        assert_eq!(meta.find_property("NAME").unwrap(), Some("name"));
        assert_eq!(meta.find_property("missing").unwrap(), None);
    }

    #[test]
    fn case_collision_is_ambiguous() {
        let reg = ShapeRegistry::new();
        reg.register(
            Shape::new("Odd")
                .property("userName", Type::String)
                .property("username", Type::String),
        );
        let meta = reg.meta("Odd").unwrap();
        let err = meta.find_property("USERNAME").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AmbiguousAccessor);
    }

    #[test]
    fn unrelated_override_fails() {
        let reg = ShapeRegistry::new();
        reg.register(Shape::new("Base").property("x", Type::String));
        reg.register(Shape::new("Derived").parent("Base").property("x", Type::I64));
        let err = reg.meta("Derived").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AmbiguousAccessor);
    }

    #[test]
    fn more_specific_override_wins() {
        let reg = ShapeRegistry::new();
        reg.register(Shape::new("Animal").property("id", Type::I64));
        reg.register(Shape::new("Dog").parent("Animal").property("id", Type::I64));
        reg.register(Shape::new("Holder").property("pet", Type::Struct("Animal".into())));
        reg.register(
            Shape::new("DogHolder")
                .parent("Holder")
                .property("pet", Type::Struct("Dog".into())),
        );
        let meta = reg.meta("DogHolder").unwrap();
        assert_eq!(meta.property("pet").unwrap().ty, Type::Struct("Dog".into()));
    }

    #[test]
    fn instantiate_defaults_to_null_fields() {
        let reg = registry();
        let value = reg.instantiate("Address").unwrap();
        let s = value.as_struct().unwrap();
        assert_eq!(s.shape, "Address");
        assert_eq!(s.get("street"), Some(&Value::Null));
    }

    #[test]
    fn non_constructible_shape_fails() {
        let reg = ShapeRegistry::new();
        reg.register(Shape::new("View").property("x", Type::I64).not_constructible());
        let err = reg.instantiate("View").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoDefaultConstructor);
    }
}

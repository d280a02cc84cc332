use super::ShapeRegistry;
use crate::path::{self, Segment};
use crate::value::{LazyLoader, LazyValue, StructValue};
use crate::{Error, Result, Type, Value};

use indexmap::IndexMap;

/// Reads and writes property expressions over value trees.
///
/// Reads are side-effect-free (resolving a deferred slot mutates only the
/// slot's interior); writes mutate the target leaf and materialize null
/// intermediates from their declared types.
#[derive(Clone, Copy)]
pub struct Navigator<'a> {
    registry: &'a ShapeRegistry,
    loader: Option<&'a dyn LazyLoader>,
    aggressive: bool,
}

impl<'a> Navigator<'a> {
    pub fn new(registry: &'a ShapeRegistry) -> Self {
        Self {
            registry,
            loader: None,
            aggressive: false,
        }
    }

    /// Attaches the loader used to resolve deferred nested selects.
    pub fn with_loader(mut self, loader: &'a dyn LazyLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    /// When set, touching any property of an object resolves every
    /// deferred slot the object holds.
    pub fn aggressive_lazy(mut self, aggressive: bool) -> Self {
        self.aggressive = aggressive;
        self
    }

    pub fn registry(&self) -> &'a ShapeRegistry {
        self.registry
    }

    /// Reads the value at `expr`. An intermediate null yields `Null` for
    /// the whole expression.
    pub fn get(&self, root: &Value, expr: &str) -> Result<Value> {
        let segments = path::parse(expr)?;
        self.get_in(root, &segments)
    }

    /// Writes `value` at `expr`, materializing null intermediates.
    pub fn set(&self, root: &mut Value, expr: &str, value: Value) -> Result<()> {
        let segments = path::parse(expr)?;
        if segments.is_empty() {
            return Err(Error::malformed_path(format!(
                "empty property expression `{expr}`"
            )));
        }
        self.set_in(root, &segments, value)
    }

    /// Resolves the declared type at `expr`, starting from a declared
    /// root type. Used at compile time, where no instance exists yet.
    pub fn property_type(&self, root: &Type, expr: &str) -> Result<Type> {
        let mut ty = root.clone();
        for seg in path::parse(expr)? {
            ty = match ty {
                Type::Struct(name) => {
                    let meta = self.registry.meta(&name)?;
                    let prop = meta.property(seg.name).ok_or_else(|| {
                        Error::binding(format!("shape `{name}` has no property `{}`", seg.name))
                    })?;
                    prop.ty.clone()
                }
                Type::Map | Type::Any => Type::Any,
                other => {
                    return Err(Error::binding(format!(
                        "cannot resolve property `{}` on type `{other}`",
                        seg.name
                    )))
                }
            };
            if seg.index.is_some() {
                ty = match ty {
                    Type::List(element) => *element,
                    Type::Map | Type::Any => Type::Any,
                    other => {
                        return Err(Error::unindexable(format!(
                            "type `{other}` does not support indexed access"
                        )))
                    }
                };
            }
        }
        Ok(ty)
    }

    fn get_in(&self, current: &Value, segments: &[Segment<'_>]) -> Result<Value> {
        if let Value::Lazy(lazy) = current {
            // A deferred leaf is handed back unresolved when no loader is
            // attached; navigating through it requires one.
            if segments.is_empty() && self.loader.is_none() && lazy.peek().is_none() {
                return Ok(current.clone());
            }
            let resolved = self.resolve_lazy(lazy)?;
            return self.get_in(&resolved, segments);
        }

        let Some((seg, rest)) = segments.split_first() else {
            return Ok(current.clone());
        };

        if current.is_null() {
            return Ok(Value::Null);
        }

        let field = match current {
            Value::Struct(object) => {
                if self.aggressive {
                    self.fire_deferred_fields(object)?;
                }
                let meta = self.registry.meta(&object.shape)?;
                let prop = meta.property(seg.name).ok_or_else(|| {
                    Error::binding(format!(
                        "shape `{}` has no property `{}`",
                        object.shape, seg.name
                    ))
                })?;
                if !prop.readable {
                    return Err(Error::binding(format!(
                        "property `{}` of shape `{}` is not readable",
                        seg.name, object.shape
                    )));
                }
                object.fields.get(seg.name).cloned().unwrap_or(Value::Null)
            }
            Value::Map(entries) => entries.get(seg.name).cloned().unwrap_or(Value::Null),
            other => {
                return Err(Error::binding(format!(
                    "cannot read property `{}` of {}",
                    seg.name,
                    other.kind_name()
                )))
            }
        };

        let field = self.index_into(field, seg)?;
        self.get_in(&field, rest)
    }

    /// Applies the segment's bracketed index, if any.
    fn index_into(&self, value: Value, seg: &Segment<'_>) -> Result<Value> {
        let Some(index) = seg.index else {
            return Ok(value);
        };
        let value = match value {
            Value::Lazy(lazy) => self.resolve_lazy(&lazy)?,
            other => other,
        };
        match value {
            Value::Null => Ok(Value::Null),
            Value::List(items) => {
                let i = parse_list_index(seg.name, index)?;
                Ok(items.get(i).cloned().unwrap_or(Value::Null))
            }
            Value::Map(entries) => Ok(entries.get(index).cloned().unwrap_or(Value::Null)),
            other => Err(Error::unindexable(format!(
                "cannot index into {} at `{}[{}]`",
                other.kind_name(),
                seg.name,
                index
            ))),
        }
    }

    fn set_in(&self, current: &mut Value, segments: &[Segment<'_>], value: Value) -> Result<()> {
        if let Value::Lazy(lazy) = &*current {
            let resolved = self.resolve_lazy(lazy)?;
            *current = resolved;
        }

        let (seg, rest) = segments
            .split_first()
            .expect("set_in called with no segments");
        let is_leaf = rest.is_empty();

        match current {
            Value::Struct(object) => {
                let meta = self.registry.meta(&object.shape)?;
                let prop = meta
                    .property(seg.name)
                    .ok_or_else(|| {
                        Error::binding(format!(
                            "shape `{}` has no property `{}`",
                            object.shape, seg.name
                        ))
                    })?
                    .clone();

                if is_leaf && seg.index.is_none() {
                    if !prop.writable {
                        return Err(Error::binding(format!(
                            "property `{}` of shape `{}` is not writable",
                            seg.name, object.shape
                        )));
                    }
                    object.fields.insert(seg.name.to_string(), value);
                    return Ok(());
                }

                let slot = object
                    .fields
                    .entry(seg.name.to_string())
                    .or_insert(Value::Null);
                if slot.is_null() {
                    *slot = self.registry.materialize(&prop.ty)?;
                }
                self.set_through(slot, seg, prop.ty.element().cloned(), rest, value)
            }
            Value::Map(entries) => {
                if is_leaf && seg.index.is_none() {
                    entries.insert(seg.name.to_string(), value);
                    return Ok(());
                }
                let slot = entries.entry(seg.name.to_string()).or_insert(Value::Null);
                if slot.is_null() {
                    // Mapping members are untyped; intermediates become maps.
                    *slot = Value::Map(IndexMap::new());
                }
                self.set_through(slot, seg, None, rest, value)
            }
            Value::Null => Err(Error::binding(format!(
                "cannot write property `{}` through a null value",
                seg.name
            ))),
            other => Err(Error::binding(format!(
                "cannot write property `{}` of {}",
                seg.name,
                other.kind_name()
            ))),
        }
    }

    /// Continues a write through the segment's index (when present) and
    /// the remaining path.
    fn set_through(
        &self,
        slot: &mut Value,
        seg: &Segment<'_>,
        element_ty: Option<Type>,
        rest: &[Segment<'_>],
        value: Value,
    ) -> Result<()> {
        let Some(index) = seg.index else {
            return self.set_in(slot, rest, value);
        };

        if let Value::Lazy(lazy) = &*slot {
            let resolved = self.resolve_lazy(lazy)?;
            *slot = resolved;
        }

        let element = match slot {
            Value::List(items) => {
                let i = parse_list_index(seg.name, index)?;
                if i < items.len() {
                    &mut items[i]
                } else if i == items.len() {
                    items.push(Value::Null);
                    items.last_mut().expect("pushed element")
                } else {
                    return Err(Error::binding(format!(
                        "index {i} is out of bounds at `{}[{index}]` (length {})",
                        seg.name,
                        items.len()
                    )));
                }
            }
            Value::Map(entries) => entries.entry(index.to_string()).or_insert(Value::Null),
            other => {
                return Err(Error::unindexable(format!(
                    "cannot index into {} at `{}[{}]`",
                    other.kind_name(),
                    seg.name,
                    index
                )))
            }
        };

        if rest.is_empty() {
            *element = value;
            return Ok(());
        }

        if element.is_null() {
            *element = match element_ty {
                Some(ty) => self.registry.materialize(&ty)?,
                None => Value::Map(IndexMap::new()),
            };
        }
        self.set_in(element, rest, value)
    }

    fn resolve_lazy(&self, lazy: &LazyValue) -> Result<Value> {
        if let Some(resolved) = lazy.peek() {
            return Ok(resolved);
        }
        match self.loader {
            Some(loader) => lazy.resolve(loader),
            None => Err(Error::binding(
                "deferred value accessed without an owning session".to_string(),
            )),
        }
    }

    fn fire_deferred_fields(&self, object: &StructValue) -> Result<()> {
        if self.loader.is_none() {
            return Ok(());
        }
        for field in object.fields.values() {
            if let Value::Lazy(lazy) = field {
                self.resolve_lazy(lazy)?;
            }
        }
        Ok(())
    }
}

fn parse_list_index(name: &str, index: &str) -> Result<usize> {
    index.trim().parse::<usize>().map_err(|_| {
        Error::type_conversion(
            &Value::string(index),
            format!("integer index at `{name}[{index}]`"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::Shape;
    use crate::ErrorKind;

    fn registry() -> ShapeRegistry {
        let reg = ShapeRegistry::new();
        reg.register(
            Shape::new("Person")
                .property("id", Type::I64)
                .property("name", Type::String)
                .property("home", Type::Struct("Address".into()))
                .property("addresses", Type::list(Type::Struct("Address".into()))),
        );
        reg.register(
            Shape::new("Address")
                .property("id", Type::I64)
                .property("street", Type::String),
        );
        reg
    }

    fn person() -> Value {
        Value::Struct(
            StructValue::new("Person")
                .with("id", Value::I64(7))
                .with("name", "John")
                .with(
                    "addresses",
                    Value::List(vec![Value::Struct(
                        StructValue::new("Address")
                            .with("id", Value::I64(1))
                            .with("street", "Main St"),
                    )]),
                ),
        )
    }

    #[test]
    fn read_nested_indexed() {
        let reg = registry();
        let nav = Navigator::new(&reg);
        assert_eq!(
            nav.get(&person(), "addresses[0].street").unwrap(),
            Value::string("Main St")
        );
    }

    #[test]
    fn read_through_null_yields_null() {
        let reg = registry();
        let nav = Navigator::new(&reg);
        assert_eq!(nav.get(&person(), "home.street").unwrap(), Value::Null);
    }

    #[test]
    fn read_unknown_property_fails() {
        let reg = registry();
        let nav = Navigator::new(&reg);
        let err = nav.get(&person(), "nope").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Binding);
    }

    #[test]
    fn write_materializes_intermediates() {
        let reg = registry();
        let nav = Navigator::new(&reg);
        let mut p = person();
        nav.set(&mut p, "home.street", Value::string("Elm St")).unwrap();
        assert_eq!(nav.get(&p, "home.street").unwrap(), Value::string("Elm St"));
        // The materialized intermediate is a real Address instance.
        assert_eq!(nav.get(&p, "home.id").unwrap(), Value::Null);
    }

    #[test]
    fn write_read_round_trip() {
        let reg = registry();
        let nav = Navigator::new(&reg);
        let mut p = person();
        nav.set(&mut p, "addresses[0].id", Value::I64(42)).unwrap();
        assert_eq!(nav.get(&p, "addresses[0].id").unwrap(), Value::I64(42));
    }

    #[test]
    fn append_at_list_end() {
        let reg = registry();
        let nav = Navigator::new(&reg);
        let mut p = person();
        nav.set(
            &mut p,
            "addresses[1]",
            Value::Struct(StructValue::new("Address").with("id", Value::I64(2))),
        )
        .unwrap();
        assert_eq!(nav.get(&p, "addresses[1].id").unwrap(), Value::I64(2));
    }

    #[test]
    fn index_into_scalar_fails() {
        let reg = registry();
        let nav = Navigator::new(&reg);
        let err = nav.get(&person(), "name[0]").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnindexableNode);
    }

    #[test]
    fn map_keys_use_raw_strings() {
        let reg = registry();
        let nav = Navigator::new(&reg);
        let mut root = Value::Map(IndexMap::new());
        nav.set(&mut root, "counts[a.b]", Value::I64(3)).unwrap();
        assert_eq!(nav.get(&root, "counts[a.b]").unwrap(), Value::I64(3));
    }

    #[test]
    fn materializing_a_scalar_intermediate_fails() {
        let reg = registry();
        let nav = Navigator::new(&reg);
        let mut p = person();
        // `name` is a string; writing through it must not invent a value.
        let err = nav.set(&mut p, "name.x", Value::I64(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Binding);
    }

    #[test]
    fn declared_type_walk() {
        let reg = registry();
        let nav = Navigator::new(&reg);
        let root = Type::Struct("Person".into());
        assert_eq!(
            nav.property_type(&root, "addresses[0].street").unwrap(),
            Type::String
        );
        assert_eq!(nav.property_type(&root, "id").unwrap(), Type::I64);
        assert_eq!(nav.property_type(&Type::Map, "anything").unwrap(), Type::Any);
    }
}

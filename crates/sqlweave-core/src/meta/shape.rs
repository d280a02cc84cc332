use crate::Type;

use indexmap::IndexMap;
use std::collections::HashMap;

/// A registered type descriptor.
///
/// Rust has no runtime reflection, so application types participate in
/// mapping by registering a shape: the property set with declared types
/// and read/write permissions, plus an optional supertype whose
/// properties are inherited.
#[derive(Debug, Clone)]
pub struct Shape {
    pub(crate) name: String,
    pub(crate) parent: Option<String>,
    pub(crate) properties: IndexMap<String, PropertyDef>,
    pub(crate) constructible: bool,
}

/// One declared property of a shape.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDef {
    pub name: String,
    pub ty: Type,
    pub readable: bool,
    pub writable: bool,
}

impl Shape {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            properties: IndexMap::new(),
            constructible: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declares the supertype whose properties this shape inherits.
    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Declares a readable and writable property.
    pub fn property(self, name: impl Into<String>, ty: Type) -> Self {
        self.accessor(name, ty, true, true)
    }

    pub fn read_only(self, name: impl Into<String>, ty: Type) -> Self {
        self.accessor(name, ty, true, false)
    }

    pub fn write_only(self, name: impl Into<String>, ty: Type) -> Self {
        self.accessor(name, ty, false, true)
    }

    /// Marks the shape as lacking a nullary constructor; materializing an
    /// instance fails with `NoDefaultConstructor`.
    pub fn not_constructible(mut self) -> Self {
        self.constructible = false;
        self
    }

    fn accessor(mut self, name: impl Into<String>, ty: Type, readable: bool, writable: bool) -> Self {
        let name = name.into();
        self.properties.insert(
            name.clone(),
            PropertyDef {
                name,
                ty,
                readable,
                writable,
            },
        );
        self
    }
}

/// The analyzed view of a shape: the effective property set merged over
/// the supertype chain, plus a case-folded lookup table for resolving
/// column-derived names.
///
/// Built once per shape by the [`ShapeRegistry`](super::ShapeRegistry)
/// and shared afterwards.
#[derive(Debug)]
pub struct TypeMeta {
    pub(crate) name: String,
    pub(crate) properties: IndexMap<String, PropertyDef>,
    pub(crate) folded: HashMap<String, Folded>,
    pub(crate) constructible: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Folded {
    One(String),
    Ambiguous,
}

impl TypeMeta {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.get(name)
    }

    pub fn readable_names(&self) -> impl Iterator<Item = &str> {
        self.properties
            .values()
            .filter(|p| p.readable)
            .map(|p| p.name.as_str())
    }

    pub fn writable_names(&self) -> impl Iterator<Item = &str> {
        self.properties
            .values()
            .filter(|p| p.writable)
            .map(|p| p.name.as_str())
    }

    pub fn is_readable(&self, name: &str) -> bool {
        self.property(name).is_some_and(|p| p.readable)
    }

    pub fn is_writable(&self, name: &str) -> bool {
        self.property(name).is_some_and(|p| p.writable)
    }

    pub fn constructible(&self) -> bool {
        self.constructible
    }

    /// Resolves a column-derived name to the canonical property name,
    /// ignoring case. Returns an error when two distinct properties
    /// collide on the folded spelling.
    pub fn find_property(&self, name: &str) -> crate::Result<Option<&str>> {
        match self.folded.get(&name.to_ascii_lowercase()) {
            None => Ok(None),
            Some(Folded::One(canonical)) => Ok(Some(canonical)),
            Some(Folded::Ambiguous) => Err(crate::Error::ambiguous_accessor(format!(
                "name `{name}` matches more than one property of shape `{}`",
                self.name
            ))),
        }
    }
}

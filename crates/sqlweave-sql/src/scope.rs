use indexmap::IndexMap;
use sqlweave_core::meta::Navigator;
use sqlweave_core::{path, Result, Value};

/// The lexically nested name→value mapping dynamic SQL evaluates against.
///
/// Lookup order: local frames innermost-first (`<bind>` results, foreach
/// iteration variables), then the host parameter object through the
/// navigator. Frames nest on foreach/bind scopes and are discarded on
/// exit.
pub struct Scope<'a> {
    navigator: Navigator<'a>,
    param: &'a Value,
    frames: Vec<IndexMap<String, Value>>,
}

impl<'a> Scope<'a> {
    pub fn new(navigator: Navigator<'a>, param: &'a Value) -> Self {
        Self {
            navigator,
            param,
            frames: vec![IndexMap::new()],
        }
    }

    pub fn navigator(&self) -> Navigator<'a> {
        self.navigator
    }

    pub fn param(&self) -> &'a Value {
        self.param
    }

    pub fn push_frame(&mut self) {
        self.frames.push(IndexMap::new());
    }

    pub fn pop_frame(&mut self) {
        debug_assert!(self.frames.len() > 1, "cannot pop the root frame");
        self.frames.pop();
    }

    /// Binds a name in the innermost frame, shadowing outer bindings.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.frames
            .last_mut()
            .expect("scope always has a root frame")
            .insert(name.into(), value);
    }

    /// Resolves a property expression: scope locals first, then the host
    /// parameter object. Unknown names on an untyped parameter resolve to
    /// null.
    pub fn resolve(&self, expr: &str) -> Result<Value> {
        let (first, _) = path::split_first(expr)?;

        for frame in self.frames.iter().rev() {
            if frame.contains_key(first.name) {
                let root = Value::Map(frame.clone());
                return self.navigator.get(&root, expr);
            }
        }

        self.resolve_on_param(expr, first.name)
    }

    fn resolve_on_param(&self, expr: &str, first: &str) -> Result<Value> {
        match self.param {
            Value::Struct(_) | Value::Map(_) => self.navigator.get(self.param, expr),
            param => {
                // A single unnamed parameter answers to `value` and
                // `param1` (collections additionally to `list`,
                // `collection`, and `array`); a simple value also answers
                // to any plain name.
                let aliased = first == "value"
                    || first == "param1"
                    || (param.as_list().is_some()
                        && matches!(first, "list" | "collection" | "array"))
                    || (!expr.contains('.') && !expr.contains('['));
                if aliased {
                    let mut root = IndexMap::new();
                    root.insert(first.to_string(), param.clone());
                    self.navigator.get(&Value::Map(root), expr)
                } else {
                    self.navigator.get(param, expr)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlweave_core::ShapeRegistry;

    fn map(entries: &[(&str, Value)]) -> Value {
        Value::Map(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn locals_shadow_param_properties() {
        let reg = ShapeRegistry::new();
        let param = map(&[("x", Value::I64(1))]);
        let mut scope = Scope::new(Navigator::new(&reg), &param);
        assert_eq!(scope.resolve("x").unwrap(), Value::I64(1));

        scope.push_frame();
        scope.bind("x", Value::I64(2));
        assert_eq!(scope.resolve("x").unwrap(), Value::I64(2));

        scope.pop_frame();
        assert_eq!(scope.resolve("x").unwrap(), Value::I64(1));
    }

    #[test]
    fn missing_map_key_is_null() {
        let reg = ShapeRegistry::new();
        let param = map(&[]);
        let scope = Scope::new(Navigator::new(&reg), &param);
        assert_eq!(scope.resolve("absent").unwrap(), Value::Null);
    }

    #[test]
    fn simple_param_answers_any_plain_name() {
        let reg = ShapeRegistry::new();
        let param = Value::I64(7);
        let scope = Scope::new(Navigator::new(&reg), &param);
        assert_eq!(scope.resolve("id").unwrap(), Value::I64(7));
        assert_eq!(scope.resolve("value").unwrap(), Value::I64(7));
        assert_eq!(scope.resolve("param1").unwrap(), Value::I64(7));
    }

    #[test]
    fn locals_support_nested_paths() {
        let reg = ShapeRegistry::new();
        let param = Value::Null;
        let mut scope = Scope::new(Navigator::new(&reg), &param);
        scope.bind("item", map(&[("id", Value::I64(3))]));
        assert_eq!(scope.resolve("item.id").unwrap(), Value::I64(3));
    }
}

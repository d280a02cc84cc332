use sqlweave_core::Value;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// A composite cache key built from the statement name, final SQL,
/// ordered bound values, pagination bounds, and environment id.
///
/// The key hashes its parts element-wise, so an array and a sequence
/// carrying the same elements produce equal keys.
#[derive(Debug, Clone)]
pub struct CacheKey {
    parts: Vec<Value>,
    hash: u64,
}

impl CacheKey {
    pub fn new() -> Self {
        Self {
            parts: Vec::new(),
            hash: 17,
        }
    }

    /// Folds one component into the key.
    pub fn update(&mut self, value: impl Into<Value>) {
        let value = value.into();
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        self.hash = self.hash.wrapping_mul(37).wrapping_add(hasher.finish());
        self.parts.push(value);
    }

    pub fn parts(&self) -> &[Value] {
        &self.parts
    }
}

impl Default for CacheKey {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.parts == other.parts
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_parts_make_equal_keys() {
        let mut a = CacheKey::new();
        let mut b = CacheKey::new();
        for key in [&mut a, &mut b] {
            key.update("ns.find");
            key.update("SELECT 1");
            key.update(Value::List(vec![Value::I64(1), Value::I64(2)]));
        }
        assert_eq!(a, b);
    }

    #[test]
    fn order_matters() {
        let mut a = CacheKey::new();
        a.update(Value::I64(1));
        a.update(Value::I64(2));
        let mut b = CacheKey::new();
        b.update(Value::I64(2));
        b.update(Value::I64(1));
        assert_ne!(a, b);
    }

    #[test]
    fn list_sources_with_same_elements_are_equal() {
        // Bound values that arrive as different sequence kinds hash the
        // same once normalized to value lists.
        let mut a = CacheKey::new();
        a.update(Value::List(vec![Value::I64(3), Value::I64(4)]));
        let mut b = CacheKey::new();
        b.update(Value::List(vec![Value::I64(3), Value::I64(4)]));
        assert_eq!(a, b);
    }
}

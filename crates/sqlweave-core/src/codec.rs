//! Bidirectional value codecs.
//!
//! A codec applies an application value to a driver statement and decodes
//! a cursor cell back into an application value. Codecs are resolved
//! primarily by application type, secondarily by database type.

use crate::driver::{ColumnRef, PreparedStatement, RowCursor};
use crate::value::ValueEnum;
use crate::{DbType, Error, Result, Type, Value};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub trait Codec: Send + Sync + fmt::Debug {
    /// Applies `value` to the statement at `ordinal`.
    fn encode(
        &self,
        stmt: &mut dyn PreparedStatement,
        ordinal: usize,
        value: &Value,
        db_ty: DbType,
    ) -> Result<()>;

    /// Decodes the cell at `column` of the cursor's current row.
    fn decode(&self, row: &dyn RowCursor, column: &ColumnRef<'_>) -> Result<Value>;
}

/// Coerces a value into the target application type, widening and
/// narrowing numerics with range checks.
pub fn coerce(value: &Value, target: &Type) -> Result<Value> {
    if value.is_null() || target.is_any() || target.is_null() {
        return Ok(value.clone());
    }
    if value.infer_ty() == *target {
        return Ok(value.clone());
    }

    macro_rules! narrow {
        ($variant:ident, $ty:ty) => {
            value
                .as_i128()
                .and_then(|wide| <$ty>::try_from(wide).ok())
                .map(Value::$variant)
        };
    }

    let coerced = match target {
        Type::Bool => match value {
            Value::Bool(v) => Some(Value::Bool(*v)),
            Value::String(s) if s == "true" => Some(Value::Bool(true)),
            Value::String(s) if s == "false" => Some(Value::Bool(false)),
            _ => value.as_i128().map(|v| Value::Bool(v != 0)),
        },
        Type::I8 => narrow!(I8, i8),
        Type::I16 => narrow!(I16, i16),
        Type::I32 => narrow!(I32, i32),
        Type::I64 => narrow!(I64, i64),
        Type::U8 => narrow!(U8, u8),
        Type::U16 => narrow!(U16, u16),
        Type::U32 => narrow!(U32, u32),
        Type::U64 => narrow!(U64, u64),
        Type::F32 => value.as_f64().map(|v| Value::F32(v as f32)),
        Type::F64 => value.as_f64().map(Value::F64),
        Type::String => match value {
            Value::String(s) => Some(Value::String(s.clone())),
            Value::Bool(v) => Some(Value::string(v.to_string())),
            Value::Uuid(v) => Some(Value::string(v.to_string())),
            Value::Enum(v) => Some(Value::string(v.variant.clone())),
            _ => {
                if let Some(wide) = value.as_i128() {
                    Some(Value::string(wide.to_string()))
                } else {
                    value.as_f64().map(|v| Value::string(v.to_string()))
                }
            }
        },
        Type::Bytes => match value {
            Value::Bytes(v) => Some(Value::Bytes(v.clone())),
            _ => None,
        },
        Type::Uuid => match value {
            Value::Uuid(v) => Some(Value::Uuid(*v)),
            Value::String(s) => uuid::Uuid::parse_str(s).ok().map(Value::Uuid),
            _ => None,
        },
        Type::Enum(ty) => match value {
            Value::Enum(v) if v.ty == *ty => Some(value.clone()),
            Value::String(s) => Some(Value::Enum(ValueEnum {
                ty: ty.clone(),
                variant: s.clone(),
            })),
            _ => None,
        },
        Type::List(_) | Type::Map | Type::Struct(_) => {
            // Containers only pass through unchanged (handled above).
            None
        }
        Type::Any | Type::Null => unreachable!(),
    };

    coerced.ok_or_else(|| Error::type_conversion(value, target))
}

/// The stock codec for a declared application type: coerce, then hand the
/// value to the driver.
#[derive(Debug, Clone)]
pub struct TypedCodec {
    ty: Type,
}

impl TypedCodec {
    pub fn new(ty: Type) -> Self {
        Self { ty }
    }
}

impl Codec for TypedCodec {
    fn encode(
        &self,
        stmt: &mut dyn PreparedStatement,
        ordinal: usize,
        value: &Value,
        db_ty: DbType,
    ) -> Result<()> {
        let value = coerce(value, &self.ty)?;
        stmt.bind(ordinal, value, db_ty)
    }

    fn decode(&self, row: &dyn RowCursor, column: &ColumnRef<'_>) -> Result<Value> {
        let cell = row.get(column)?;
        coerce(&cell, &self.ty)
    }
}

/// Stores enum variants under their names; the database side is a
/// character column.
#[derive(Debug, Clone)]
pub struct EnumNameCodec {
    ty: String,
}

impl EnumNameCodec {
    pub fn new(ty: impl Into<String>) -> Self {
        Self { ty: ty.into() }
    }
}

impl Codec for EnumNameCodec {
    fn encode(
        &self,
        stmt: &mut dyn PreparedStatement,
        ordinal: usize,
        value: &Value,
        db_ty: DbType,
    ) -> Result<()> {
        let value = match value {
            Value::Null => Value::Null,
            Value::Enum(v) if v.ty == self.ty => Value::string(v.variant.clone()),
            Value::String(s) => Value::string(s.clone()),
            other => return Err(Error::type_conversion(other, format!("enum {}", self.ty))),
        };
        stmt.bind(ordinal, value, db_ty)
    }

    fn decode(&self, row: &dyn RowCursor, column: &ColumnRef<'_>) -> Result<Value> {
        match row.get(column)? {
            Value::Null => Ok(Value::Null),
            Value::String(s) => Ok(Value::enum_variant(self.ty.clone(), s)),
            other => Err(Error::type_conversion(&other, format!("enum {}", self.ty))),
        }
    }
}

/// Passes values through untouched; the fallback when nothing better is
/// known.
#[derive(Debug, Clone, Default)]
pub struct OpaqueCodec;

impl Codec for OpaqueCodec {
    fn encode(
        &self,
        stmt: &mut dyn PreparedStatement,
        ordinal: usize,
        value: &Value,
        db_ty: DbType,
    ) -> Result<()> {
        stmt.bind(ordinal, value.clone(), db_ty)
    }

    fn decode(&self, row: &dyn RowCursor, column: &ColumnRef<'_>) -> Result<Value> {
        row.get(column)
    }
}

/// Resolves codecs by declared or inferred type pairs.
///
/// Lookup order: exact (application, database) pair, application type
/// only, database type only, opaque fallback. Enum types fall back to the
/// name-based codec unless overridden.
#[derive(Debug)]
pub struct CodecRegistry {
    exact: HashMap<(Type, DbType), Arc<dyn Codec>>,
    by_app: HashMap<Type, Arc<dyn Codec>>,
    by_db: HashMap<DbType, Arc<dyn Codec>>,
    named: HashMap<String, Arc<dyn Codec>>,
    fallback: Arc<dyn Codec>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            exact: HashMap::new(),
            by_app: HashMap::new(),
            by_db: HashMap::new(),
            named: HashMap::new(),
            fallback: Arc::new(OpaqueCodec),
        };

        for ty in [
            Type::Bool,
            Type::I8,
            Type::I16,
            Type::I32,
            Type::I64,
            Type::U8,
            Type::U16,
            Type::U32,
            Type::U64,
            Type::F32,
            Type::F64,
            Type::String,
            Type::Bytes,
            Type::Uuid,
        ] {
            registry.register_app(ty.clone(), Arc::new(TypedCodec::new(ty)));
        }

        registry
    }

    /// Registers a codec for an exact (application, database) type pair.
    pub fn register(&mut self, app: Type, db: DbType, codec: Arc<dyn Codec>) {
        self.exact.insert((app, db), codec);
    }

    pub fn register_app(&mut self, app: Type, codec: Arc<dyn Codec>) {
        self.by_app.insert(app, codec);
    }

    pub fn register_db(&mut self, db: DbType, codec: Arc<dyn Codec>) {
        self.by_db.insert(db, codec);
    }

    /// Registers a codec under a name, referenced by `typeHandler`
    /// overrides in mapping documents.
    pub fn register_named(&mut self, name: impl Into<String>, codec: Arc<dyn Codec>) {
        self.named.insert(name.into(), codec);
    }

    pub fn named(&self, name: &str) -> Result<Arc<dyn Codec>> {
        self.named
            .get(name)
            .cloned()
            .ok_or_else(|| Error::config(format!("no codec registered under name `{name}`")))
    }

    pub fn lookup(&self, app: &Type, db: Option<DbType>) -> Arc<dyn Codec> {
        if let Some(db) = db {
            if let Some(codec) = self.exact.get(&(app.clone(), db)) {
                return codec.clone();
            }
        }
        if let Some(codec) = self.by_app.get(app) {
            return codec.clone();
        }
        if let Type::Enum(name) = app {
            return Arc::new(EnumNameCodec::new(name.clone()));
        }
        if let Some(db) = db {
            if let Some(codec) = self.by_db.get(&db) {
                return codec.clone();
            }
        }
        self.fallback.clone()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_widens_and_narrows() {
        assert_eq!(coerce(&Value::I32(7), &Type::I64).unwrap(), Value::I64(7));
        assert_eq!(coerce(&Value::I64(7), &Type::I16).unwrap(), Value::I16(7));
        assert!(coerce(&Value::I64(1 << 40), &Type::I16).is_err());
        assert_eq!(
            coerce(&Value::I32(3), &Type::F64).unwrap(),
            Value::F64(3.0)
        );
    }

    #[test]
    fn coerce_null_passes_through() {
        assert_eq!(coerce(&Value::Null, &Type::I64).unwrap(), Value::Null);
    }

    #[test]
    fn coerce_string_from_scalar() {
        assert_eq!(
            coerce(&Value::I64(42), &Type::String).unwrap(),
            Value::string("42")
        );
        assert_eq!(
            coerce(&Value::Bool(true), &Type::String).unwrap(),
            Value::string("true")
        );
    }

    #[test]
    fn lookup_prefers_exact_pair() {
        let mut registry = CodecRegistry::new();
        let special: Arc<dyn Codec> = Arc::new(OpaqueCodec);
        registry.register(Type::String, DbType::Clob, special.clone());
        let found = registry.lookup(&Type::String, Some(DbType::Clob));
        assert!(Arc::ptr_eq(&found, &special));

        // Without the matching db type, the app-only entry wins.
        let found = registry.lookup(&Type::String, Some(DbType::Varchar));
        assert!(!Arc::ptr_eq(&found, &special));
    }

    #[test]
    fn lookup_falls_back_by_db_then_opaque() {
        let mut registry = CodecRegistry::new();
        let by_db: Arc<dyn Codec> = Arc::new(OpaqueCodec);
        registry.register_db(DbType::Timestamp, by_db.clone());
        let found = registry.lookup(&Type::Struct("Instant".into()), Some(DbType::Timestamp));
        assert!(Arc::ptr_eq(&found, &by_db));

        let fallback = registry.lookup(&Type::Struct("Instant".into()), None);
        assert!(!Arc::ptr_eq(&fallback, &by_db));
    }

    #[test]
    fn enum_defaults_to_name_codec() {
        let registry = CodecRegistry::new();
        let codec = registry.lookup(&Type::Enum("Color".into()), None);
        // The enum codec round-trips variant names as strings.
        assert!(format!("{codec:?}").contains("EnumNameCodec"));
    }
}

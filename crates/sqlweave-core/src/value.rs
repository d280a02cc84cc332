use crate::{Result, Type};

use indexmap::IndexMap;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// The universal application value.
///
/// Parameter objects, mapped result objects, and evaluation-scope entries
/// are all `Value` trees. Shape-typed objects are [`Value::Struct`];
/// free-form string-keyed data is [`Value::Map`].
#[derive(Debug, Default, Clone, PartialEq)]
pub enum Value {
    #[default]
    Null,

    Bool(bool),

    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),

    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),

    F32(f32),
    F64(f64),

    String(String),

    Bytes(Vec<u8>),

    Uuid(uuid::Uuid),

    /// Value of an enumerated type
    Enum(ValueEnum),

    /// A list of values
    List(Vec<Value>),

    /// A string-keyed mapping; iterates in insertion order
    Map(IndexMap<String, Value>),

    /// An instance of a registered shape
    Struct(StructValue),

    /// A deferred nested-select result; resolves on first access
    Lazy(LazyValue),
}

/// A variant of a named enumerated type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValueEnum {
    pub ty: String,
    pub variant: String,
}

/// A shape instance: the shape name plus its field values.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StructValue {
    pub shape: String,
    pub fields: IndexMap<String, Value>,
}

impl StructValue {
    pub fn new(shape: impl Into<String>) -> Self {
        Self {
            shape: shape.into(),
            fields: IndexMap::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }
}

impl Value {
    pub const fn null() -> Self {
        Self::Null
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn string(src: impl Into<String>) -> Self {
        Self::String(src.into())
    }

    pub fn enum_variant(ty: impl Into<String>, variant: impl Into<String>) -> Self {
        Self::Enum(ValueEnum {
            ty: ty.into(),
            variant: variant.into(),
        })
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            Self::Struct(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Self::Map(v) => Some(v),
            _ => None,
        }
    }

    /// Signed widening view over every integer variant.
    pub fn as_i128(&self) -> Option<i128> {
        Some(match *self {
            Self::I8(v) => v.into(),
            Self::I16(v) => v.into(),
            Self::I32(v) => v.into(),
            Self::I64(v) => v.into(),
            Self::U8(v) => v.into(),
            Self::U16(v) => v.into(),
            Self::U32(v) => v.into(),
            Self::U64(v) => v.into(),
            _ => return None,
        })
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::F32(v) => Some(v.into()),
            Self::F64(v) => Some(v),
            _ => self.as_i128().map(|v| v as f64),
        }
    }

    /// The variant name, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::Bool(_) => "Bool",
            Self::I8(_) => "I8",
            Self::I16(_) => "I16",
            Self::I32(_) => "I32",
            Self::I64(_) => "I64",
            Self::U8(_) => "U8",
            Self::U16(_) => "U16",
            Self::U32(_) => "U32",
            Self::U64(_) => "U64",
            Self::F32(_) => "F32",
            Self::F64(_) => "F64",
            Self::String(_) => "String",
            Self::Bytes(_) => "Bytes",
            Self::Uuid(_) => "Uuid",
            Self::Enum(_) => "Enum",
            Self::List(_) => "List",
            Self::Map(_) => "Map",
            Self::Struct(_) => "Struct",
            Self::Lazy(_) => "Lazy",
        }
    }

    /// Infer the type of a value.
    pub fn infer_ty(&self) -> Type {
        match self {
            Self::Null => Type::Null,
            Self::Bool(_) => Type::Bool,
            Self::I8(_) => Type::I8,
            Self::I16(_) => Type::I16,
            Self::I32(_) => Type::I32,
            Self::I64(_) => Type::I64,
            Self::U8(_) => Type::U8,
            Self::U16(_) => Type::U16,
            Self::U32(_) => Type::U32,
            Self::U64(_) => Type::U64,
            Self::F32(_) => Type::F32,
            Self::F64(_) => Type::F64,
            Self::String(_) => Type::String,
            Self::Bytes(_) => Type::Bytes,
            Self::Uuid(_) => Type::Uuid,
            Self::Enum(v) => Type::Enum(v.ty.clone()),
            Self::List(items) if items.is_empty() => Type::list(Type::Null),
            Self::List(items) => Type::list(items[0].infer_ty()),
            Self::Map(_) => Type::Map,
            Self::Struct(v) => Type::Struct(v.shape.clone()),
            Self::Lazy(v) => match v.peek() {
                Some(resolved) => resolved.infer_ty(),
                None => Type::Any,
            },
        }
    }

    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(v) => v.hash(state),
            Value::I8(v) => v.hash(state),
            Value::I16(v) => v.hash(state),
            Value::I32(v) => v.hash(state),
            Value::I64(v) => v.hash(state),
            Value::U8(v) => v.hash(state),
            Value::U16(v) => v.hash(state),
            Value::U32(v) => v.hash(state),
            Value::U64(v) => v.hash(state),
            Value::F32(v) => v.to_bits().hash(state),
            Value::F64(v) => v.to_bits().hash(state),
            Value::String(v) => v.hash(state),
            Value::Bytes(v) => v.hash(state),
            Value::Uuid(v) => v.hash(state),
            Value::Enum(v) => v.hash(state),
            Value::List(items) => {
                for item in items {
                    item.hash(state);
                }
            }
            Value::Map(entries) => {
                for (k, v) in entries {
                    k.hash(state);
                    v.hash(state);
                }
            }
            Value::Struct(v) => {
                v.shape.hash(state);
                for (k, field) in &v.fields {
                    k.hash(state);
                    field.hash(state);
                }
            }
            Value::Lazy(v) => {
                if let Some(resolved) = v.peek() {
                    resolved.hash(state);
                }
            }
        }
    }
}

impl PartialOrd for Value {
    /// Compares two values of the same type, with numeric widening
    /// across integer and float widths.
    ///
    /// Returns `None` for null values, for types without a natural
    /// ordering, and for comparisons across unrelated types.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => a.partial_cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.partial_cmp(b),
            (Value::Uuid(a), Value::Uuid(b)) => a.partial_cmp(b),
            (a, b) => match (a.as_i128(), b.as_i128()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => match (a.as_f64(), b.as_f64()) {
                    (Some(a), Some(b)) => a.partial_cmp(&b),
                    _ => None,
                },
            },
        }
    }
}

/// Resolves a deferred nested-select value within the owning session.
///
/// Implementations return the full result list as a `Value::List`; the
/// slot shapes it to the declared property.
pub trait LazyLoader {
    fn load(&self, statement: &str, param: &Value) -> Result<Value>;
}

/// A one-shot resolver slot for a deferred nested select.
///
/// The first access through a navigator that carries a loader triggers
/// the sub-select; every later access reads the resolved value. Clones
/// share the slot, so resolving any clone resolves them all.
#[derive(Clone)]
pub struct LazyValue {
    state: Arc<Mutex<LazyState>>,
}

enum LazyState {
    Pending {
        statement: String,
        param: Value,
        many: bool,
    },
    Resolved(Value),
}

impl LazyValue {
    /// `many` is true when the owning property holds a collection.
    pub fn new(statement: impl Into<String>, param: Value, many: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(LazyState::Pending {
                statement: statement.into(),
                param,
                many,
            })),
        }
    }

    /// The resolved value, if the slot has already fired.
    pub fn peek(&self) -> Option<Value> {
        match &*self.state.lock() {
            LazyState::Resolved(value) => Some(value.clone()),
            LazyState::Pending { .. } => None,
        }
    }

    /// Resolves the slot, firing the sub-select on first access.
    pub fn resolve(&self, loader: &dyn LazyLoader) -> Result<Value> {
        let mut state = self.state.lock();
        match &*state {
            LazyState::Resolved(value) => Ok(value.clone()),
            LazyState::Pending {
                statement,
                param,
                many,
            } => {
                let loaded = loader.load(statement, param)?;
                let value = shape_loaded(loaded, *many)?;
                *state = LazyState::Resolved(value.clone());
                Ok(value)
            }
        }
    }
}

/// Shapes a loaded result list to the owning property: collections take
/// the list as-is, scalar properties take the only row.
fn shape_loaded(loaded: Value, many: bool) -> Result<Value> {
    if many {
        return Ok(loaded);
    }
    match loaded {
        Value::List(mut rows) => match rows.len() {
            0 => Ok(Value::Null),
            1 => Ok(rows.remove(0)),
            n => Err(crate::Error::mapping(format!(
                "deferred select returned {n} rows where one was expected"
            ))),
        },
        other => Ok(other),
    }
}

impl fmt::Debug for LazyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.state.lock() {
            LazyState::Resolved(value) => write!(f, "Lazy({value:?})"),
            LazyState::Pending { statement, .. } => write!(f, "Lazy(<pending {statement}>)"),
        }
    }
}

impl PartialEq for LazyValue {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.state, &other.state) {
            return true;
        }
        match (self.peek(), other.peek()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(src: bool) -> Self {
        Self::Bool(src)
    }
}

impl From<String> for Value {
    fn from(src: String) -> Self {
        Self::String(src)
    }
}

impl From<&str> for Value {
    fn from(src: &str) -> Self {
        Self::String(src.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(src: Vec<u8>) -> Self {
        Self::Bytes(src)
    }
}

impl From<uuid::Uuid> for Value {
    fn from(src: uuid::Uuid) -> Self {
        Self::Uuid(src)
    }
}

impl From<StructValue> for Value {
    fn from(src: StructValue) -> Self {
        Self::Struct(src)
    }
}

impl From<Vec<Value>> for Value {
    fn from(src: Vec<Value>) -> Self {
        Self::List(src)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(src: IndexMap<String, Value>) -> Self {
        Self::Map(src)
    }
}

impl<T> From<Option<T>> for Value
where
    Value: From<T>,
{
    fn from(src: Option<T>) -> Self {
        match src {
            Some(value) => Self::from(value),
            None => Self::Null,
        }
    }
}

macro_rules! value_from_numeric {
    ( $( $variant:ident => $ty:ty ),* $(,)? ) => {
        $(
            impl From<$ty> for Value {
                fn from(src: $ty) -> Self {
                    Self::$variant(src)
                }
            }

            impl TryFrom<Value> for $ty {
                type Error = crate::Error;

                fn try_from(value: Value) -> Result<Self, Self::Error> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(crate::Error::type_conversion(&other, stringify!($ty))),
                    }
                }
            }
        )*
    };
}

value_from_numeric! {
    I8 => i8,
    I16 => i16,
    I32 => i32,
    I64 => i64,
    U8 => u8,
    U16 => u16,
    U32 => u32,
    U64 => u64,
    F32 => f32,
    F64 => f64,
}

impl TryFrom<Value> for String {
    type Error = crate::Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(v) => Ok(v),
            other => Err(crate::Error::type_conversion(&other, "String")),
        }
    }
}

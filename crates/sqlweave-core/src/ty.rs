use std::fmt;

/// Application-level type of a [`Value`](crate::Value).
///
/// sqlweave keeps two type systems: `Type` describes values as the
/// application sees them (shape instances, lists, primitives) while
/// [`DbType`] describes the declared database type of a statement
/// parameter or a result column. Codecs convert between the two at the
/// driver boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// The type of `Value::Null` before any better type is known.
    Null,

    Bool,

    I8,
    I16,
    I32,
    I64,

    U8,
    U16,
    U32,
    U64,

    F32,
    F64,

    String,

    Bytes,

    /// 128-bit universally unique identifier.
    Uuid,

    /// An enumerated type registered under the given name.
    Enum(String),

    /// A homogeneous sequence.
    List(Box<Type>),

    /// A string-keyed mapping with untyped values.
    Map,

    /// An instance of the shape registered under the given name.
    Struct(String),

    /// Unknown or opaque; resolved lazily from runtime values.
    Any,
}

impl Type {
    pub fn list(element: Type) -> Self {
        Self::List(Box::new(element))
    }

    pub const fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool)
    }

    pub const fn is_string(&self) -> bool {
        matches!(self, Self::String)
    }

    pub const fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::I8
                | Self::I16
                | Self::I32
                | Self::I64
                | Self::U8
                | Self::U16
                | Self::U32
                | Self::U64
                | Self::F32
                | Self::F64
        )
    }

    /// The declared element type for sequence types.
    pub fn element(&self) -> Option<&Type> {
        match self {
            Self::List(element) => Some(element),
            _ => None,
        }
    }

    /// Parses the primitive and container spellings used in mapping
    /// documents. Names that are not recognized here are shape or enum
    /// names and must be resolved against the registry.
    pub fn parse_primitive(name: &str) -> Option<Type> {
        Some(match name {
            "bool" => Type::Bool,
            "i8" => Type::I8,
            "i16" => Type::I16,
            "i32" => Type::I32,
            "i64" => Type::I64,
            "u8" => Type::U8,
            "u16" => Type::U16,
            "u32" => Type::U32,
            "u64" => Type::U64,
            "f32" => Type::F32,
            "f64" => Type::F64,
            "string" => Type::String,
            "bytes" => Type::Bytes,
            "uuid" => Type::Uuid,
            "map" => Type::Map,
            "any" => Type::Any,
            _ => {
                if let Some(inner) = name
                    .strip_prefix("list<")
                    .and_then(|rest| rest.strip_suffix('>'))
                {
                    Type::list(Type::parse_primitive(inner.trim())?)
                } else if name == "list" {
                    Type::list(Type::Any)
                } else {
                    return None;
                }
            }
        })
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Null => f.write_str("null"),
            Type::Bool => f.write_str("bool"),
            Type::I8 => f.write_str("i8"),
            Type::I16 => f.write_str("i16"),
            Type::I32 => f.write_str("i32"),
            Type::I64 => f.write_str("i64"),
            Type::U8 => f.write_str("u8"),
            Type::U16 => f.write_str("u16"),
            Type::U32 => f.write_str("u32"),
            Type::U64 => f.write_str("u64"),
            Type::F32 => f.write_str("f32"),
            Type::F64 => f.write_str("f64"),
            Type::String => f.write_str("string"),
            Type::Bytes => f.write_str("bytes"),
            Type::Uuid => f.write_str("uuid"),
            Type::Enum(name) => write!(f, "enum {name}"),
            Type::List(element) => write!(f, "list<{element}>"),
            Type::Map => f.write_str("map"),
            Type::Struct(name) => f.write_str(name),
            Type::Any => f.write_str("any"),
        }
    }
}

/// Declared database type of a parameter or a result column.
///
/// The spelling used in mapping documents follows the SQL type names
/// (`VARCHAR`, `BIGINT`, ...), matched case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbType {
    Null,
    Boolean,
    Bit,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Float,
    Double,
    Numeric,
    Decimal,
    Char,
    Varchar,
    LongVarchar,
    Date,
    Time,
    Timestamp,
    Binary,
    VarBinary,
    Blob,
    Clob,
    Array,
    /// A nested row cursor, used for OUT-mode procedure parameters.
    Cursor,
    Other,
}

impl DbType {
    pub fn parse(name: &str) -> Option<DbType> {
        Some(match name.to_ascii_uppercase().as_str() {
            "NULL" => DbType::Null,
            "BOOLEAN" => DbType::Boolean,
            "BIT" => DbType::Bit,
            "TINYINT" => DbType::TinyInt,
            "SMALLINT" => DbType::SmallInt,
            "INTEGER" => DbType::Integer,
            "BIGINT" => DbType::BigInt,
            "REAL" => DbType::Real,
            "FLOAT" => DbType::Float,
            "DOUBLE" => DbType::Double,
            "NUMERIC" => DbType::Numeric,
            "DECIMAL" => DbType::Decimal,
            "CHAR" => DbType::Char,
            "VARCHAR" => DbType::Varchar,
            "LONGVARCHAR" => DbType::LongVarchar,
            "DATE" => DbType::Date,
            "TIME" => DbType::Time,
            "TIMESTAMP" => DbType::Timestamp,
            "BINARY" => DbType::Binary,
            "VARBINARY" => DbType::VarBinary,
            "BLOB" => DbType::Blob,
            "CLOB" => DbType::Clob,
            "ARRAY" => DbType::Array,
            "CURSOR" => DbType::Cursor,
            "OTHER" => DbType::Other,
            _ => return None,
        })
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DbType::Null => "NULL",
            DbType::Boolean => "BOOLEAN",
            DbType::Bit => "BIT",
            DbType::TinyInt => "TINYINT",
            DbType::SmallInt => "SMALLINT",
            DbType::Integer => "INTEGER",
            DbType::BigInt => "BIGINT",
            DbType::Real => "REAL",
            DbType::Float => "FLOAT",
            DbType::Double => "DOUBLE",
            DbType::Numeric => "NUMERIC",
            DbType::Decimal => "DECIMAL",
            DbType::Char => "CHAR",
            DbType::Varchar => "VARCHAR",
            DbType::LongVarchar => "LONGVARCHAR",
            DbType::Date => "DATE",
            DbType::Time => "TIME",
            DbType::Timestamp => "TIMESTAMP",
            DbType::Binary => "BINARY",
            DbType::VarBinary => "VARBINARY",
            DbType::Blob => "BLOB",
            DbType::Clob => "CLOB",
            DbType::Array => "ARRAY",
            DbType::Cursor => "CURSOR",
            DbType::Other => "OTHER",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_primitive_roundtrip() {
        for name in ["bool", "i32", "i64", "f64", "string", "bytes", "uuid", "map"] {
            let ty = Type::parse_primitive(name).unwrap();
            assert_eq!(ty.to_string(), name);
        }
    }

    #[test]
    fn parse_list() {
        assert_eq!(
            Type::parse_primitive("list<i64>"),
            Some(Type::list(Type::I64))
        );
        assert_eq!(Type::parse_primitive("list"), Some(Type::list(Type::Any)));
    }

    #[test]
    fn parse_unknown_is_none() {
        assert_eq!(Type::parse_primitive("Person"), None);
    }

    #[test]
    fn db_type_case_insensitive() {
        assert_eq!(DbType::parse("varchar"), Some(DbType::Varchar));
        assert_eq!(DbType::parse("BiGiNt"), Some(DbType::BigInt));
        assert_eq!(DbType::parse("nope"), None);
    }
}

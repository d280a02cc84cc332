use sqlweave_core::{DbType, Error, Result, Type};

/// Direction of a statement parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParamMode {
    #[default]
    In,
    Out,
    InOut,
}

impl ParamMode {
    pub fn parse(src: &str) -> Result<Self> {
        match src {
            "IN" => Ok(Self::In),
            "OUT" => Ok(Self::Out),
            "INOUT" => Ok(Self::InOut),
            other => Err(Error::config(format!("invalid parameter mode `{other}`"))),
        }
    }

    pub fn is_in(&self) -> bool {
        matches!(self, Self::In | Self::InOut)
    }

    pub fn is_out(&self) -> bool {
        matches!(self, Self::Out | Self::InOut)
    }
}

/// Describes one `?` placeholder of a compiled statement.
///
/// The descriptor list is ordered by placeholder position and is the
/// contract between the SQL text and the parameter binder: the count of
/// `?` marks always equals the list length.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDescriptor {
    /// Property path into the parameter object (or an evaluation-scope
    /// binding carried by the bound SQL).
    pub property: String,

    pub mode: ParamMode,

    /// Application type, resolved at compile time; `Any` until a runtime
    /// value narrows it.
    pub app_ty: Type,

    /// Declared database type, if any.
    pub db_ty: Option<DbType>,

    pub numeric_scale: Option<u32>,

    /// Named codec override (`typeHandler`).
    pub codec: Option<String>,

    /// Result map consumed by OUT-mode cursor parameters.
    pub result_map: Option<String>,

    /// Vendor type name (`jdbcTypeName`).
    pub db_type_name: Option<String>,
}

impl ParameterDescriptor {
    pub fn new(property: impl Into<String>, app_ty: Type) -> Self {
        Self {
            property: property.into(),
            mode: ParamMode::In,
            app_ty,
            db_ty: None,
            numeric_scale: None,
            codec: None,
            result_map: None,
            db_type_name: None,
        }
    }
}

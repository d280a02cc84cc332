use crate::{DbType, Error, Result};

/// Behavior toggles recognized by the configuration document.
///
/// Every option carries the documented default; unknown option names fail
/// bootstrap.
#[derive(Debug, Clone)]
pub struct Settings {
    pub cache_enabled: bool,
    pub lazy_loading_enabled: bool,
    pub aggressive_lazy_loading: bool,
    pub multiple_result_sets_enabled: bool,
    pub use_column_label: bool,
    pub use_generated_keys: bool,
    pub auto_mapping_behavior: AutoMappingBehavior,
    pub auto_mapping_unknown_column_behavior: UnknownColumnBehavior,
    pub default_executor_type: ExecutorType,
    pub default_statement_timeout: Option<u64>,
    pub default_fetch_size: Option<u32>,
    pub map_underscore_to_camel_case: bool,
    pub safe_row_bounds_enabled: bool,
    pub local_cache_scope: LocalCacheScope,
    pub jdbc_type_for_null: DbType,
    pub lazy_load_trigger_methods: Vec<String>,
    pub use_actual_param_name: bool,
    pub return_instance_for_empty_row: bool,
    pub call_setters_on_nulls: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoMappingBehavior {
    None,
    Partial,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownColumnBehavior {
    None,
    Warning,
    Failing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorType {
    Simple,
    Reuse,
    Batch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalCacheScope {
    Session,
    Statement,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            lazy_loading_enabled: false,
            aggressive_lazy_loading: false,
            multiple_result_sets_enabled: true,
            use_column_label: true,
            use_generated_keys: false,
            auto_mapping_behavior: AutoMappingBehavior::Partial,
            auto_mapping_unknown_column_behavior: UnknownColumnBehavior::None,
            default_executor_type: ExecutorType::Simple,
            default_statement_timeout: None,
            default_fetch_size: None,
            map_underscore_to_camel_case: false,
            safe_row_bounds_enabled: false,
            local_cache_scope: LocalCacheScope::Session,
            jdbc_type_for_null: DbType::Other,
            lazy_load_trigger_methods: ["equals", "clone", "hashCode", "toString"]
                .map(String::from)
                .to_vec(),
            use_actual_param_name: true,
            return_instance_for_empty_row: false,
            call_setters_on_nulls: false,
        }
    }
}

impl Settings {
    /// Applies one `<setting name value>` pair from the configuration
    /// document.
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            "cacheEnabled" => self.cache_enabled = parse_bool(name, value)?,
            "lazyLoadingEnabled" => self.lazy_loading_enabled = parse_bool(name, value)?,
            "aggressiveLazyLoading" => self.aggressive_lazy_loading = parse_bool(name, value)?,
            "multipleResultSetsEnabled" => {
                self.multiple_result_sets_enabled = parse_bool(name, value)?
            }
            "useColumnLabel" => self.use_column_label = parse_bool(name, value)?,
            "useGeneratedKeys" => self.use_generated_keys = parse_bool(name, value)?,
            "autoMappingBehavior" => {
                self.auto_mapping_behavior = match value {
                    "NONE" => AutoMappingBehavior::None,
                    "PARTIAL" => AutoMappingBehavior::Partial,
                    "FULL" => AutoMappingBehavior::Full,
                    other => return Err(bad_value(name, other)),
                }
            }
            "autoMappingUnknownColumnBehavior" => {
                self.auto_mapping_unknown_column_behavior = match value {
                    "NONE" => UnknownColumnBehavior::None,
                    "WARNING" => UnknownColumnBehavior::Warning,
                    "FAILING" => UnknownColumnBehavior::Failing,
                    other => return Err(bad_value(name, other)),
                }
            }
            "defaultExecutorType" => {
                self.default_executor_type = match value {
                    "SIMPLE" => ExecutorType::Simple,
                    "REUSE" => ExecutorType::Reuse,
                    "BATCH" => ExecutorType::Batch,
                    other => return Err(bad_value(name, other)),
                }
            }
            "defaultStatementTimeout" => {
                self.default_statement_timeout = Some(parse_num(name, value)?)
            }
            "defaultFetchSize" => self.default_fetch_size = Some(parse_num(name, value)?),
            "mapUnderscoreToCamelCase" => {
                self.map_underscore_to_camel_case = parse_bool(name, value)?
            }
            "safeRowBoundsEnabled" => self.safe_row_bounds_enabled = parse_bool(name, value)?,
            "localCacheScope" => {
                self.local_cache_scope = match value {
                    "SESSION" => LocalCacheScope::Session,
                    "STATEMENT" => LocalCacheScope::Statement,
                    other => return Err(bad_value(name, other)),
                }
            }
            "jdbcTypeForNull" => {
                self.jdbc_type_for_null =
                    DbType::parse(value).ok_or_else(|| bad_value(name, value))?
            }
            "lazyLoadTriggerMethods" => {
                self.lazy_load_trigger_methods =
                    value.split(',').map(|s| s.trim().to_string()).collect()
            }
            "useActualParamName" => self.use_actual_param_name = parse_bool(name, value)?,
            "returnInstanceForEmptyRow" => {
                self.return_instance_for_empty_row = parse_bool(name, value)?
            }
            "callSettersOnNulls" => self.call_setters_on_nulls = parse_bool(name, value)?,
            other => {
                return Err(Error::config(format!("unknown setting `{other}`")));
            }
        }
        Ok(())
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(bad_value(name, other)),
    }
}

fn parse_num<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| bad_value(name, value))
}

fn bad_value(name: &str, value: &str) -> Error {
    Error::config(format!("invalid value `{value}` for setting `{name}`"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documentation() {
        let s = Settings::default();
        assert!(s.cache_enabled);
        assert!(!s.lazy_loading_enabled);
        assert_eq!(s.auto_mapping_behavior, AutoMappingBehavior::Partial);
        assert_eq!(
            s.auto_mapping_unknown_column_behavior,
            UnknownColumnBehavior::None
        );
        assert_eq!(s.local_cache_scope, LocalCacheScope::Session);
        assert_eq!(s.jdbc_type_for_null, DbType::Other);
        assert!(s.use_actual_param_name);
    }

    #[test]
    fn unknown_setting_fails() {
        let mut s = Settings::default();
        let err = s.set("frobnicate", "true").unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn applies_known_settings() {
        let mut s = Settings::default();
        s.set("cacheEnabled", "false").unwrap();
        s.set("localCacheScope", "STATEMENT").unwrap();
        s.set("defaultStatementTimeout", "30").unwrap();
        assert!(!s.cache_enabled);
        assert_eq!(s.local_cache_scope, LocalCacheScope::Statement);
        assert_eq!(s.default_statement_timeout, Some(30));
    }
}

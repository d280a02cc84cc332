use super::fragment::{Fragment, FragmentElement};
use super::result_map::{self, RawResultMap};
use crate::cache::{CacheConfig, Eviction};
use crate::catalog::{qualify, CommandKind, ResultSetType, StatementType};
use sqlweave_core::{Error, Result, ShapeRegistry};

use indexmap::IndexMap;
use std::time::Duration;

/// Pass-1 product of one mapping document.
#[derive(Debug)]
pub struct RawMapper {
    pub namespace: String,
    /// Qualified fragment id → `<sql>` element.
    pub fragments: IndexMap<String, FragmentElement>,
    pub statements: Vec<RawStatement>,
    pub result_maps: Vec<RawResultMap>,
    pub cache: Option<CacheConfig>,
    pub cache_ref: Option<String>,
}

/// A statement skeleton: attributes parsed, body not yet compiled.
#[derive(Debug)]
pub struct RawStatement {
    pub id: String,
    pub kind: CommandKind,
    pub parameter_type: Option<String>,
    pub result_map: Option<String>,
    pub result_type: Option<String>,
    pub flush_cache: Option<bool>,
    pub use_cache: Option<bool>,
    pub timeout: Option<u64>,
    pub fetch_size: Option<u32>,
    pub statement_type: StatementType,
    pub result_set_type: Option<ResultSetType>,
    pub use_generated_keys: Option<bool>,
    pub key_property: Option<String>,
    pub key_column: Option<String>,
    pub database_id: Option<String>,
    pub body: FragmentElement,
}

pub fn parse_mapper(xml: &str, shapes: &ShapeRegistry) -> Result<RawMapper> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|err| Error::config(format!("malformed mapper document: {err}")))?;
    let root = doc.root_element();
    if root.tag_name().name() != "mapper" {
        return Err(Error::config(format!(
            "expected `<mapper>` document root, found `<{}>`",
            root.tag_name().name()
        )));
    }
    let root = match Fragment::from_node(root) {
        Fragment::Element(element) => element,
        Fragment::Text(_) => unreachable!("document root is an element"),
    };
    let namespace = root.required_attr("namespace")?.to_string();

    let mut mapper = RawMapper {
        namespace: namespace.clone(),
        fragments: IndexMap::new(),
        statements: Vec::new(),
        result_maps: Vec::new(),
        cache: None,
        cache_ref: None,
    };

    for element in root.child_elements() {
        match element.name.as_str() {
            "select" => mapper
                .statements
                .push(parse_statement(element, CommandKind::Select)?),
            "insert" => mapper
                .statements
                .push(parse_statement(element, CommandKind::Insert)?),
            "update" => mapper
                .statements
                .push(parse_statement(element, CommandKind::Update)?),
            "delete" => mapper
                .statements
                .push(parse_statement(element, CommandKind::Delete)?),
            "sql" => {
                let id = qualify(&namespace, element.required_attr("id")?);
                if mapper.fragments.insert(id.clone(), element.clone()).is_some() {
                    return Err(Error::config(format!("duplicate sql fragment `{id}`")));
                }
            }
            "resultMap" => {
                result_map::parse_result_map(element, &namespace, shapes, &mut mapper.result_maps)?;
            }
            "cache" => {
                if mapper.cache.is_some() {
                    return Err(Error::config(format!(
                        "namespace `{namespace}` declares more than one `<cache>`"
                    )));
                }
                mapper.cache = Some(parse_cache(element)?);
            }
            "cache-ref" => {
                if mapper.cache_ref.is_some() {
                    return Err(Error::config(format!(
                        "namespace `{namespace}` declares more than one `<cache-ref>`"
                    )));
                }
                mapper.cache_ref = Some(element.required_attr("namespace")?.to_string());
            }
            other => {
                return Err(Error::config(format!(
                    "unexpected element `<{other}>` in mapper `{namespace}`"
                )))
            }
        }
    }

    if mapper.cache.is_some() && mapper.cache_ref.is_some() {
        return Err(Error::config(format!(
            "namespace `{namespace}` declares both `<cache>` and `<cache-ref>`"
        )));
    }

    Ok(mapper)
}

fn parse_statement(element: &FragmentElement, kind: CommandKind) -> Result<RawStatement> {
    let statement_type = match element.attr("statementType") {
        None => StatementType::default(),
        Some("STATEMENT") => StatementType::Statement,
        Some("PREPARED") => StatementType::Prepared,
        Some("CALLABLE") => StatementType::Callable,
        Some(other) => {
            return Err(Error::config(format!("unknown statementType `{other}`")))
        }
    };
    let result_set_type = match element.attr("resultSetType") {
        None => None,
        Some("FORWARD_ONLY") => Some(ResultSetType::ForwardOnly),
        Some("SCROLL_INSENSITIVE") => Some(ResultSetType::ScrollInsensitive),
        Some("SCROLL_SENSITIVE") => Some(ResultSetType::ScrollSensitive),
        Some(other) => {
            return Err(Error::config(format!("unknown resultSetType `{other}`")))
        }
    };

    if element.attr("resultMap").is_some() && element.attr("resultType").is_some() {
        return Err(Error::config(format!(
            "statement `{}` declares both resultMap and resultType",
            element.required_attr("id")?
        )));
    }

    Ok(RawStatement {
        id: element.required_attr("id")?.to_string(),
        kind,
        parameter_type: element.attr("parameterType").map(str::to_string),
        result_map: element.attr("resultMap").map(str::to_string),
        result_type: element.attr("resultType").map(str::to_string),
        flush_cache: element.bool_attr("flushCache")?,
        use_cache: element.bool_attr("useCache")?,
        timeout: element.num_attr("timeout")?,
        fetch_size: element.num_attr("fetchSize")?,
        statement_type,
        result_set_type,
        use_generated_keys: element.bool_attr("useGeneratedKeys")?,
        key_property: element.attr("keyProperty").map(str::to_string),
        key_column: element.attr("keyColumn").map(str::to_string),
        database_id: element.attr("databaseId").map(str::to_string),
        body: element.clone(),
    })
}

fn parse_cache(element: &FragmentElement) -> Result<CacheConfig> {
    if let Some(ty) = element.attr("type") {
        // Pluggable cache implementations are out of scope; only the
        // built-in store is accepted.
        if ty != "PERPETUAL" {
            return Err(Error::config(format!(
                "unsupported cache type `{ty}`; only the built-in store is available"
            )));
        }
    }
    let mut config = CacheConfig::default();
    if let Some(eviction) = element.attr("eviction") {
        config.eviction = Eviction::parse(eviction)
            .ok_or_else(|| Error::config(format!("unknown cache eviction `{eviction}`")))?;
    }
    if let Some(size) = element.num_attr::<usize>("size")? {
        config.size = size;
    }
    if let Some(millis) = element.num_attr::<u64>("flushInterval")? {
        config.flush_interval = Some(Duration::from_millis(millis));
    }
    if let Some(read_only) = element.bool_attr("readOnly")? {
        config.read_only = read_only;
    }
    if let Some(blocking) = element.bool_attr("blocking")? {
        config.blocking = blocking;
    }
    Ok(config)
}

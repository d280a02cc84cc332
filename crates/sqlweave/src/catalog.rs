use crate::cache::SyncCache;
use sqlweave_core::{CodecRegistry, DbType, Error, Result, Settings, ShapeRegistry, Type};
use sqlweave_sql::SqlSource;

use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// SQL command kind of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl CommandKind {
    pub fn is_select(&self) -> bool {
        matches!(self, Self::Select)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatementType {
    Statement,
    #[default]
    Prepared,
    Callable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSetType {
    ForwardOnly,
    ScrollInsensitive,
    ScrollSensitive,
}

/// A fully compiled statement.
#[derive(Debug)]
pub struct MappedStatement {
    /// Qualified name, `namespace.localId`.
    pub name: String,
    pub namespace: String,
    pub kind: CommandKind,
    pub source: SqlSource,
    pub param_ty: Type,
    /// Qualified result map names; non-empty iff the statement is a
    /// SELECT.
    pub result_maps: Vec<String>,
    pub flush_cache: bool,
    pub use_cache: bool,
    pub timeout: Option<u64>,
    pub fetch_size: Option<u32>,
    pub statement_type: StatementType,
    pub result_set_type: Option<ResultSetType>,
    pub use_generated_keys: bool,
    pub key_property: Option<String>,
    pub key_column: Option<String>,
    pub database_id: Option<String>,
    /// Namespace whose shared cache this statement participates in.
    pub cache: Option<String>,
}

/// One entry of a result map.
///
/// Exactly one of {nested select, nested result map, leaf codec} applies;
/// the compiler enforces this.
#[derive(Debug, Clone, Default)]
pub struct ResultMapping {
    pub property: String,
    pub column: Option<String>,
    pub app_ty: Option<Type>,
    pub db_ty: Option<DbType>,
    /// Named codec override.
    pub codec: Option<String>,
    pub id: bool,
    pub constructor: bool,
    /// Qualified statement executed to load this property.
    pub nested_select: Option<String>,
    /// Qualified result map applied to joined columns.
    pub nested_map: Option<String>,
    pub column_prefix: Option<String>,
    pub not_null_columns: Vec<String>,
    pub lazy: Option<bool>,
}

impl ResultMapping {
    pub fn is_nested_map(&self) -> bool {
        self.nested_map.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Discriminator {
    pub column: String,
    pub app_ty: Option<Type>,
    pub db_ty: Option<DbType>,
    pub codec: Option<String>,
    /// Case value → qualified result map.
    pub cases: IndexMap<String, String>,
}

/// A compiled result map, with inheritance already merged.
#[derive(Debug)]
pub struct ResultMap {
    pub name: String,
    pub ty: Type,
    /// Constructor-flagged mappings, applied at instantiation.
    pub constructor: Vec<ResultMapping>,
    /// Ordinary property mappings, id-flagged entries included.
    pub mappings: Vec<ResultMapping>,
    pub discriminator: Option<Discriminator>,
    pub auto_mapping: Option<bool>,
    /// Uppercased column names this map (and its discriminator) mention,
    /// used to split mapped from unmapped row columns.
    pub mapped_columns: HashSet<String>,
}

impl ResultMap {
    pub fn id_mappings(&self) -> impl Iterator<Item = &ResultMapping> {
        // Falls back to every mapping when no id is flagged.
        let flagged: Vec<&ResultMapping> = self.mappings.iter().filter(|m| m.id).collect();
        let all = if flagged.is_empty() {
            self.mappings.iter().collect()
        } else {
            flagged
        };
        all.into_iter()
    }

    pub fn has_nested_maps(&self) -> bool {
        self.mappings.iter().any(ResultMapping::is_nested_map)
    }
}

/// Qualifies a local id against a namespace; ids already containing a dot
/// are absolute.
pub fn qualify(namespace: &str, id: &str) -> String {
    if id.contains('.') {
        id.to_string()
    } else {
        format!("{namespace}.{id}")
    }
}

#[derive(Debug, Clone)]
enum ShortName {
    One(String),
    Ambiguous,
}

/// The process-wide read-only registry produced by the mapping compiler.
///
/// The builder-to-catalog transition is the bootstrap-complete event: a
/// `Catalog` is immutable and safe for concurrent readers.
#[derive(Debug)]
pub struct Catalog {
    pub(crate) statements: IndexMap<String, Arc<MappedStatement>>,
    pub(crate) result_maps: IndexMap<String, Arc<ResultMap>>,
    pub(crate) caches: IndexMap<String, Arc<SyncCache>>,
    short_statements: HashMap<String, ShortName>,
    short_result_maps: HashMap<String, ShortName>,
    pub settings: Settings,
    pub shapes: Arc<ShapeRegistry>,
    pub codecs: Arc<CodecRegistry>,
    /// Configured environment id; part of every cache key.
    pub environment: String,
    pub database_id: Option<String>,
}

impl Catalog {
    pub(crate) fn assemble(
        statements: IndexMap<String, Arc<MappedStatement>>,
        result_maps: IndexMap<String, Arc<ResultMap>>,
        caches: IndexMap<String, Arc<SyncCache>>,
        settings: Settings,
        shapes: Arc<ShapeRegistry>,
        codecs: Arc<CodecRegistry>,
        environment: String,
        database_id: Option<String>,
    ) -> Self {
        Self {
            short_statements: short_names(statements.keys()),
            short_result_maps: short_names(result_maps.keys()),
            statements,
            result_maps,
            caches,
            settings,
            shapes,
            codecs,
            environment,
            database_id,
        }
    }

    pub fn statement(&self, name: &str) -> Result<Arc<MappedStatement>> {
        lookup(&self.statements, &self.short_statements, name, "statement")
    }

    pub fn result_map(&self, name: &str) -> Result<Arc<ResultMap>> {
        lookup(&self.result_maps, &self.short_result_maps, name, "result map")
    }

    /// The shared cache of a namespace, when one is declared.
    pub fn cache(&self, namespace: &str) -> Option<&Arc<SyncCache>> {
        self.caches.get(namespace)
    }

    pub fn statements(&self) -> impl Iterator<Item = &Arc<MappedStatement>> {
        self.statements.values()
    }
}

fn short_names<'a>(names: impl Iterator<Item = &'a String>) -> HashMap<String, ShortName> {
    let mut shorts: HashMap<String, ShortName> = HashMap::new();
    for name in names {
        if let Some((_, short)) = name.rsplit_once('.') {
            shorts
                .entry(short.to_string())
                .and_modify(|entry| *entry = ShortName::Ambiguous)
                .or_insert_with(|| ShortName::One(name.clone()));
        }
    }
    shorts
}

fn lookup<T: Clone>(
    full: &IndexMap<String, T>,
    shorts: &HashMap<String, ShortName>,
    name: &str,
    what: &str,
) -> Result<T> {
    if name.contains('.') {
        return full
            .get(name)
            .cloned()
            .ok_or_else(|| Error::binding(format!("unknown {what} `{name}`")));
    }
    match shorts.get(name) {
        Some(ShortName::One(qualified)) => Ok(full[qualified].clone()),
        Some(ShortName::Ambiguous) => Err(Error::binding(format!(
            "{what} name `{name}` is ambiguous; use the qualified name"
        ))),
        None => Err(Error::binding(format!("unknown {what} `{name}`"))),
    }
}

//! The mapping compiler: parses mapping and configuration documents,
//! resolves cross-references in a fixed-point pass, and freezes the
//! catalog.
//!
//! Pass 1 ([`CatalogBuilder::mapper_xml`]) registers namespaces,
//! fragments, and skeletons per document; pass 2
//! ([`CatalogBuilder::build`]) resolves includes, result-map inheritance,
//! and cache references across all documents, then compiles statement
//! bodies.

mod config;

mod fragment;
pub use fragment::{Fragment, FragmentElement};

mod include;

mod mapper;
use mapper::{RawMapper, RawStatement};

mod result_map;
use result_map::RawResultMap;

mod script;

use crate::cache::{build_cache, SyncCache};
use crate::catalog::{qualify, Catalog, CommandKind, MappedStatement, ResultMap, ResultMapping};
use sqlweave_core::{
    Codec, CodecRegistry, Error, Result, Settings, Shape, ShapeRegistry, Type,
};

use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Accumulates mapping documents and registrations, then compiles them
/// into an immutable [`Catalog`]. The builder-to-catalog transition is
/// the bootstrap-complete event.
#[derive(Debug)]
pub struct CatalogBuilder {
    settings: Settings,
    shapes: Arc<ShapeRegistry>,
    codecs: CodecRegistry,
    environment: String,
    database_id: Option<String>,
    mappers: Vec<RawMapper>,
    namespaces: HashSet<String>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self {
            settings: Settings::default(),
            shapes: Arc::new(ShapeRegistry::new()),
            codecs: CodecRegistry::new(),
            environment: "default".to_string(),
            database_id: None,
            mappers: Vec::new(),
            namespaces: HashSet::new(),
        }
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn shapes(&self) -> &Arc<ShapeRegistry> {
        &self.shapes
    }

    /// Registers an application shape. Shapes and enums must be
    /// registered before the mapping documents that reference them.
    pub fn register_shape(&mut self, shape: Shape) -> &mut Self {
        self.shapes.register(shape);
        self
    }

    pub fn register_enum<I, S>(&mut self, name: impl Into<String>, variants: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shapes.register_enum(name, variants);
        self
    }

    pub fn register_codec(&mut self, name: impl Into<String>, codec: Arc<dyn Codec>) -> &mut Self {
        self.codecs.register_named(name, codec);
        self
    }

    pub fn codecs_mut(&mut self) -> &mut CodecRegistry {
        &mut self.codecs
    }

    pub fn environment(&mut self, id: impl Into<String>) -> &mut Self {
        self.environment = id.into();
        self
    }

    pub fn database_id(&mut self, id: impl Into<String>) -> &mut Self {
        self.database_id = Some(id.into());
        self
    }

    /// Applies a `<configuration>` document: settings, environment, and
    /// referenced mapper resources.
    pub fn configuration_xml(&mut self, xml: &str) -> Result<&mut Self> {
        config::apply(self, xml)?;
        Ok(self)
    }

    /// Pass 1 for one mapping document: registers its namespace,
    /// fragments, and skeletons. Cross-file references stay pending until
    /// [`build`](Self::build).
    pub fn mapper_xml(&mut self, xml: &str) -> Result<&mut Self> {
        let mapper = mapper::parse_mapper(xml, &self.shapes)?;
        if !self.namespaces.insert(mapper.namespace.clone()) {
            return Err(Error::config(format!(
                "duplicate mapper namespace `{}`",
                mapper.namespace
            )));
        }
        debug!(
            namespace = %mapper.namespace,
            statements = mapper.statements.len(),
            "registered mapper"
        );
        self.mappers.push(mapper);
        Ok(self)
    }

    /// Pass 2: resolves includes, inheritance, and cache references, then
    /// compiles every statement and freezes the catalog.
    pub fn build(self) -> Result<Catalog> {
        let fragments = self.collect_fragments()?;
        let caches = self.resolve_caches()?;
        let result_maps = self.resolve_result_maps()?;
        let (statements, result_maps) =
            self.compile_statements(&fragments, &caches, &result_maps)?;
        self.verify_references(&statements, &result_maps)?;

        debug!(
            statements = statements.len(),
            result_maps = result_maps.len(),
            caches = caches.len(),
            "catalog compiled"
        );

        Ok(Catalog::assemble(
            statements,
            result_maps,
            caches,
            self.settings,
            self.shapes,
            Arc::new(self.codecs),
            self.environment,
            self.database_id,
        ))
    }

    fn collect_fragments(&self) -> Result<IndexMap<String, FragmentElement>> {
        let mut fragments = IndexMap::new();
        for mapper in &self.mappers {
            for (name, fragment) in &mapper.fragments {
                if fragments.insert(name.clone(), fragment.clone()).is_some() {
                    return Err(Error::config(format!("duplicate sql fragment `{name}`")));
                }
            }
        }
        Ok(fragments)
    }

    /// Builds declared caches, then resolves `<cache-ref>` namespaces in
    /// a fixed-point loop: each round either resolves at least one
    /// pending reference or reports the remainder as incomplete.
    fn resolve_caches(&self) -> Result<IndexMap<String, Arc<SyncCache>>> {
        let mut caches: IndexMap<String, Arc<SyncCache>> = IndexMap::new();
        for mapper in &self.mappers {
            if let Some(config) = &mapper.cache {
                caches.insert(
                    mapper.namespace.clone(),
                    build_cache(mapper.namespace.clone(), config),
                );
            }
        }

        let mut pending: Vec<(&str, &str)> = self
            .mappers
            .iter()
            .filter_map(|m| {
                m.cache_ref
                    .as_deref()
                    .map(|target| (m.namespace.as_str(), target))
            })
            .collect();

        while !pending.is_empty() {
            let before = pending.len();
            pending.retain(|(namespace, target)| match caches.get(*target).cloned() {
                Some(cache) => {
                    caches.insert(namespace.to_string(), cache);
                    false
                }
                None => true,
            });
            if pending.len() == before {
                let missing: Vec<String> = pending
                    .iter()
                    .map(|(ns, target)| format!("`{ns}` -> `{target}`"))
                    .collect();
                return Err(Error::incomplete_element(format!(
                    "unresolved cache references after fixed point: {}",
                    missing.join(", ")
                )));
            }
        }

        Ok(caches)
    }

    fn resolve_result_maps(&self) -> Result<IndexMap<String, Arc<ResultMap>>> {
        let mut raw: IndexMap<String, &RawResultMap> = IndexMap::new();
        for mapper in &self.mappers {
            for map in &mapper.result_maps {
                if raw.insert(map.id.clone(), map).is_some() {
                    return Err(Error::config(format!("duplicate result map `{}`", map.id)));
                }
            }
        }

        let mut resolved: IndexMap<String, Arc<ResultMap>> = IndexMap::new();
        for name in raw.keys().cloned().collect::<Vec<_>>() {
            let mut stack = Vec::new();
            result_map::resolve(&name, &raw, &mut resolved, &mut stack)?;
        }
        Ok(resolved)
    }

    fn compile_statements(
        &self,
        fragments: &IndexMap<String, FragmentElement>,
        caches: &IndexMap<String, Arc<SyncCache>>,
        result_maps: &IndexMap<String, Arc<ResultMap>>,
    ) -> Result<(
        IndexMap<String, Arc<MappedStatement>>,
        IndexMap<String, Arc<ResultMap>>,
    )> {
        let mut result_maps = result_maps.clone();
        let mut statements: IndexMap<String, Arc<MappedStatement>> = IndexMap::new();
        let mut specific: HashSet<String> = HashSet::new();

        for mapper in &self.mappers {
            for statement in &mapper.statements {
                let name = qualify(&mapper.namespace, &statement.id);

                // Dialect selection by catalog key: a statement tagged for
                // another databaseId is discarded; a matching tag shadows
                // the untagged statement.
                match (&statement.database_id, &self.database_id) {
                    (Some(tag), Some(configured)) if tag != configured => continue,
                    (Some(_), None) => continue,
                    _ => {}
                }
                let tagged = statement.database_id.is_some();
                if statements.contains_key(&name) {
                    if specific.contains(&name) {
                        if tagged {
                            return Err(Error::config(format!(
                                "duplicate statement `{name}` for databaseId"
                            )));
                        }
                        continue;
                    } else if !tagged {
                        return Err(Error::config(format!("duplicate statement `{name}`")));
                    }
                }
                if tagged {
                    specific.insert(name.clone());
                }

                let compiled = self.compile_statement(
                    mapper,
                    statement,
                    name.clone(),
                    fragments,
                    caches,
                    &mut result_maps,
                )?;
                statements.insert(name, Arc::new(compiled));
            }
        }

        Ok((statements, result_maps))
    }

    fn compile_statement(
        &self,
        mapper: &RawMapper,
        statement: &RawStatement,
        name: String,
        fragments: &IndexMap<String, FragmentElement>,
        caches: &IndexMap<String, Arc<SyncCache>>,
        result_maps: &mut IndexMap<String, Arc<ResultMap>>,
    ) -> Result<MappedStatement> {
        let body = include::resolve_includes(&statement.body, fragments, &mapper.namespace)?;

        let param_ty = statement
            .parameter_type
            .as_deref()
            .map(|n| self.shapes.resolve_type(n))
            .unwrap_or(Type::Any);

        let source = script::build_sql_source(&body, &param_ty, &self.shapes).map_err(|err| {
            err.context(Error::config(format!("in statement `{name}`")))
        })?;

        let mut maps: Vec<String> = statement
            .result_map
            .as_deref()
            .map(|list| {
                list.split(',')
                    .map(|id| qualify(&mapper.namespace, id.trim()))
                    .collect()
            })
            .unwrap_or_default();

        // `resultType` synthesizes an empty map driven purely by
        // auto-mapping.
        if let Some(ty_name) = &statement.result_type {
            let inline = format!("{name}-Inline");
            let ty = self.shapes.resolve_type(ty_name);
            result_maps.insert(
                inline.clone(),
                Arc::new(ResultMap {
                    name: inline.clone(),
                    ty,
                    constructor: Vec::new(),
                    mappings: Vec::new(),
                    discriminator: None,
                    auto_mapping: None,
                    mapped_columns: HashSet::new(),
                }),
            );
            maps.push(inline);
        }

        let is_select = statement.kind.is_select();
        if is_select && maps.is_empty() {
            return Err(Error::config(format!(
                "select `{name}` declares neither resultMap nor resultType"
            )));
        }
        if !is_select && !maps.is_empty() {
            return Err(Error::config(format!(
                "non-select `{name}` must not declare a result map"
            )));
        }

        Ok(MappedStatement {
            namespace: mapper.namespace.clone(),
            kind: statement.kind,
            source,
            param_ty,
            result_maps: maps,
            flush_cache: statement.flush_cache.unwrap_or(!is_select),
            use_cache: statement.use_cache.unwrap_or(is_select),
            timeout: statement.timeout.or(self.settings.default_statement_timeout),
            fetch_size: statement.fetch_size.or(self.settings.default_fetch_size),
            statement_type: statement.statement_type,
            result_set_type: statement.result_set_type,
            use_generated_keys: statement
                .use_generated_keys
                .unwrap_or(self.settings.use_generated_keys && statement.kind == CommandKind::Insert),
            key_property: statement.key_property.clone(),
            key_column: statement.key_column.clone(),
            database_id: statement.database_id.clone(),
            cache: caches.contains_key(&mapper.namespace).then(|| mapper.namespace.clone()),
            name,
        })
    }

    /// Verifies every reference the compiled entities carry: statement →
    /// result map, discriminator case → result map, nested mapping →
    /// result map or statement.
    fn verify_references(
        &self,
        statements: &IndexMap<String, Arc<MappedStatement>>,
        result_maps: &IndexMap<String, Arc<ResultMap>>,
    ) -> Result<()> {
        let mut missing: Vec<String> = Vec::new();

        for statement in statements.values() {
            for map in &statement.result_maps {
                if !result_maps.contains_key(map) {
                    missing.push(format!(
                        "result map `{map}` referenced by statement `{}`",
                        statement.name
                    ));
                }
            }
        }
        for map in result_maps.values() {
            for mapping in map.mappings.iter().chain(map.constructor.iter()) {
                if let Some(nested) = &mapping.nested_map {
                    if !result_maps.contains_key(nested) {
                        missing.push(format!(
                            "result map `{nested}` referenced by `{}`",
                            map.name
                        ));
                    }
                }
                if let Some(select) = &mapping.nested_select {
                    if !statements.contains_key(select) {
                        missing.push(format!(
                            "statement `{select}` referenced by `{}`",
                            map.name
                        ));
                    }
                }
            }
            if let Some(discriminator) = &map.discriminator {
                for case_map in discriminator.cases.values() {
                    if !result_maps.contains_key(case_map) {
                        missing.push(format!(
                            "result map `{case_map}` referenced by discriminator of `{}`",
                            map.name
                        ));
                    }
                }
            }
        }

        if !missing.is_empty() {
            return Err(Error::incomplete_element(missing.join("; ")));
        }
        Ok(())
    }
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Validates the one-of invariant on a parsed mapping.
pub(crate) fn verify_mapping_arms(mapping: &ResultMapping, map_id: &str) -> Result<()> {
    let arms = [
        mapping.nested_select.is_some(),
        mapping.nested_map.is_some(),
    ];
    if arms.iter().filter(|set| **set).count() > 1 {
        return Err(Error::config(format!(
            "mapping for property `{}` of `{map_id}` declares both a nested select and a nested result map",
            mapping.property
        )));
    }
    Ok(())
}

use crate::catalog::ResultMap;

use std::collections::{HashMap, HashSet};

/// Per-result-set column analysis.
///
/// For each (result map, column prefix) pair this computes which row
/// columns the map mentions and which are left for auto-mapping; the
/// split is cached for the life of the result set.
pub struct ResultSetMeta {
    columns: Vec<String>,
    upper: HashSet<String>,
    unmapped_cache: HashMap<(String, Option<String>), Vec<UnmappedColumn>>,
}

/// A row column no mapping mentions, with the prefix already stripped
/// from the probe name.
#[derive(Debug, Clone)]
pub struct UnmappedColumn {
    /// Column label as it appears in the row.
    pub column: String,
    /// The name used to probe target properties.
    pub probe: String,
}

impl ResultSetMeta {
    pub fn new(columns: Vec<String>) -> Self {
        let upper = columns.iter().map(|c| c.to_ascii_uppercase()).collect();
        Self {
            columns,
            upper,
            unmapped_cache: HashMap::new(),
        }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.upper.contains(&name.to_ascii_uppercase())
    }

    /// Columns present in the row but not mentioned by the map. With a
    /// column prefix, only columns carrying the prefix participate.
    pub fn unmapped(&mut self, map: &ResultMap, prefix: Option<&str>) -> &[UnmappedColumn] {
        let key = (map.name.clone(), prefix.map(str::to_string));
        if !self.unmapped_cache.contains_key(&key) {
            let mut unmapped = Vec::new();
            for column in &self.columns {
                let effective = match prefix {
                    None => Some(column.as_str()),
                    Some(prefix) => strip_prefix_ignore_case(column, prefix),
                };
                let Some(effective) = effective else {
                    continue;
                };
                if !map.mapped_columns.contains(&effective.to_ascii_uppercase()) {
                    unmapped.push(UnmappedColumn {
                        column: column.clone(),
                        probe: effective.to_string(),
                    });
                }
            }
            self.unmapped_cache.insert(key.clone(), unmapped);
        }
        &self.unmapped_cache[&key]
    }
}

fn strip_prefix_ignore_case<'a>(column: &'a str, prefix: &str) -> Option<&'a str> {
    if column.len() >= prefix.len()
        && column[..prefix.len()].eq_ignore_ascii_case(prefix)
    {
        Some(&column[prefix.len()..])
    } else {
        None
    }
}

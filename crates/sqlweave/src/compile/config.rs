use super::{CatalogBuilder, Fragment};
use sqlweave_core::{Error, Result};

use std::fs;

/// Applies a `<configuration>` document to the builder: settings (unknown
/// names are fatal), the environment id, and `<mappers>` resources.
pub(super) fn apply(builder: &mut CatalogBuilder, xml: &str) -> Result<()> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|err| Error::config(format!("malformed configuration document: {err}")))?;
    let root = doc.root_element();
    if root.tag_name().name() != "configuration" {
        return Err(Error::config(format!(
            "expected `<configuration>` document root, found `<{}>`",
            root.tag_name().name()
        )));
    }
    let root = match Fragment::from_node(root) {
        Fragment::Element(element) => element,
        Fragment::Text(_) => unreachable!("document root is an element"),
    };

    let mut mapper_resources = Vec::new();

    for element in root.child_elements() {
        match element.name.as_str() {
            "settings" => {
                for setting in element.child_elements() {
                    if setting.name != "setting" {
                        return Err(Error::config(format!(
                            "unexpected `<{}>` inside `<settings>`",
                            setting.name
                        )));
                    }
                    let name = setting.required_attr("name")?;
                    let value = setting.required_attr("value")?;
                    builder.settings.set(name, value)?;
                }
            }
            "environments" => {
                // Transaction and datasource management are external
                // collaborators; only the environment id participates in
                // cache keys.
                if let Some(default) = element.attr("default") {
                    builder.environment = default.to_string();
                }
            }
            "mappers" => {
                for mapper in element.child_elements() {
                    if mapper.name != "mapper" {
                        return Err(Error::config(format!(
                            "unexpected `<{}>` inside `<mappers>`",
                            mapper.name
                        )));
                    }
                    mapper_resources.push(mapper.required_attr("resource")?.to_string());
                }
            }
            other => {
                return Err(Error::config(format!(
                    "unknown configuration element `<{other}>`"
                )))
            }
        }
    }

    for resource in mapper_resources {
        let xml = fs::read_to_string(&resource).map_err(|err| {
            Error::config(format!("cannot read mapper resource `{resource}`: {err}"))
        })?;
        builder.mapper_xml(&xml)?;
    }

    Ok(())
}

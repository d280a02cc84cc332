use sqlweave_core::{Error, Result};

use indexmap::IndexMap;

/// An owned XML subtree lifted out of the parsed document.
///
/// roxmltree nodes borrow the source string, so statement bodies and
/// `<sql>` fragments are lifted into this owned form before the source
/// document is dropped; include resolution and script building operate on
/// it.
#[derive(Debug, Clone)]
pub enum Fragment {
    Element(FragmentElement),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct FragmentElement {
    pub name: String,
    pub attrs: IndexMap<String, String>,
    pub children: Vec<Fragment>,
}

impl Fragment {
    /// Lifts an element node and its subtree.
    pub fn from_node(node: roxmltree::Node<'_, '_>) -> Fragment {
        debug_assert!(node.is_element());
        let attrs = node
            .attributes()
            .map(|attr| (attr.name().to_string(), attr.value().to_string()))
            .collect();
        let children = node
            .children()
            .filter_map(|child| {
                if child.is_element() {
                    Some(Fragment::from_node(child))
                } else if child.is_text() {
                    child.text().map(|text| Fragment::Text(text.to_string()))
                } else {
                    None
                }
            })
            .collect();
        Fragment::Element(FragmentElement {
            name: node.tag_name().name().to_string(),
            attrs,
            children,
        })
    }

    pub fn as_element(&self) -> Option<&FragmentElement> {
        match self {
            Fragment::Element(element) => Some(element),
            Fragment::Text(_) => None,
        }
    }
}

impl FragmentElement {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn required_attr(&self, name: &str) -> Result<&str> {
        self.attr(name).ok_or_else(|| {
            Error::config(format!(
                "element `<{}>` is missing required attribute `{name}`",
                self.name
            ))
        })
    }

    pub fn bool_attr(&self, name: &str) -> Result<Option<bool>> {
        match self.attr(name) {
            None => Ok(None),
            Some("true") => Ok(Some(true)),
            Some("false") => Ok(Some(false)),
            Some(other) => Err(Error::config(format!(
                "attribute `{name}` of `<{}>` must be true or false, found `{other}`",
                self.name
            ))),
        }
    }

    pub fn num_attr<T: std::str::FromStr>(&self, name: &str) -> Result<Option<T>> {
        match self.attr(name) {
            None => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(|_| {
                Error::config(format!(
                    "attribute `{name}` of `<{}>` is not a valid number: `{raw}`",
                    self.name
                ))
            }),
        }
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &FragmentElement> {
        self.children.iter().filter_map(Fragment::as_element)
    }
}

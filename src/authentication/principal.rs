use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Multi-valued attributes keyed by name.
pub type Attributes = BTreeMap<String, Vec<String>>;

/// Id used when no handler or resolver could name the principal.
pub const NULL_PRINCIPAL_ID: &str = "UNKNOWN";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    id: String,
    #[serde(default)]
    attributes: Attributes,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn with_attributes(id: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            id: id.into(),
            attributes,
        }
    }

    #[must_use]
    pub fn null() -> Self {
        Self::new(NULL_PRINCIPAL_ID)
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&[String]> {
        self.attributes.get(name).map(Vec::as_slice)
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.id == NULL_PRINCIPAL_ID
    }
}

/// Merge `source` into `target`, appending values that are not present yet.
pub(crate) fn merge_attributes(target: &mut Attributes, source: &Attributes) {
    for (name, values) in source {
        let current = target.entry(name.clone()).or_default();
        for value in values {
            if !current.contains(value) {
                current.push(value.clone());
            }
        }
    }
}

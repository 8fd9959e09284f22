use serde::{Deserialize, Serialize};

/// One field of a search collection's schema. Compared field-by-field
/// (sorted by `name`) against what the remote index reports, since the
/// index's own schema response may reorder fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub facet: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    pub fields: Vec<FieldSchema>,
    pub default_sorting_field: String,
}

impl CollectionSchema {
    /// Whether `self` and `remote` describe the same fields, ignoring
    /// declaration order.
    pub fn matches(&self, remote: &CollectionSchema) -> bool {
        let mut ours = self.fields.clone();
        let mut theirs = remote.fields.clone();
        ours.sort_by(|a, b| a.name.cmp(&b.name));
        theirs.sort_by(|a, b| a.name.cmp(&b.name));
        ours == theirs && self.default_sorting_field == remote.default_sorting_field
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str) -> FieldSchema {
        FieldSchema {
            name: name.to_string(),
            field_type: "string".to_string(),
            optional: false,
            facet: false,
        }
    }

    #[test]
    fn matches_ignores_field_order() {
        let a = CollectionSchema {
            name: "movies".to_string(),
            fields: vec![field("title"), field("id")],
            default_sorting_field: "popularity".to_string(),
        };
        let b = CollectionSchema {
            name: "movies".to_string(),
            fields: vec![field("id"), field("title")],
            default_sorting_field: "popularity".to_string(),
        };
        assert!(a.matches(&b));
    }

    #[test]
    fn matches_detects_a_dropped_field() {
        let a = CollectionSchema {
            name: "movies".to_string(),
            fields: vec![field("title"), field("id")],
            default_sorting_field: "popularity".to_string(),
        };
        let b = CollectionSchema {
            name: "movies".to_string(),
            fields: vec![field("id")],
            default_sorting_field: "popularity".to_string(),
        };
        assert!(!a.matches(&b));
    }
}

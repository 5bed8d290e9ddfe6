//! Index model and DDL emission.

use serde::{Deserialize, Serialize};

/// One key part of an index: a column reference by name, direction, and an
/// optional prefix length (mandatory for BLOB/TEXT keys).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexColumn {
    pub column: String,
    #[serde(default)]
    pub desc: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<u32>,
}

/// A secondary index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    #[serde(default)]
    pub unique: bool,
    pub columns: Vec<IndexColumn>,
}

impl Index {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unique: false,
            columns: Vec::new(),
        }
    }

    /// The index definition as used inside CREATE TABLE and ALTER TABLE ADD.
    pub fn definition(&self) -> String {
        let mut def = String::new();
        if self.unique {
            def.push_str("UNIQUE ");
        }
        def.push_str("INDEX ");
        def.push_str(&self.name);
        def.push('(');
        for (i, key) in self.columns.iter().enumerate() {
            if i > 0 {
                def.push_str(", ");
            }
            def.push_str(&key.column);
            if let Some(prefix) = key.prefix {
                def.push_str(&format!("({prefix})"));
            }
            if key.desc {
                def.push_str(" DESC");
            }
        }
        def.push(')');
        def
    }

    /// Returns `true` if the index references the given column.
    pub fn references(&self, column: &str) -> bool {
        self.columns.iter().any(|key| key.column == column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn definition_with_desc_and_prefix() {
        let index = Index {
            name: "tt_1i0".to_string(),
            unique: true,
            columns: vec![
                IndexColumn {
                    column: "ipkey".to_string(),
                    desc: false,
                    prefix: None,
                },
                IndexColumn {
                    column: "b4".to_string(),
                    desc: true,
                    prefix: Some(12),
                },
            ],
        };
        assert_eq!(index.definition(), "UNIQUE INDEX tt_1i0(ipkey, b4(12) DESC)");
    }

    #[test]
    fn references_by_name() {
        let mut index = Index::new("i");
        index.columns.push(IndexColumn {
            column: "v1".to_string(),
            desc: false,
            prefix: None,
        });
        assert!(index.references("v1"));
        assert!(!index.references("v2"));
    }

    #[test]
    fn serde_roundtrip() {
        let index = Index {
            name: "idx".to_string(),
            unique: false,
            columns: vec![IndexColumn {
                column: "c1".to_string(),
                desc: true,
                prefix: Some(3),
            }],
        };
        let json = serde_json::to_string(&index).unwrap();
        let back: Index = serde_json::from_str(&json).unwrap();
        assert_eq!(back, index);
    }
}

//! Column model: the type tag, the column record, and its DDL emission.

use serde::{Deserialize, Serialize};
use std::fmt;

/// SQL type of a column. `Generated` columns carry their resulting type in
/// [`Column::generated_tag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TypeTag {
    Int,
    /// Small integers; used as the LIST partition domain.
    Integer,
    Float,
    Double,
    Char,
    Varchar,
    Text,
    Blob,
    Bit,
    Bool,
    Date,
    #[serde(rename = "DATETIME")]
    DateTime,
    Timestamp,
    Generated,
}

impl TypeTag {
    /// The SQL keyword for this type.
    pub fn as_str(self) -> &'static str {
        match self {
            TypeTag::Int => "INT",
            TypeTag::Integer => "INTEGER",
            TypeTag::Float => "FLOAT",
            TypeTag::Double => "DOUBLE",
            TypeTag::Char => "CHAR",
            TypeTag::Varchar => "VARCHAR",
            TypeTag::Text => "TEXT",
            TypeTag::Blob => "BLOB",
            TypeTag::Bit => "BIT",
            TypeTag::Bool => "BOOL",
            TypeTag::Date => "DATE",
            TypeTag::DateTime => "DATETIME",
            TypeTag::Timestamp => "TIMESTAMP",
            TypeTag::Generated => "GENERATED",
        }
    }

    /// Parses the SQL keyword form.
    pub fn parse(text: &str) -> Option<TypeTag> {
        Some(match text {
            "INT" => TypeTag::Int,
            "INTEGER" => TypeTag::Integer,
            "FLOAT" => TypeTag::Float,
            "DOUBLE" => TypeTag::Double,
            "CHAR" => TypeTag::Char,
            "VARCHAR" => TypeTag::Varchar,
            "TEXT" => TypeTag::Text,
            "BLOB" => TypeTag::Blob,
            "BIT" => TypeTag::Bit,
            "BOOL" => TypeTag::Bool,
            "DATE" => TypeTag::Date,
            "DATETIME" => TypeTag::DateTime,
            "TIMESTAMP" => TypeTag::Timestamp,
            "GENERATED" => TypeTag::Generated,
            _ => return None,
        })
    }

    /// Returns `true` for BLOB and TEXT.
    pub fn is_lob(self) -> bool {
        matches!(self, TypeTag::Blob | TypeTag::Text)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One column of a table.
///
/// `sub_type` holds the TINY/MEDIUM/LONG variant keyword for BLOB and TEXT
/// columns; `generated_expr` and `generated_tag` hold the expression clause
/// and the resulting type for generated columns. The struct is the
/// checkpoint form of a column as well, so every attribute that influences
/// emission must round-trip through serde.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub tag: TypeTag,
    #[serde(default)]
    pub length: i64,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub compressed: bool,
    #[serde(default)]
    pub not_secondary: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_expr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_tag: Option<TypeTag>,
}

fn default_true() -> bool {
    true
}

impl Column {
    /// A plain column with everything off.
    pub fn plain(name: impl Into<String>, tag: TypeTag) -> Self {
        Self {
            name: name.into(),
            tag,
            length: 0,
            nullable: true,
            primary_key: false,
            auto_increment: false,
            compressed: false,
            not_secondary: false,
            sub_type: None,
            generated_expr: None,
            generated_tag: None,
        }
    }

    /// The type this column's values have; resolves generated columns to
    /// their resulting type.
    pub fn value_tag(&self) -> TypeTag {
        match self.tag {
            TypeTag::Generated => self.generated_tag.unwrap_or(TypeTag::Int),
            tag => tag,
        }
    }

    /// Returns `true` if values compare as strings (quoted literals).
    pub fn is_string_like(&self) -> bool {
        matches!(
            self.value_tag(),
            TypeTag::Char | TypeTag::Varchar | TypeTag::Text
        )
    }

    /// Returns `true` for integer-valued columns.
    pub fn is_numeric(&self) -> bool {
        matches!(self.value_tag(), TypeTag::Int | TypeTag::Integer)
    }

    /// Returns `true` if the column type supports ordered comparison in a
    /// WHERE clause without excessive false matches.
    pub fn is_comparable(&self) -> bool {
        !matches!(self.value_tag(), TypeTag::Bool | TypeTag::Bit)
    }

    /// The type clause: `INT(11)`, `MEDIUMBLOB`, or the generated expression.
    fn clause(&self) -> String {
        match self.tag {
            TypeTag::Blob | TypeTag::Text => self
                .sub_type
                .clone()
                .unwrap_or_else(|| self.tag.as_str().to_string()),
            TypeTag::Generated => self.generated_expr.clone().unwrap_or_default(),
            tag => {
                if self.length > 0 {
                    format!("{}({})", tag.as_str(), self.length)
                } else {
                    tag.as_str().to_string()
                }
            }
        }
    }

    /// The full column definition as used in CREATE TABLE and ALTER TABLE.
    pub fn definition(&self) -> String {
        let mut def = format!("{} {}", self.name, self.clause());
        if !self.nullable {
            def.push_str(" NOT NULL");
        }
        if self.auto_increment {
            def.push_str(" AUTO_INCREMENT");
        }
        if self.compressed {
            def.push_str(" COLUMN_FORMAT COMPRESSED");
        }
        if self.not_secondary {
            def.push_str(" NOT SECONDARY");
        }
        def
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_definition() {
        let mut col = Column::plain("ipkey", TypeTag::Int);
        col.primary_key = true;
        col.auto_increment = true;
        assert_eq!(col.definition(), "ipkey INT AUTO_INCREMENT");
    }

    #[test]
    fn length_and_not_null() {
        let mut col = Column::plain("v3", TypeTag::Varchar);
        col.length = 20;
        col.nullable = false;
        assert_eq!(col.definition(), "v3 VARCHAR(20) NOT NULL");
    }

    #[test]
    fn blob_uses_sub_type() {
        let mut col = Column::plain("mb1", TypeTag::Blob);
        col.sub_type = Some("MEDIUMBLOB".to_string());
        col.compressed = true;
        assert_eq!(col.definition(), "mb1 MEDIUMBLOB COLUMN_FORMAT COMPRESSED");
    }

    #[test]
    fn generated_emits_expression() {
        let mut col = Column::plain("g5", TypeTag::Generated);
        col.generated_expr = Some(" INT GENERATED ALWAYS AS ( i0+ i1) STORED".to_string());
        col.generated_tag = Some(TypeTag::Int);
        assert_eq!(
            col.definition(),
            "g5  INT GENERATED ALWAYS AS ( i0+ i1) STORED"
        );
        assert_eq!(col.value_tag(), TypeTag::Int);
    }

    #[test]
    fn type_tag_serde_uses_sql_keywords() {
        let json = serde_json::to_string(&TypeTag::DateTime).unwrap();
        assert_eq!(json, r#""DATETIME""#);
        let back: TypeTag = serde_json::from_str(r#""BLOB""#).unwrap();
        assert_eq!(back, TypeTag::Blob);
    }

    #[test]
    fn column_serde_roundtrip() {
        let mut col = Column::plain("tb2", TypeTag::Blob);
        col.sub_type = Some("TINYBLOB".to_string());
        col.length = 120;
        col.not_secondary = true;
        let json = serde_json::to_string(&col).unwrap();
        let back: Column = serde_json::from_str(&json).unwrap();
        assert_eq!(back, col);
    }
}

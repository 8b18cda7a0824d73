pub mod entity;

pub use entity::{Entity, EntityModel, EntitySet, Field};

use crate::util::SyncError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_DECIMAL_PRECISION: u8 = 18;
pub const DEFAULT_DECIMAL_SCALE: u8 = 2;
pub const MAX_DECIMAL_PRECISION: u8 = 38;

/// Engine-independent column type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(into = "String", try_from = "String")]
pub enum SemanticType {
    Int32,
    Int64,
    Int16,
    Byte,
    String,
    Decimal { precision: u8, scale: u8 },
    Double,
    Float32,
    Bool,
    DateTime,
    DateTimeOffset,
    TimeSpan,
    Guid,
    Binary,
}

impl SemanticType {
    /// Decimal with the canonical default precision and scale.
    pub const fn decimal() -> Self {
        SemanticType::Decimal {
            precision: DEFAULT_DECIMAL_PRECISION,
            scale: DEFAULT_DECIMAL_SCALE,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            SemanticType::Int32 | SemanticType::Int64 | SemanticType::Int16 | SemanticType::Byte
        )
    }

    /// Whether the engine can generate values for a key of this type.
    pub fn supports_identity(&self) -> bool {
        self.is_integer() || matches!(self, SemanticType::Guid)
    }

    /// Every variant, with `Decimal` at its default precision.
    pub fn all() -> [SemanticType; 14] {
        [
            SemanticType::Int32,
            SemanticType::Int64,
            SemanticType::Int16,
            SemanticType::Byte,
            SemanticType::String,
            SemanticType::decimal(),
            SemanticType::Double,
            SemanticType::Float32,
            SemanticType::Bool,
            SemanticType::DateTime,
            SemanticType::DateTimeOffset,
            SemanticType::TimeSpan,
            SemanticType::Guid,
            SemanticType::Binary,
        ]
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticType::Int32 => f.write_str("Int32"),
            SemanticType::Int64 => f.write_str("Int64"),
            SemanticType::Int16 => f.write_str("Int16"),
            SemanticType::Byte => f.write_str("Byte"),
            SemanticType::String => f.write_str("String"),
            SemanticType::Decimal { precision, scale } => {
                write!(f, "Decimal({precision},{scale})")
            }
            SemanticType::Double => f.write_str("Double"),
            SemanticType::Float32 => f.write_str("Float32"),
            SemanticType::Bool => f.write_str("Bool"),
            SemanticType::DateTime => f.write_str("DateTime"),
            SemanticType::DateTimeOffset => f.write_str("DateTimeOffset"),
            SemanticType::TimeSpan => f.write_str("TimeSpan"),
            SemanticType::Guid => f.write_str("Guid"),
            SemanticType::Binary => f.write_str("Binary"),
        }
    }
}

impl FromStr for SemanticType {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let simple = match trimmed.to_ascii_lowercase().as_str() {
            "int32" => Some(SemanticType::Int32),
            "int64" => Some(SemanticType::Int64),
            "int16" => Some(SemanticType::Int16),
            "byte" => Some(SemanticType::Byte),
            "string" => Some(SemanticType::String),
            "double" => Some(SemanticType::Double),
            "float32" => Some(SemanticType::Float32),
            "bool" => Some(SemanticType::Bool),
            "datetime" => Some(SemanticType::DateTime),
            "datetimeoffset" => Some(SemanticType::DateTimeOffset),
            "timespan" => Some(SemanticType::TimeSpan),
            "guid" => Some(SemanticType::Guid),
            "binary" => Some(SemanticType::Binary),
            _ => None,
        };
        if let Some(semantic_type) = simple {
            return Ok(semantic_type);
        }

        let re = Regex::new(r"(?i)^decimal\s*(?:\(\s*(\d+)\s*(?:,\s*(\d+)\s*)?\))?$").unwrap();
        let captures = re
            .captures(trimmed)
            .ok_or_else(|| SyncError::unsupported_type(trimmed))?;

        let precision = match captures.get(1) {
            Some(p) => p
                .as_str()
                .parse::<u8>()
                .map_err(|_| SyncError::unsupported_type(trimmed))?,
            None => DEFAULT_DECIMAL_PRECISION,
        };
        let scale = match captures.get(2) {
            Some(s) => s
                .as_str()
                .parse::<u8>()
                .map_err(|_| SyncError::unsupported_type(trimmed))?,
            None if captures.get(1).is_some() => 0,
            None => DEFAULT_DECIMAL_SCALE,
        };

        if precision == 0 || precision > MAX_DECIMAL_PRECISION || scale > precision {
            return Err(SyncError::unsupported_type(trimmed));
        }

        Ok(SemanticType::Decimal { precision, scale })
    }
}

impl From<SemanticType> for String {
    fn from(value: SemanticType) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for SemanticType {
    type Error = SyncError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A column's type as known to the diff: either mapped or carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ColumnType {
    Semantic(SemanticType),
    /// Engine type with no semantic mapping. Never altered or dropped.
    Opaque(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub is_primary_key: bool,
    pub is_identity: bool,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, semantic_type: SemanticType) -> Self {
        Self {
            name: name.into(),
            column_type: ColumnType::Semantic(semantic_type),
            nullable: false,
            is_primary_key: false,
            is_identity: false,
        }
    }

    pub fn opaque(name: impl Into<String>, engine_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            column_type: ColumnType::Opaque(engine_type.into()),
            nullable,
            is_primary_key: false,
            is_identity: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.nullable = false;
        self
    }

    pub fn identity(mut self) -> Self {
        self.is_identity = true;
        self
    }

    pub fn semantic_type(&self) -> Option<SemanticType> {
        match self.column_type {
            ColumnType::Semantic(semantic_type) => Some(semantic_type),
            ColumnType::Opaque(_) => None,
        }
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self.column_type, ColumnType::Opaque(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct ForeignKeyDescriptor {
    /// Constraint identifier.
    pub name: String,
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

impl ForeignKeyDescriptor {
    /// Builds a descriptor with the conventional `FK_<table>_<column>` constraint name.
    pub fn new(
        table: &str,
        column: impl Into<String>,
        referenced_table: impl Into<String>,
        referenced_column: impl Into<String>,
    ) -> Self {
        let column = column.into();
        Self {
            name: format!("FK_{table}_{column}"),
            column,
            referenced_table: referenced_table.into(),
            referenced_column: referenced_column.into(),
        }
    }

    /// Same constrained column pointing at the same table. Constraint names are ignored.
    pub fn same_reference(&self, other: &ForeignKeyDescriptor) -> bool {
        self.column == other.column
            && self
                .referenced_table
                .eq_ignore_ascii_case(&other.referenced_table)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub foreign_keys: Vec<ForeignKeyDescriptor>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn with_column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_foreign_key(mut self, foreign_key: ForeignKeyDescriptor) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// The first primary-key column. Model tables have at most one.
    pub fn primary_key(&self) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.is_primary_key)
    }

    pub fn is_primary_key_column(&self, name: &str) -> bool {
        self.column(name).is_some_and(|c| c.is_primary_key)
    }

    pub fn foreign_key_for(&self, column: &str) -> Option<&ForeignKeyDescriptor> {
        self.foreign_keys.iter().find(|fk| fk.column == column)
    }

    /// Tables this one points at, excluding itself.
    pub fn referenced_tables(&self) -> impl Iterator<Item = &str> {
        self.foreign_keys
            .iter()
            .map(|fk| fk.referenced_table.as_str())
            .filter(move |t| *t != self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schema {
    pub tables: BTreeMap<String, TableSchema>,
}

impl Schema {
    pub fn new() -> Self {
        Schema {
            tables: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, table: TableSchema) -> Option<TableSchema> {
        self.tables.insert(table.name.clone(), table)
    }

    pub fn with_table(mut self, table: TableSchema) -> Self {
        self.insert(table);
        self
    }

    pub fn get(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let json = serde_json::to_string(self).expect("Schema must serialize");
        let hash = Sha256::digest(json.as_bytes());
        hex::encode(hash)
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_type_names() {
        assert_eq!("Int32".parse::<SemanticType>().unwrap(), SemanticType::Int32);
        assert_eq!("guid".parse::<SemanticType>().unwrap(), SemanticType::Guid);
        assert_eq!(
            " DateTimeOffset ".parse::<SemanticType>().unwrap(),
            SemanticType::DateTimeOffset
        );
    }

    #[test]
    fn bare_decimal_uses_canonical_default() {
        assert_eq!(
            "Decimal".parse::<SemanticType>().unwrap(),
            SemanticType::Decimal {
                precision: 18,
                scale: 2
            }
        );
    }

    #[test]
    fn parses_decimal_precision_and_scale() {
        assert_eq!(
            "Decimal(10, 4)".parse::<SemanticType>().unwrap(),
            SemanticType::Decimal {
                precision: 10,
                scale: 4
            }
        );
        assert_eq!(
            "decimal(9)".parse::<SemanticType>().unwrap(),
            SemanticType::Decimal {
                precision: 9,
                scale: 0
            }
        );
    }

    #[test]
    fn rejects_unknown_and_invalid_types() {
        let err = "Char".parse::<SemanticType>().unwrap_err();
        assert!(matches!(err, SyncError::UnsupportedType { ref type_name, .. } if type_name == "Char"));
        assert!("Decimal(4,6)".parse::<SemanticType>().is_err());
        assert!("Decimal(60,2)".parse::<SemanticType>().is_err());
    }

    #[test]
    fn display_parses_back() {
        for semantic_type in SemanticType::all() {
            let text = semantic_type.to_string();
            assert_eq!(text.parse::<SemanticType>().unwrap(), semantic_type);
        }
    }

    #[test]
    fn identity_only_for_integers_and_guid() {
        assert!(SemanticType::Int64.supports_identity());
        assert!(SemanticType::Guid.supports_identity());
        assert!(!SemanticType::String.supports_identity());
        assert!(!SemanticType::decimal().supports_identity());
    }

    #[test]
    fn primary_key_columns_are_not_nullable() {
        let column = ColumnDescriptor::new("Id", SemanticType::Int32)
            .nullable()
            .primary_key();
        assert!(!column.nullable);
        assert!(column.is_primary_key);
    }

    #[test]
    fn foreign_key_match_ignores_constraint_name_and_table_case() {
        let model = ForeignKeyDescriptor::new("Person", "AddressId", "Address", "Id");
        let live = ForeignKeyDescriptor {
            name: "fk_person_address".to_string(),
            column: "AddressId".to_string(),
            referenced_table: "address".to_string(),
            referenced_column: "Id".to_string(),
        };
        assert_eq!(model.name, "FK_Person_AddressId");
        assert!(model.same_reference(&live));
    }

    #[test]
    fn referenced_tables_skips_self_reference() {
        let table = TableSchema::new("Employee")
            .with_column(ColumnDescriptor::new("Id", SemanticType::Int32).primary_key())
            .with_foreign_key(ForeignKeyDescriptor::new("Employee", "ManagerId", "Employee", "Id"))
            .with_foreign_key(ForeignKeyDescriptor::new("Employee", "DepartmentId", "Department", "Id"));
        let referenced: Vec<&str> = table.referenced_tables().collect();
        assert_eq!(referenced, vec!["Department"]);
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = Schema::new().with_table(
            TableSchema::new("Person").with_column(ColumnDescriptor::new("Id", SemanticType::Int32)),
        );
        let b = Schema::new().with_table(
            TableSchema::new("Person").with_column(ColumnDescriptor::new("Id", SemanticType::Int64)),
        );
        assert_eq!(a.fingerprint(), a.clone().fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn semantic_type_serializes_as_string() {
        let json = serde_json::to_string(&SemanticType::Decimal {
            precision: 12,
            scale: 3,
        })
        .unwrap();
        assert_eq!(json, "\"Decimal(12,3)\"");
        let parsed: SemanticType = serde_json::from_str("\"Int64\"").unwrap();
        assert_eq!(parsed, SemanticType::Int64);
    }
}

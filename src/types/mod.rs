//! Two-way mapping between semantic column types and engine type names.
//!
//! The forward direction feeds DDL generation; the inverse direction
//! normalizes catalog metadata so the diff can compare like with like.
//! For every type a dialect supports, parsing the rendered engine type
//! yields the original semantic type.

use crate::model::{
    SemanticType, DEFAULT_DECIMAL_PRECISION, DEFAULT_DECIMAL_SCALE, MAX_DECIMAL_PRECISION,
};
use crate::util::{Result, SyncError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Variable-length catalogs report unbounded lengths as -1.
pub const UNBOUNDED_LENGTH: i32 = -1;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgres,
    SqlServer,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Postgres => f.write_str("postgres"),
            Dialect::SqlServer => f.write_str("sqlserver"),
        }
    }
}

impl FromStr for Dialect {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "sqlserver" | "mssql" => Ok(Dialect::SqlServer),
            other => Err(SyncError::configuration(format!("unknown dialect '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeMapper {
    dialect: Dialect,
}

impl TypeMapper {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Engine type name for a semantic type, e.g. `NVARCHAR(MAX)` or `NUMERIC(18,2)`.
    pub fn engine_type(&self, semantic_type: SemanticType) -> Result<String> {
        let name = match self.dialect {
            Dialect::SqlServer => match semantic_type {
                SemanticType::Int32 => "INT".to_string(),
                SemanticType::Int64 => "BIGINT".to_string(),
                SemanticType::Int16 => "SMALLINT".to_string(),
                SemanticType::Byte => "TINYINT".to_string(),
                SemanticType::String => "NVARCHAR(MAX)".to_string(),
                SemanticType::Decimal { precision, scale } => {
                    format!("DECIMAL({precision},{scale})")
                }
                SemanticType::Double => "FLOAT".to_string(),
                SemanticType::Float32 => "REAL".to_string(),
                SemanticType::Bool => "BIT".to_string(),
                SemanticType::DateTime => "DATETIME2".to_string(),
                SemanticType::DateTimeOffset => "DATETIMEOFFSET".to_string(),
                SemanticType::TimeSpan => "TIME".to_string(),
                SemanticType::Guid => "UNIQUEIDENTIFIER".to_string(),
                SemanticType::Binary => "VARBINARY(MAX)".to_string(),
            },
            Dialect::Postgres => match semantic_type {
                SemanticType::Int32 => "INTEGER".to_string(),
                SemanticType::Int64 => "BIGINT".to_string(),
                SemanticType::Int16 => "SMALLINT".to_string(),
                SemanticType::Byte => {
                    return Err(SyncError::unsupported_in_dialect(
                        semantic_type.to_string(),
                        self.dialect,
                    ))
                }
                SemanticType::String => "TEXT".to_string(),
                SemanticType::Decimal { precision, scale } => {
                    format!("NUMERIC({precision},{scale})")
                }
                SemanticType::Double => "DOUBLE PRECISION".to_string(),
                SemanticType::Float32 => "REAL".to_string(),
                SemanticType::Bool => "BOOLEAN".to_string(),
                SemanticType::DateTime => "TIMESTAMP".to_string(),
                SemanticType::DateTimeOffset => "TIMESTAMP WITH TIME ZONE".to_string(),
                SemanticType::TimeSpan => "INTERVAL".to_string(),
                SemanticType::Guid => "UUID".to_string(),
                SemanticType::Binary => "BYTEA".to_string(),
            },
        };
        Ok(name)
    }

    /// Engine type plus nullability clause. `required` forces NOT NULL.
    pub fn column_type(
        &self,
        semantic_type: SemanticType,
        nullable: bool,
        required: bool,
    ) -> Result<String> {
        let engine_type = self.engine_type(semantic_type)?;
        let nullable = nullable && !required;
        Ok(match (self.dialect, nullable) {
            (_, false) => format!("{engine_type} NOT NULL"),
            (Dialect::SqlServer, true) => format!("{engine_type} NULL"),
            (Dialect::Postgres, true) => engine_type,
        })
    }

    /// Fails with `UnsupportedType` if the dialect cannot express the type.
    pub fn check(&self, semantic_type: SemanticType) -> Result<()> {
        self.engine_type(semantic_type).map(|_| ())
    }

    /// Normalizes catalog metadata into a semantic type.
    ///
    /// Accepts catalog spellings (`nvarchar` with `max_length` -1) as well as
    /// rendered spellings (`NVARCHAR(MAX)`). Explicit length/precision/scale
    /// arguments take precedence over any parenthesized arguments in the
    /// name. Returns `None` for types with no semantic mapping.
    pub fn from_engine_type(
        &self,
        engine_type: &str,
        max_length: Option<i32>,
        precision: Option<i32>,
        scale: Option<i32>,
        nullable: bool,
    ) -> Option<(SemanticType, bool)> {
        let parsed = ParsedEngineType::parse(engine_type)?;
        let max_length = max_length.or(parsed.max_length);
        let precision = precision.or(parsed.precision);
        let scale = scale.or(parsed.scale);

        let semantic_type = match self.dialect {
            Dialect::SqlServer => sqlserver_semantic_type(&parsed.name, max_length, precision),
            Dialect::Postgres => postgres_semantic_type(&parsed.name, max_length),
        };

        let semantic_type = match semantic_type? {
            SemanticType::Decimal { .. } => normalize_decimal(precision, scale)?,
            other => other,
        };

        Some((semantic_type, nullable))
    }
}

fn sqlserver_semantic_type(
    name: &str,
    max_length: Option<i32>,
    precision: Option<i32>,
) -> Option<SemanticType> {
    let semantic_type = match name {
        "int" => SemanticType::Int32,
        "bigint" => SemanticType::Int64,
        "smallint" => SemanticType::Int16,
        "tinyint" => SemanticType::Byte,
        "nvarchar" | "varchar" if max_length == Some(UNBOUNDED_LENGTH) => SemanticType::String,
        "ntext" | "text" => SemanticType::String,
        "decimal" | "numeric" => SemanticType::decimal(),
        "float" if precision.is_some_and(|p| p <= 24) => SemanticType::Float32,
        "float" => SemanticType::Double,
        "real" => SemanticType::Float32,
        "bit" => SemanticType::Bool,
        "datetime2" | "datetime" => SemanticType::DateTime,
        "datetimeoffset" => SemanticType::DateTimeOffset,
        "time" => SemanticType::TimeSpan,
        "uniqueidentifier" => SemanticType::Guid,
        "varbinary" if max_length == Some(UNBOUNDED_LENGTH) => SemanticType::Binary,
        "image" => SemanticType::Binary,
        _ => return None,
    };
    Some(semantic_type)
}

fn postgres_semantic_type(name: &str, max_length: Option<i32>) -> Option<SemanticType> {
    let semantic_type = match name {
        "integer" | "int" | "int4" => SemanticType::Int32,
        "bigint" | "int8" => SemanticType::Int64,
        "smallint" | "int2" => SemanticType::Int16,
        "text" => SemanticType::String,
        "character varying" | "varchar" if max_length.is_none() => SemanticType::String,
        "numeric" | "decimal" => SemanticType::decimal(),
        "double precision" | "float8" => SemanticType::Double,
        "real" | "float4" => SemanticType::Float32,
        "boolean" | "bool" => SemanticType::Bool,
        "timestamp" | "timestamp without time zone" => SemanticType::DateTime,
        "timestamp with time zone" | "timestamptz" => SemanticType::DateTimeOffset,
        "interval" => SemanticType::TimeSpan,
        "uuid" => SemanticType::Guid,
        "bytea" => SemanticType::Binary,
        _ => return None,
    };
    Some(semantic_type)
}

/// Applies the canonical decimal default (18,2) when the catalog omits both
/// precision and scale, matching what the model side assumes.
fn normalize_decimal(precision: Option<i32>, scale: Option<i32>) -> Option<SemanticType> {
    let (precision, scale) = match (precision, scale) {
        (None, None) => (
            i32::from(DEFAULT_DECIMAL_PRECISION),
            i32::from(DEFAULT_DECIMAL_SCALE),
        ),
        (Some(p), None) => (p, 0),
        (None, Some(s)) => (i32::from(DEFAULT_DECIMAL_PRECISION), s),
        (Some(p), Some(s)) => (p, s),
    };
    let precision = u8::try_from(precision).ok()?;
    let scale = u8::try_from(scale).ok()?;
    if precision == 0 || precision > MAX_DECIMAL_PRECISION || scale > precision {
        return None;
    }
    Some(SemanticType::Decimal { precision, scale })
}

struct ParsedEngineType {
    name: String,
    max_length: Option<i32>,
    precision: Option<i32>,
    scale: Option<i32>,
}

impl ParsedEngineType {
    fn parse(engine_type: &str) -> Option<Self> {
        let re = Regex::new(r"^\s*([A-Za-z][A-Za-z0-9_ ]*?)\s*(?:\(\s*([^)]*?)\s*\))?\s*$").unwrap();
        let captures = re.captures(engine_type)?;

        let name = captures
            .get(1)?
            .as_str()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        let mut parsed = ParsedEngineType {
            name,
            max_length: None,
            precision: None,
            scale: None,
        };

        if let Some(args) = captures.get(2) {
            let args: Vec<&str> = args.as_str().split(',').map(str::trim).collect();
            match args.as_slice() {
                [single] if single.eq_ignore_ascii_case("max") => {
                    parsed.max_length = Some(UNBOUNDED_LENGTH);
                }
                [single] => {
                    let value = single.parse::<i32>().ok()?;
                    parsed.max_length = Some(value);
                    parsed.precision = Some(value);
                }
                [precision, scale] => {
                    parsed.precision = Some(precision.parse().ok()?);
                    parsed.scale = Some(scale.parse().ok()?);
                }
                _ => return None,
            }
        }

        Some(parsed)
    }
}

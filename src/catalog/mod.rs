//! Live catalog inspection.
//!
//! The inspector depends only on the [`CatalogReader`] capability. The
//! PostgreSQL reader lives in `pg::catalog`; [`MemoryCatalog`] holds a
//! snapshot in process.

use crate::model::{ColumnDescriptor, ColumnType, ForeignKeyDescriptor, Schema, TableSchema};
use crate::types::TypeMapper;
use crate::util::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::debug;

/// Column metadata as the catalog reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogColumn {
    pub name: String,
    pub engine_type: String,
    pub nullable: bool,
    pub max_length: Option<i32>,
    pub precision: Option<i32>,
    pub scale: Option<i32>,
}

impl CatalogColumn {
    pub fn new(name: impl Into<String>, engine_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            engine_type: engine_type.into(),
            nullable,
            max_length: None,
            precision: None,
            scale: None,
        }
    }

    pub fn max_length(mut self, max_length: i32) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn precision(mut self, precision: i32, scale: i32) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogForeignKey {
    pub constraint_name: String,
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

/// Read access to a database catalog.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    async fn list_tables(&self) -> Result<Vec<String>>;

    async fn list_columns(&self, table: &str) -> Result<Vec<CatalogColumn>>;

    async fn list_foreign_keys(&self, table: &str) -> Result<Vec<CatalogForeignKey>>;

    /// Primary-key column names, in key order. Empty for keyless tables.
    async fn primary_key(&self, table: &str) -> Result<Vec<String>>;
}

/// Reads the live catalog into one [`TableSchema`] per table.
///
/// Columns whose engine type has no semantic mapping are kept as opaque.
pub async fn inspect_catalog(reader: &dyn CatalogReader, mapper: &TypeMapper) -> Result<Schema> {
    let mut schema = Schema::new();

    for table in reader.list_tables().await? {
        let primary_key = reader.primary_key(&table).await?;
        let mut table_schema = TableSchema::new(&table);

        for column in reader.list_columns(&table).await? {
            let mut descriptor = match mapper.from_engine_type(
                &column.engine_type,
                column.max_length,
                column.precision,
                column.scale,
                column.nullable,
            ) {
                Some((semantic_type, nullable)) => {
                    let descriptor = ColumnDescriptor::new(&column.name, semantic_type);
                    if nullable {
                        descriptor.nullable()
                    } else {
                        descriptor
                    }
                }
                None => {
                    debug!(table = %table, column = %column.name, engine_type = %column.engine_type, "unmapped column type");
                    ColumnDescriptor::opaque(&column.name, &column.engine_type, column.nullable)
                }
            };
            if primary_key.contains(&column.name) {
                descriptor.is_primary_key = true;
            }
            table_schema.columns.push(descriptor);
        }

        for fk in reader.list_foreign_keys(&table).await? {
            table_schema.foreign_keys.push(ForeignKeyDescriptor {
                name: fk.constraint_name,
                column: fk.column,
                referenced_table: fk.referenced_table,
                referenced_column: fk.referenced_column,
            });
        }

        debug!(
            table = %table,
            columns = table_schema.columns.len(),
            foreign_keys = table_schema.foreign_keys.len(),
            "inspected table"
        );
        schema.insert(table_schema);
    }

    Ok(schema)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct MemoryTable {
    columns: Vec<CatalogColumn>,
    foreign_keys: Vec<CatalogForeignKey>,
    primary_key: Vec<String>,
}

/// An in-process catalog snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryCatalog {
    tables: BTreeMap<String, MemoryTable>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog rows as the engine would report them for `schema`.
    pub fn from_schema(schema: &Schema, mapper: &TypeMapper) -> Result<Self> {
        let mut catalog = Self::new();
        for table in schema.tables.values() {
            catalog.add_table(&table.name);
            for column in &table.columns {
                let engine_type = match &column.column_type {
                    ColumnType::Semantic(semantic_type) => mapper.engine_type(*semantic_type)?,
                    ColumnType::Opaque(engine_type) => engine_type.clone(),
                };
                catalog.add_column(
                    &table.name,
                    CatalogColumn::new(&column.name, engine_type, column.nullable),
                );
                if column.is_primary_key {
                    catalog.set_primary_key(&table.name, &[column.name.as_str()]);
                }
            }
            for fk in &table.foreign_keys {
                catalog.add_foreign_key(
                    &table.name,
                    CatalogForeignKey {
                        constraint_name: fk.name.clone(),
                        column: fk.column.clone(),
                        referenced_table: fk.referenced_table.clone(),
                        referenced_column: fk.referenced_column.clone(),
                    },
                );
            }
        }
        Ok(catalog)
    }

    pub fn add_table(&mut self, table: &str) {
        self.tables.entry(table.to_string()).or_default();
    }

    pub fn add_column(&mut self, table: &str, column: CatalogColumn) {
        self.tables
            .entry(table.to_string())
            .or_default()
            .columns
            .push(column);
    }

    pub fn add_foreign_key(&mut self, table: &str, foreign_key: CatalogForeignKey) {
        self.tables
            .entry(table.to_string())
            .or_default()
            .foreign_keys
            .push(foreign_key);
    }

    pub fn set_primary_key(&mut self, table: &str, columns: &[&str]) {
        self.tables.entry(table.to_string()).or_default().primary_key =
            columns.iter().map(|c| c.to_string()).collect();
    }

    pub fn with_column(mut self, table: &str, column: CatalogColumn) -> Self {
        self.add_column(table, column);
        self
    }

    pub fn with_primary_key(mut self, table: &str, columns: &[&str]) -> Self {
        self.set_primary_key(table, columns);
        self
    }

    pub fn with_foreign_key(mut self, table: &str, foreign_key: CatalogForeignKey) -> Self {
        self.add_foreign_key(table, foreign_key);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[async_trait]
impl CatalogReader for MemoryCatalog {
    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.tables.keys().cloned().collect())
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<CatalogColumn>> {
        Ok(self
            .tables
            .get(table)
            .map(|t| t.columns.clone())
            .unwrap_or_default())
    }

    async fn list_foreign_keys(&self, table: &str) -> Result<Vec<CatalogForeignKey>> {
        Ok(self
            .tables
            .get(table)
            .map(|t| t.foreign_keys.clone())
            .unwrap_or_default())
    }

    async fn primary_key(&self, table: &str) -> Result<Vec<String>> {
        Ok(self
            .tables
            .get(table)
            .map(|t| t.primary_key.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SemanticType;
    use crate::types::Dialect;

    #[tokio::test]
    async fn empty_catalog_yields_empty_schema() {
        let mapper = TypeMapper::new(Dialect::SqlServer);
        let schema = inspect_catalog(&MemoryCatalog::new(), &mapper).await.unwrap();
        assert!(schema.is_empty());
    }

    #[tokio::test]
    async fn normalizes_catalog_rows() {
        let catalog = MemoryCatalog::new()
            .with_column("Person", CatalogColumn::new("Id", "int", false))
            .with_column(
                "Person",
                CatalogColumn::new("Name", "nvarchar", true).max_length(-1),
            )
            .with_column(
                "Person",
                CatalogColumn::new("Salary", "decimal", false).precision(10, 4),
            )
            .with_column("Person", CatalogColumn::new("AddressId", "int", true))
            .with_primary_key("Person", &["Id"])
            .with_foreign_key(
                "Person",
                CatalogForeignKey {
                    constraint_name: "FK_Person_AddressId".to_string(),
                    column: "AddressId".to_string(),
                    referenced_table: "Address".to_string(),
                    referenced_column: "Id".to_string(),
                },
            );

        let mapper = TypeMapper::new(Dialect::SqlServer);
        let schema = inspect_catalog(&catalog, &mapper).await.unwrap();
        let person = schema.get("Person").unwrap();

        assert_eq!(
            person.column("Id").unwrap(),
            &ColumnDescriptor::new("Id", SemanticType::Int32).primary_key()
        );
        assert_eq!(
            person.column("Name").unwrap(),
            &ColumnDescriptor::new("Name", SemanticType::String).nullable()
        );
        assert_eq!(
            person.column("Salary").unwrap().semantic_type(),
            Some(SemanticType::Decimal {
                precision: 10,
                scale: 4
            })
        );
        assert_eq!(person.foreign_keys[0].name, "FK_Person_AddressId");
    }

    #[tokio::test]
    async fn unmapped_columns_are_opaque() {
        let catalog = MemoryCatalog::new()
            .with_column("Person", CatalogColumn::new("Code", "nvarchar", false).max_length(10))
            .with_column("Person", CatalogColumn::new("Shape", "geography", true));
        let mapper = TypeMapper::new(Dialect::SqlServer);
        let schema = inspect_catalog(&catalog, &mapper).await.unwrap();
        let person = schema.get("Person").unwrap();
        assert!(person.column("Code").unwrap().is_opaque());
        assert_eq!(
            person.column("Shape").unwrap().column_type,
            ColumnType::Opaque("geography".to_string())
        );
    }

    #[tokio::test]
    async fn snapshot_of_schema_inspects_back_to_it() {
        let schema = Schema::new()
            .with_table(
                TableSchema::new("Address")
                    .with_column(ColumnDescriptor::new("Id", SemanticType::Int32).primary_key())
                    .with_column(ColumnDescriptor::new("Street", SemanticType::String).nullable()),
            )
            .with_table(
                TableSchema::new("Person")
                    .with_column(ColumnDescriptor::new("Id", SemanticType::Guid).primary_key())
                    .with_column(ColumnDescriptor::new("AddressId", SemanticType::Int32))
                    .with_foreign_key(ForeignKeyDescriptor::new(
                        "Person", "AddressId", "Address", "Id",
                    )),
            );

        for dialect in [Dialect::SqlServer, Dialect::Postgres] {
            let mapper = TypeMapper::new(dialect);
            let catalog = MemoryCatalog::from_schema(&schema, &mapper).unwrap();
            assert_eq!(inspect_catalog(&catalog, &mapper).await.unwrap(), schema);
        }
    }
}

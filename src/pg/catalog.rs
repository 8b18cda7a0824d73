use crate::catalog::{CatalogColumn, CatalogForeignKey, CatalogReader};
use crate::pg::connection::PgConnection;
use crate::pg::DEFAULT_SCHEMA;
use crate::util::{Result, SyncError};
use async_trait::async_trait;
use sqlx::Row;

/// Reads one PostgreSQL schema through `information_schema` and `pg_catalog`.
pub struct PgCatalog<'a> {
    connection: &'a PgConnection,
    schema: String,
}

impl<'a> PgCatalog<'a> {
    pub fn new(connection: &'a PgConnection) -> Self {
        Self {
            connection,
            schema: DEFAULT_SCHEMA.to_string(),
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }
}

#[async_trait]
impl CatalogReader for PgCatalog<'_> {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT table_name::text AS table_name
            FROM information_schema.tables
            WHERE table_schema = $1 AND table_type = 'BASE TABLE'
            ORDER BY table_name
            "#,
        )
        .bind(&self.schema)
        .fetch_all(self.connection.pool())
        .await
        .map_err(|e| SyncError::DatabaseError(format!("Failed to fetch tables: {e}")))?;

        Ok(rows.iter().map(|row| row.get("table_name")).collect())
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<CatalogColumn>> {
        let rows = sqlx::query(
            r#"
            SELECT column_name::text AS column_name,
                   data_type::text AS data_type,
                   udt_name::text AS udt_name,
                   is_nullable::text AS is_nullable,
                   character_maximum_length::int4 AS character_maximum_length,
                   numeric_precision::int4 AS numeric_precision,
                   numeric_scale::int4 AS numeric_scale
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position
            "#,
        )
        .bind(&self.schema)
        .bind(table)
        .fetch_all(self.connection.pool())
        .await
        .map_err(|e| SyncError::DatabaseError(format!("Failed to fetch columns of {table}: {e}")))?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let data_type: String = row.get("data_type");
            let udt_name: String = row.get("udt_name");
            let is_nullable: String = row.get("is_nullable");

            // Arrays and user-defined types only carry a useful name in udt_name.
            let engine_type = match data_type.as_str() {
                "ARRAY" | "USER-DEFINED" => udt_name,
                _ => data_type,
            };

            columns.push(CatalogColumn {
                name: row.get("column_name"),
                engine_type,
                nullable: is_nullable == "YES",
                max_length: row.get("character_maximum_length"),
                precision: row.get("numeric_precision"),
                scale: row.get("numeric_scale"),
            });
        }

        Ok(columns)
    }

    async fn list_foreign_keys(&self, table: &str) -> Result<Vec<CatalogForeignKey>> {
        let rows = sqlx::query(
            r#"
            SELECT
                con.conname::text AS name,
                att.attname::text AS column_name,
                ref_class.relname::text AS referenced_table,
                ref_att.attname::text AS referenced_column
            FROM pg_constraint con
            JOIN pg_class class ON con.conrelid = class.oid
            JOIN pg_class ref_class ON con.confrelid = ref_class.oid
            JOIN pg_namespace n ON n.oid = class.relnamespace
            CROSS JOIN LATERAL unnest(con.conkey, con.confkey) WITH ORDINALITY AS u(attnum, ref_attnum, attposition)
            JOIN pg_attribute att ON att.attrelid = class.oid AND att.attnum = u.attnum
            JOIN pg_attribute ref_att ON ref_att.attrelid = ref_class.oid AND ref_att.attnum = u.ref_attnum
            WHERE class.relname = $1 AND n.nspname = $2 AND con.contype = 'f'
            ORDER BY con.conname, u.attposition
            "#,
        )
        .bind(table)
        .bind(&self.schema)
        .fetch_all(self.connection.pool())
        .await
        .map_err(|e| {
            SyncError::DatabaseError(format!("Failed to fetch foreign keys of {table}: {e}"))
        })?;

        Ok(rows
            .iter()
            .map(|row| CatalogForeignKey {
                constraint_name: row.get("name"),
                column: row.get("column_name"),
                referenced_table: row.get("referenced_table"),
                referenced_column: row.get("referenced_column"),
            })
            .collect())
    }

    async fn primary_key(&self, table: &str) -> Result<Vec<String>> {
        let row = sqlx::query(
            r#"
            SELECT array_agg(a.attname::text ORDER BY array_position(i.indkey::int2[], a.attnum)) AS columns
            FROM pg_index i
            JOIN pg_class c ON c.oid = i.indrelid
            JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = ANY(i.indkey)
            JOIN pg_namespace n ON n.oid = c.relnamespace
            WHERE c.relname = $1 AND n.nspname = $2 AND i.indisprimary
            GROUP BY i.indexrelid
            "#,
        )
        .bind(table)
        .bind(&self.schema)
        .fetch_optional(self.connection.pool())
        .await
        .map_err(|e| {
            SyncError::DatabaseError(format!("Failed to fetch primary key of {table}: {e}"))
        })?;

        Ok(row
            .map(|r| r.get::<Vec<String>, _>("columns"))
            .unwrap_or_default())
    }
}

//! Renders schema changes into dialect DDL.

use crate::diff::SchemaChange;
use crate::model::{ColumnDescriptor, ColumnType, ForeignKeyDescriptor, SemanticType, TableSchema};
use crate::types::{Dialect, TypeMapper};
use crate::util::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// One executable statement with what it touches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    pub sql: String,
    pub table: String,
    /// Other tables the statement needs to exist.
    pub references: Vec<String>,
    pub destructive: bool,
}

impl Statement {
    fn new(sql: String, table: &str) -> Self {
        Self {
            sql,
            table: table.to_string(),
            references: Vec::new(),
            destructive: false,
        }
    }

    fn referencing(mut self, tables: impl IntoIterator<Item = String>) -> Self {
        self.references.extend(tables);
        self
    }

    fn destructive(mut self) -> Self {
        self.destructive = true;
        self
    }

    /// Whether the statement touches or depends on `table`.
    pub fn involves(&self, table: &str) -> bool {
        self.table.eq_ignore_ascii_case(table)
            || self.references.iter().any(|r| r.eq_ignore_ascii_case(table))
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Renders changes in order. Foreign keys pointing at a table created later in
/// the same batch are split out and emitted after the run of table creates.
pub fn render(changes: &[SchemaChange], dialect: Dialect) -> Result<Vec<Statement>> {
    let mapper = TypeMapper::new(dialect);

    let created_at: BTreeMap<&str, usize> = changes
        .iter()
        .enumerate()
        .filter_map(|(index, change)| match change {
            SchemaChange::CreateTable(table) => Some((table.name.as_str(), index)),
            _ => None,
        })
        .collect();

    let mut statements = Vec::with_capacity(changes.len());
    let mut deferred = Vec::new();

    for (index, change) in changes.iter().enumerate() {
        if !matches!(change, SchemaChange::CreateTable(_)) {
            statements.append(&mut deferred);
        }

        match change {
            SchemaChange::CreateTable(table) => {
                let (inline, forward): (Vec<&ForeignKeyDescriptor>, Vec<&ForeignKeyDescriptor>) =
                    table.foreign_keys.iter().partition(|fk| {
                        created_at
                            .get(fk.referenced_table.as_str())
                            .map_or(true, |&created| created <= index)
                    });
                statements.push(create_table(table, &inline, &mapper)?);
                for fk in forward {
                    deferred.push(add_foreign_key(&table.name, fk, dialect));
                }
            }
            SchemaChange::DropTable(table) => statements.push(
                Statement::new(format!("DROP TABLE {};", quote_ident(table, dialect)), table)
                    .destructive(),
            ),
            SchemaChange::AddColumn { table, column } => {
                statements.push(add_column(table, column, &mapper)?)
            }
            SchemaChange::AlterColumn {
                table,
                column,
                semantic_type,
                nullable,
            } => statements.push(alter_column(
                table,
                column,
                *semantic_type,
                *nullable,
                &mapper,
            )?),
            SchemaChange::DropColumn { table, column } => statements.push(
                Statement::new(
                    format!(
                        "ALTER TABLE {} DROP COLUMN {};",
                        quote_ident(table, dialect),
                        quote_ident(column, dialect)
                    ),
                    table,
                )
                .destructive(),
            ),
            SchemaChange::AddForeignKey { table, foreign_key } => {
                statements.push(add_foreign_key(table, foreign_key, dialect))
            }
            SchemaChange::DropForeignKey { table, constraint } => statements.push(
                Statement::new(
                    format!(
                        "ALTER TABLE {} DROP CONSTRAINT {};",
                        quote_ident(table, dialect),
                        quote_ident(constraint, dialect)
                    ),
                    table,
                )
                .destructive(),
            ),
        }
    }

    statements.append(&mut deferred);
    Ok(statements)
}

pub fn quote_ident(identifier: &str, dialect: Dialect) -> String {
    match dialect {
        Dialect::SqlServer => format!("[{}]", identifier.replace(']', "]]")),
        Dialect::Postgres => format!("\"{}\"", identifier.replace('"', "\"\"")),
    }
}

fn create_table(
    table: &TableSchema,
    foreign_keys: &[&ForeignKeyDescriptor],
    mapper: &TypeMapper,
) -> Result<Statement> {
    let dialect = mapper.dialect();
    let mut definitions = table
        .columns
        .iter()
        .map(|c| format_column(c, mapper))
        .collect::<Result<Vec<_>>>()?;

    if let Some(primary_key) = table.primary_key() {
        definitions.push(format!(
            "CONSTRAINT {} PRIMARY KEY ({})",
            quote_ident(&format!("PK_{}", table.name), dialect),
            quote_ident(&primary_key.name, dialect)
        ));
    }

    for fk in foreign_keys {
        definitions.push(format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            quote_ident(&fk.name, dialect),
            quote_ident(&fk.column, dialect),
            quote_ident(&fk.referenced_table, dialect),
            quote_ident(&fk.referenced_column, dialect)
        ));
    }

    let sql = format!(
        "CREATE TABLE {} (\n    {}\n);",
        quote_ident(&table.name, dialect),
        definitions.join(",\n    ")
    );

    let references = foreign_keys
        .iter()
        .map(|fk| fk.referenced_table.clone())
        .filter(|t| *t != table.name)
        .collect::<Vec<_>>();
    Ok(Statement::new(sql, &table.name).referencing(references))
}

fn format_column(column: &ColumnDescriptor, mapper: &TypeMapper) -> Result<String> {
    let dialect = mapper.dialect();
    let mut parts = vec![quote_ident(&column.name, dialect)];

    match &column.column_type {
        ColumnType::Semantic(semantic_type) => {
            parts.push(mapper.column_type(
                *semantic_type,
                column.nullable,
                column.is_primary_key,
            )?);
            if column.is_identity {
                parts.push(identity_clause(*semantic_type, dialect).to_string());
            }
        }
        ColumnType::Opaque(engine_type) => {
            parts.push(engine_type.clone());
            if !column.nullable {
                parts.push("NOT NULL".to_string());
            }
        }
    }

    Ok(parts.join(" "))
}

fn identity_clause(semantic_type: SemanticType, dialect: Dialect) -> &'static str {
    match (dialect, semantic_type) {
        (Dialect::SqlServer, SemanticType::Guid) => "DEFAULT NEWID()",
        (Dialect::SqlServer, _) => "IDENTITY(1,1)",
        (Dialect::Postgres, SemanticType::Guid) => "DEFAULT gen_random_uuid()",
        (Dialect::Postgres, _) => "GENERATED BY DEFAULT AS IDENTITY",
    }
}

fn add_column(table: &str, column: &ColumnDescriptor, mapper: &TypeMapper) -> Result<Statement> {
    let dialect = mapper.dialect();
    let keyword = match dialect {
        Dialect::SqlServer => "ADD",
        Dialect::Postgres => "ADD COLUMN",
    };
    let mut sql = format!(
        "ALTER TABLE {} {} {}",
        quote_ident(table, dialect),
        keyword,
        format_column(column, mapper)?
    );
    if column.is_primary_key {
        sql.push_str(" PRIMARY KEY");
    }
    sql.push(';');
    Ok(Statement::new(sql, table))
}

fn alter_column(
    table: &str,
    column: &str,
    semantic_type: SemanticType,
    nullable: bool,
    mapper: &TypeMapper,
) -> Result<Statement> {
    let dialect = mapper.dialect();
    let table_ident = quote_ident(table, dialect);
    let column_ident = quote_ident(column, dialect);

    let sql = match dialect {
        Dialect::SqlServer => format!(
            "ALTER TABLE {table_ident} ALTER COLUMN {column_ident} {};",
            mapper.column_type(semantic_type, nullable, false)?
        ),
        Dialect::Postgres => {
            let engine_type = mapper.engine_type(semantic_type)?;
            let null_action = if nullable {
                "DROP NOT NULL"
            } else {
                "SET NOT NULL"
            };
            format!(
                "ALTER TABLE {table_ident} ALTER COLUMN {column_ident} TYPE {engine_type} USING {column_ident}::{engine_type}, ALTER COLUMN {column_ident} {null_action};"
            )
        }
    };
    Ok(Statement::new(sql, table))
}

fn add_foreign_key(table: &str, fk: &ForeignKeyDescriptor, dialect: Dialect) -> Statement {
    let sql = format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({});",
        quote_ident(table, dialect),
        quote_ident(&fk.name, dialect),
        quote_ident(&fk.column, dialect),
        quote_ident(&fk.referenced_table, dialect),
        quote_ident(&fk.referenced_column, dialect)
    );
    let references = if fk.referenced_table == table {
        Vec::new()
    } else {
        vec![fk.referenced_table.clone()]
    };
    Statement::new(sql, table).referencing(references)
}

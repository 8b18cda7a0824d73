pub mod planner;

use crate::model::{ColumnDescriptor, ForeignKeyDescriptor, Schema, SemanticType, TableSchema};
use crate::resolve::TableRegistry;
use crate::util::{Result, SyncError};
use serde::Serialize;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaChange {
    CreateTable(TableSchema),
    DropTable(String),
    AddColumn {
        table: String,
        column: ColumnDescriptor,
    },
    AlterColumn {
        table: String,
        column: String,
        semantic_type: SemanticType,
        nullable: bool,
    },
    DropColumn {
        table: String,
        column: String,
    },
    AddForeignKey {
        table: String,
        foreign_key: ForeignKeyDescriptor,
    },
    DropForeignKey {
        table: String,
        constraint: String,
    },
}

impl SchemaChange {
    /// Drops lose data or constraints and need explicit permission to apply.
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            SchemaChange::DropTable(_)
                | SchemaChange::DropColumn { .. }
                | SchemaChange::DropForeignKey { .. }
        )
    }

    /// The table the change touches.
    pub fn table(&self) -> &str {
        match self {
            SchemaChange::CreateTable(table) => &table.name,
            SchemaChange::DropTable(table)
            | SchemaChange::AddColumn { table, .. }
            | SchemaChange::AlterColumn { table, .. }
            | SchemaChange::DropColumn { table, .. }
            | SchemaChange::AddForeignKey { table, .. }
            | SchemaChange::DropForeignKey { table, .. } => table,
        }
    }
}

impl fmt::Display for SchemaChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaChange::CreateTable(table) => write!(f, "create table {}", table.name),
            SchemaChange::DropTable(table) => write!(f, "drop table {table}"),
            SchemaChange::AddColumn { table, column } => {
                write!(f, "add column {table}.{}", column.name)
            }
            SchemaChange::AlterColumn {
                table,
                column,
                semantic_type,
                nullable,
            } => write!(
                f,
                "alter column {table}.{column} to {semantic_type}{}",
                if *nullable { " NULL" } else { " NOT NULL" }
            ),
            SchemaChange::DropColumn { table, column } => {
                write!(f, "drop column {table}.{column}")
            }
            SchemaChange::AddForeignKey { table, foreign_key } => write!(
                f,
                "add foreign key {table}.{} -> {}.{}",
                foreign_key.column, foreign_key.referenced_table, foreign_key.referenced_column
            ),
            SchemaChange::DropForeignKey { table, constraint } => {
                write!(f, "drop foreign key {constraint} on {table}")
            }
        }
    }
}

/// Looks a table up by exact name, falling back to a case-insensitive match.
pub(crate) fn find_table<'a>(schema: &'a Schema, name: &str) -> Option<&'a TableSchema> {
    schema.get(name).or_else(|| {
        schema
            .tables
            .values()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    })
}

/// Computes the ordered changes that bring `live` in line with `model`.
///
/// Live tables are dropped only when the registry recognizes them as
/// belonging to an entity the model no longer exposes. Primary-key and
/// opaque columns are never dropped.
pub fn compute_diff(
    model: &Schema,
    live: &Schema,
    registry: &TableRegistry,
) -> Result<Vec<SchemaChange>> {
    let mut changes = Vec::new();

    for model_table in model.tables.values() {
        match find_table(live, &model_table.name) {
            None => changes.push(SchemaChange::CreateTable(model_table.clone())),
            Some(live_table) => {
                changes.extend(diff_columns(model_table, live_table));
                changes.extend(diff_foreign_keys(model_table, live_table));
            }
        }
    }

    let dropped: Vec<&str> = live
        .tables
        .values()
        .filter(|t| find_table(model, &t.name).is_none())
        .filter(|t| registry.recognizes_dropped(&t.name))
        .map(|t| t.name.as_str())
        .collect();

    for model_table in model.tables.values() {
        for fk in &model_table.foreign_keys {
            if let Some(target) = dropped
                .iter()
                .find(|d| d.eq_ignore_ascii_case(&fk.referenced_table))
            {
                return Err(SyncError::DropHazard {
                    table: target.to_string(),
                    referenced_by: format!("{}.{}", model_table.name, fk.column),
                });
            }
        }
    }

    for live_table in live.tables.values() {
        if dropped.iter().any(|d| d.eq_ignore_ascii_case(&live_table.name)) {
            continue;
        }
        for fk in &live_table.foreign_keys {
            let scheduled_for_drop = changes.iter().any(|c| {
                matches!(c, SchemaChange::DropForeignKey { table, constraint }
                    if table.eq_ignore_ascii_case(&live_table.name) && *constraint == fk.name)
            });
            if scheduled_for_drop {
                continue;
            }
            if let Some(target) = dropped
                .iter()
                .find(|d| d.eq_ignore_ascii_case(&fk.referenced_table))
            {
                return Err(SyncError::DropHazard {
                    table: target.to_string(),
                    referenced_by: format!("{}.{}", live_table.name, fk.column),
                });
            }
        }
    }

    changes.extend(dropped.iter().map(|t| SchemaChange::DropTable(t.to_string())));

    debug!(changes = changes.len(), "computed schema diff");
    Ok(planner::plan_changes(changes, live))
}

fn diff_columns(model: &TableSchema, live: &TableSchema) -> Vec<SchemaChange> {
    let mut changes = Vec::new();

    for model_column in &model.columns {
        let Some(live_column) = live.column(&model_column.name) else {
            changes.push(SchemaChange::AddColumn {
                table: live.name.clone(),
                column: model_column.clone(),
            });
            continue;
        };

        let (Some(model_type), Some(live_type)) =
            (model_column.semantic_type(), live_column.semantic_type())
        else {
            continue;
        };

        if model_type != live_type || model_column.nullable != live_column.nullable {
            changes.push(SchemaChange::AlterColumn {
                table: live.name.clone(),
                column: model_column.name.clone(),
                semantic_type: model_type,
                nullable: model_column.nullable,
            });
        }
    }

    for live_column in &live.columns {
        if model.has_column(&live_column.name)
            || live_column.is_opaque()
            || live_column.is_primary_key
            || model.is_primary_key_column(&live_column.name)
        {
            continue;
        }
        changes.push(SchemaChange::DropColumn {
            table: live.name.clone(),
            column: live_column.name.clone(),
        });
    }

    changes
}

fn diff_foreign_keys(model: &TableSchema, live: &TableSchema) -> Vec<SchemaChange> {
    let mut changes = Vec::new();

    for fk in &model.foreign_keys {
        if !live.foreign_keys.iter().any(|l| l.same_reference(fk)) {
            changes.push(SchemaChange::AddForeignKey {
                table: live.name.clone(),
                foreign_key: fk.clone(),
            });
        }
    }

    for fk in &live.foreign_keys {
        if model.foreign_keys.iter().any(|m| m.same_reference(fk)) {
            continue;
        }
        let opaque_unmodeled = live.column(&fk.column).is_some_and(|c| c.is_opaque())
            && !model.has_column(&fk.column);
        if opaque_unmodeled {
            continue;
        }
        changes.push(SchemaChange::DropForeignKey {
            table: live.name.clone(),
            constraint: fk.name.clone(),
        });
    }

    changes
}

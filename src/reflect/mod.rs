//! Turns entity declarations into normalized table schemas.
//!
//! Reflection runs in two passes: columns and keys for every table first,
//! then foreign keys, so a reference can point at any table in the model
//! regardless of declaration order.

use crate::model::{
    ColumnDescriptor, Entity, EntityModel, ForeignKeyDescriptor, Schema, TableSchema,
};
use crate::resolve::{ForeignKeyResolver, ReferencePolicy, TableRegistry};
use crate::util::{Result, SyncError};
use std::collections::BTreeSet;
use tracing::debug;

/// Column assumed as the referenced key for explicit targets outside the model.
pub const DEFAULT_KEY_COLUMN: &str = "Id";

/// The reflected model: one table per exposed entity, plus the names it knows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    pub schema: Schema,
    pub registry: TableRegistry,
}

/// Table names paired with the entity each exposes.
fn exposures(model: &EntityModel) -> Result<Vec<(String, &Entity)>> {
    if model.sets.is_empty() {
        return Ok(model
            .entities
            .iter()
            .map(|e| (e.table_name().to_string(), e))
            .collect());
    }

    model
        .sets
        .iter()
        .map(|set| {
            model
                .find_entity(&set.entity)
                .map(|entity| (set.member.clone(), entity))
                .ok_or_else(|| {
                    SyncError::configuration(format!(
                        "entity set '{}' names undeclared entity '{}'",
                        set.member, set.entity
                    ))
                })
        })
        .collect()
}

fn reflect_columns(
    table: &str,
    entity: &Entity,
    policy: &dyn ReferencePolicy,
) -> Result<TableSchema> {
    let mut schema = TableSchema::new(table);
    let mut seen = BTreeSet::new();

    for field in &entity.fields {
        if !seen.insert(field.name.as_str()) {
            return Err(SyncError::configuration(format!(
                "field '{}' is declared more than once on entity '{}'",
                field.name, entity.name
            )));
        }

        let mut column = ColumnDescriptor::new(&field.name, field.semantic_type);
        if field.nullable {
            column = column.nullable();
        }
        if field.primary_key || policy.is_primary_key(&field.name) {
            column = column.primary_key();
        }
        if field.identity {
            if !column.is_primary_key || !field.semantic_type.supports_identity() {
                return Err(SyncError::configuration(format!(
                    "identity on '{}.{}' requires an integer or Guid primary key",
                    table, field.name
                )));
            }
            column = column.identity();
        }
        schema.columns.push(column);
    }

    let keys: Vec<&str> = schema
        .columns
        .iter()
        .filter(|c| c.is_primary_key)
        .map(|c| c.name.as_str())
        .collect();
    if keys.len() > 1 {
        return Err(SyncError::configuration(format!(
            "table '{}' declares more than one primary key: {}",
            table,
            keys.join(", ")
        )));
    }

    Ok(schema)
}

/// Builds one [`TableSchema`] per exposed table.
///
/// All configuration errors surface here, before any database access.
pub fn build_model_schemas(model: &EntityModel, policy: &dyn ReferencePolicy) -> Result<Model> {
    let exposures = exposures(model)?;

    let mut registry = TableRegistry::new();
    for entity in &model.entities {
        registry.declare_entity(&entity.name, entity.table.as_deref());
    }

    let mut schema = Schema::new();
    for (table, entity) in &exposures {
        if schema.tables.keys().any(|t| t.eq_ignore_ascii_case(table)) {
            return Err(SyncError::configuration(format!(
                "table '{table}' is declared more than once"
            )));
        }
        registry.expose(table, &entity.name);
        schema.insert(reflect_columns(table, entity, policy)?);
    }

    let resolver = ForeignKeyResolver::new(policy);
    let mut foreign_keys = Vec::new();
    for (table, entity) in &exposures {
        let Some(table_schema) = schema.get(table) else {
            continue;
        };
        for field in &entity.fields {
            if table_schema.is_primary_key_column(&field.name) {
                continue;
            }
            let Some(target) =
                resolver.resolve(&field.name, field.references.as_deref(), &registry)
            else {
                continue;
            };

            let referenced_column = match schema.get(&target) {
                Some(target_schema) => match target_schema.primary_key() {
                    Some(key) => key.name.clone(),
                    None => {
                        return Err(SyncError::configuration(format!(
                            "primary key missing where required: '{}.{}' references '{}', which has no primary key",
                            table, field.name, target
                        )))
                    }
                },
                None => DEFAULT_KEY_COLUMN.to_string(),
            };

            debug!(table = %table, column = %field.name, references = %target, "resolved foreign key");
            foreign_keys.push((
                table.clone(),
                ForeignKeyDescriptor::new(table, &field.name, target, referenced_column),
            ));
        }
    }

    for (table, foreign_key) in foreign_keys {
        if let Some(table_schema) = schema.tables.get_mut(&table) {
            table_schema.foreign_keys.push(foreign_key);
        }
    }

    debug!(tables = schema.len(), "reflected entity model");
    Ok(Model { schema, registry })
}

use crate::catalog::{inspect_catalog, CatalogReader};
use crate::diff::{compute_diff, find_table, SchemaChange};
use crate::model::{Schema, TableSchema};
use crate::reflect::Model;
use crate::types::{Dialect, TypeMapper};
use crate::util::Result;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftReport {
    pub has_drift: bool,
    pub model_fingerprint: String,
    pub live_fingerprint: String,
    pub differences: Vec<SchemaChange>,
}

/// Compares the model against the live catalog without changing anything.
pub async fn detect_drift(
    model: &Model,
    reader: &dyn CatalogReader,
    dialect: Dialect,
) -> Result<DriftReport> {
    let live = inspect_catalog(reader, &TypeMapper::new(dialect)).await?;
    let differences = compute_diff(&model.schema, &live, &model.registry)?;

    Ok(DriftReport {
        has_drift: !differences.is_empty(),
        model_fingerprint: comparable(&model.schema, &model.schema).fingerprint(),
        live_fingerprint: comparable(&live, &model.schema).fingerprint(),
        differences,
    })
}

/// Projects `schema` onto what the diff compares against `model`.
///
/// Only modeled tables are kept, under the model's spelling. Identity flags
/// and constraint names are cleared. Unmodeled opaque or key columns and
/// foreign keys on unmodeled opaque columns are left out, since the diff
/// never touches them.
fn comparable(schema: &Schema, model: &Schema) -> Schema {
    let mut projected = Schema::new();

    for model_table in model.tables.values() {
        let Some(table) = find_table(schema, &model_table.name) else {
            continue;
        };
        let kept = |column: &str| {
            model_table.has_column(column)
                || table
                    .column(column)
                    .is_some_and(|c| !c.is_opaque() && !c.is_primary_key)
        };

        let mut columns: Vec<_> = table
            .columns
            .iter()
            .filter(|c| kept(&c.name))
            .cloned()
            .map(|mut c| {
                c.is_identity = false;
                c
            })
            .collect();
        columns.sort_by(|a, b| a.name.cmp(&b.name));

        let mut foreign_keys: Vec<_> = table
            .foreign_keys
            .iter()
            .filter(|fk| kept(&fk.column))
            .cloned()
            .map(|mut fk| {
                fk.name.clear();
                fk
            })
            .collect();
        foreign_keys.sort();

        projected.insert(TableSchema {
            name: model_table.name.clone(),
            columns,
            foreign_keys,
        });
    }

    projected
}

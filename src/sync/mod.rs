//! The reflect, inspect, diff, render pipeline.

use crate::apply::{apply_statements, ApplyReport, StatementExecutor};
use crate::catalog::{inspect_catalog, CatalogReader};
use crate::diff::{compute_diff, SchemaChange};
use crate::lint::{has_errors, lint_plan, LintOptions, LintResult};
use crate::model::{EntityModel, Schema};
use crate::reflect::{build_model_schemas, Model};
use crate::resolve::ReferencePolicy;
use crate::sqlgen::{render, Statement};
use crate::types::{Dialect, TypeMapper};
use crate::util::Result;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

/// A reviewable plan: what changes, the statements that make it so, and lint findings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncPlan {
    pub dialect: Dialect,
    pub changes: Vec<SchemaChange>,
    pub statements: Vec<Statement>,
    pub lint: Vec<LintResult>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn destructive_statements(&self) -> impl Iterator<Item = &Statement> {
        self.statements.iter().filter(|s| s.destructive)
    }

    pub fn has_lint_errors(&self) -> bool {
        has_errors(&self.lint)
    }

    /// SHA-256 over the statement list. Identical plans share a fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for statement in &self.statements {
            hasher.update(statement.sql.as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }

    pub fn sql(&self) -> Vec<&str> {
        self.statements.iter().map(|s| s.sql.as_str()).collect()
    }
}

/// Reflects the model and checks every column type against the dialect.
///
/// Fails before any database access on configuration or unsupported-type errors.
pub fn prepare_model(
    model: &EntityModel,
    policy: &dyn ReferencePolicy,
    dialect: Dialect,
) -> Result<Model> {
    let reflected = build_model_schemas(model, policy)?;
    let mapper = TypeMapper::new(dialect);
    for table in reflected.schema.tables.values() {
        for column in &table.columns {
            if let Some(semantic_type) = column.semantic_type() {
                mapper.check(semantic_type)?;
            }
        }
    }
    Ok(reflected)
}

/// Diffs a prepared model against a live schema and renders the result.
pub fn plan_sync(
    model: &Model,
    live: &Schema,
    dialect: Dialect,
    lint_options: &LintOptions,
) -> Result<SyncPlan> {
    let changes = compute_diff(&model.schema, live, &model.registry)?;
    let statements = render(&changes, dialect)?;
    let lint = lint_plan(&changes, live, lint_options);

    debug!(
        changes = changes.len(),
        statements = statements.len(),
        lint = lint.len(),
        "planned sync"
    );

    Ok(SyncPlan {
        dialect,
        changes,
        statements,
        lint,
    })
}

/// Reads the live catalog and plans against it.
pub async fn inspect_and_plan(
    model: &Model,
    reader: &dyn CatalogReader,
    dialect: Dialect,
    lint_options: &LintOptions,
) -> Result<(Schema, SyncPlan)> {
    let live = inspect_catalog(reader, &TypeMapper::new(dialect)).await?;
    let plan = plan_sync(model, &live, dialect, lint_options)?;
    Ok((live, plan))
}

/// Runs a plan's statements through the executor.
pub async fn execute_plan(plan: &SyncPlan, executor: &mut dyn StatementExecutor) -> ApplyReport {
    info!(
        statements = plan.statements.len(),
        fingerprint = %plan.fingerprint(),
        "applying plan"
    );
    apply_statements(&plan.statements, executor).await
}

/// Full creation script for an empty database.
pub fn creation_script(model: &Model, dialect: Dialect) -> Result<SyncPlan> {
    plan_sync(
        model,
        &Schema::new(),
        dialect,
        &LintOptions {
            allow_destructive: false,
            is_production: false,
        },
    )
}

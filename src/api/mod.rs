//! High-level API for embedding modelsync in other applications.
//!
//! This module provides functions that mirror CLI commands with structured
//! inputs and outputs. Both async and blocking variants are available.
//!
//! # Example
//!
//! ```no_run
//! use modelsync::api::{plan_blocking, PlanOptions};
//!
//! let result = plan_blocking(PlanOptions::new(
//!     vec!["models/".into()],
//!     "postgres://localhost/mydb",
//! )).unwrap();
//!
//! for statement in &result.statements {
//!     println!("{}", statement);
//! }
//! ```
//!
//! Note: Blocking variants create a new tokio runtime per call. For
//! high-frequency usage, prefer the async API with a shared runtime.

mod error;
mod options;
mod results;

pub use error::Error;
pub use options::{ApplyOptions, DriftOptions, PlanOptions, ScriptOptions};
pub use results::{ApplyResult, DriftResult, PlanResult, ScriptResult, ValidateResult};

use crate::drift::detect_drift;
use crate::lint::{LintOptions, LintSeverity};
use crate::loader::load_model_sources;
use crate::pg::{PgCatalog, PgConnection, PgExecutor};
use crate::reflect::Model;
use crate::resolve::FkPolicy;
use crate::sync::{creation_script, execute_plan, inspect_and_plan, prepare_model, SyncPlan};
use crate::types::Dialect;
use crate::util::SyncError;
use tracing::debug;

// ============================================================================
// Helper functions to reduce duplication
// ============================================================================

fn load_model(sources: &[String], fk_policy: FkPolicy, dialect: Dialect) -> Result<Model, Error> {
    let entities = load_model_sources(sources).map_err(Error::from_model)?;
    prepare_model(&entities, fk_policy.policy().as_ref(), dialect).map_err(Error::from_model)
}

async fn connect(database_url: &str) -> Result<PgConnection, Error> {
    PgConnection::new(database_url)
        .await
        .map_err(|e| Error::connection(e.to_string()))
}

fn plan_error(error: SyncError) -> Error {
    match error {
        SyncError::DatabaseError(message) => Error::introspection(message),
        other => Error::plan(other.to_string()),
    }
}

async fn connect_and_plan(options: &PlanOptions) -> Result<(PgConnection, SyncPlan), Error> {
    let model = load_model(&options.model_sources, options.fk_policy, Dialect::Postgres)?;
    debug!(tables = model.schema.len(), "model loaded");
    let connection = connect(&options.database_url).await?;

    let lint_options = LintOptions {
        allow_destructive: options.allow_destructive,
        ..Default::default()
    };
    let catalog = PgCatalog::new(&connection).with_schema(&options.target_schema);
    let (_live, plan) = inspect_and_plan(&model, &catalog, Dialect::Postgres, &lint_options)
        .await
        .map_err(plan_error)?;

    Ok((connection, plan))
}

// ============================================================================
// Public API functions
// ============================================================================

/// Load and reflect a model, reporting what it declares.
pub fn validate(
    model_sources: &[String],
    fk_policy: FkPolicy,
    dialect: Dialect,
) -> Result<ValidateResult, Error> {
    let entities = load_model_sources(model_sources).map_err(Error::from_model)?;
    let model =
        prepare_model(&entities, fk_policy.policy().as_ref(), dialect).map_err(Error::from_model)?;

    Ok(ValidateResult {
        entities: entities.entities.len(),
        tables: model.schema.table_names().map(str::to_string).collect(),
        foreign_keys: model
            .schema
            .tables
            .values()
            .map(|t| t.foreign_keys.len())
            .sum(),
        fingerprint: model.schema.fingerprint(),
    })
}

/// Render the creation script for an empty database. No connection is made.
pub fn script(options: ScriptOptions) -> Result<ScriptResult, Error> {
    let model = load_model(&options.model_sources, options.fk_policy, options.dialect)?;
    let plan = creation_script(&model, options.dialect).map_err(plan_error)?;
    Ok(ScriptResult {
        statements: plan.statements,
    })
}

/// Generate a sync plan comparing the model to a database.
pub async fn plan(options: PlanOptions) -> Result<PlanResult, Error> {
    let (_connection, plan) = connect_and_plan(&options).await?;
    Ok(plan.into())
}

/// Bring a database in line with the model.
///
/// Statement failures do not abort the run; they are listed in the
/// returned report.
pub async fn apply(options: ApplyOptions) -> Result<ApplyResult, Error> {
    let (connection, plan) = connect_and_plan(&options.plan_options()).await?;
    let fingerprint = plan.fingerprint();

    if let Some(expected) = &options.expected_fingerprint {
        if *expected != fingerprint {
            return Err(Error::PlanMismatch {
                expected: expected.clone(),
                actual: fingerprint,
            });
        }
    }

    if plan.has_lint_errors() {
        return Err(Error::LintFailed {
            count: plan
                .lint
                .iter()
                .filter(|r| r.severity == LintSeverity::Error)
                .count(),
            issues: plan.lint,
        });
    }

    if plan.is_empty() || options.dry_run {
        return Ok(ApplyResult {
            fingerprint,
            dry_run: options.dry_run,
            statements: plan.statements,
            report: None,
        });
    }

    let mut executor = PgExecutor::new(&connection).with_schema(&options.target_schema);
    if let Some(timeout) = options.statement_timeout {
        executor = executor.with_statement_timeout(timeout);
    }
    let report = execute_plan(&plan, &mut executor).await;

    Ok(ApplyResult {
        fingerprint,
        dry_run: false,
        statements: plan.statements,
        report: Some(report),
    })
}

/// Detect drift between the model and a database.
pub async fn drift(options: DriftOptions) -> Result<DriftResult, Error> {
    let model = load_model(&options.model_sources, options.fk_policy, Dialect::Postgres)?;
    let connection = connect(&options.database_url).await?;
    let catalog = PgCatalog::new(&connection).with_schema(&options.target_schema);

    let report = detect_drift(&model, &catalog, Dialect::Postgres)
        .await
        .map_err(plan_error)?;

    Ok(DriftResult {
        has_drift: report.has_drift,
        model_fingerprint: report.model_fingerprint,
        live_fingerprint: report.live_fingerprint,
        differences: report.differences,
    })
}

// ============================================================================
// Blocking variants
// ============================================================================

fn create_runtime() -> Result<tokio::runtime::Runtime, Error> {
    tokio::runtime::Runtime::new().map_err(|e| Error::runtime(e.to_string()))
}

/// Blocking variant of [`plan`].
///
/// Creates a new tokio runtime for each call. For high-frequency usage,
/// prefer the async API with a shared runtime.
pub fn plan_blocking(options: PlanOptions) -> Result<PlanResult, Error> {
    create_runtime()?.block_on(plan(options))
}

/// Blocking variant of [`apply`].
pub fn apply_blocking(options: ApplyOptions) -> Result<ApplyResult, Error> {
    create_runtime()?.block_on(apply(options))
}

/// Blocking variant of [`drift`].
pub fn drift_blocking(options: DriftOptions) -> Result<DriftResult, Error> {
    create_runtime()?.block_on(drift(options))
}

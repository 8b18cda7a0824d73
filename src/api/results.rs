use crate::apply::ApplyReport;
use crate::diff::SchemaChange;
use crate::lint::LintResult as LintIssue;
use crate::sqlgen::Statement;
use crate::sync::SyncPlan;
use serde::Serialize;

/// Result of loading and reflecting a model without touching a database.
#[derive(Debug, Clone, Serialize)]
pub struct ValidateResult {
    pub entities: usize,
    pub tables: Vec<String>,
    pub foreign_keys: usize,
    /// Fingerprint of the reflected schema
    pub fingerprint: String,
}

/// Result of rendering an offline creation script.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptResult {
    pub statements: Vec<Statement>,
}

impl ScriptResult {
    pub fn sql(&self) -> String {
        self.statements
            .iter()
            .map(|s| s.sql.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Result of a sync plan operation.
#[derive(Debug, Clone, Serialize)]
pub struct PlanResult {
    /// Changes in execution order
    pub changes: Vec<SchemaChange>,
    /// SQL statements to execute
    pub statements: Vec<Statement>,
    pub lint: Vec<LintIssue>,
    /// Pass to `ApplyOptions::expect_fingerprint` to apply exactly this plan
    pub fingerprint: String,
    /// Whether the plan is empty (no changes needed)
    pub is_empty: bool,
}

impl From<SyncPlan> for PlanResult {
    fn from(plan: SyncPlan) -> Self {
        Self {
            fingerprint: plan.fingerprint(),
            is_empty: plan.is_empty(),
            changes: plan.changes,
            statements: plan.statements,
            lint: plan.lint,
        }
    }
}

impl PlanResult {
    pub fn destructive_count(&self) -> usize {
        self.statements.iter().filter(|s| s.destructive).count()
    }
}

/// Result of applying a plan.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyResult {
    pub fingerprint: String,
    /// Whether this was a dry run
    pub dry_run: bool,
    pub statements: Vec<Statement>,
    /// Per-statement outcomes; `None` for dry runs and empty plans
    pub report: Option<ApplyReport>,
}

impl ApplyResult {
    pub fn is_success(&self) -> bool {
        self.report.as_ref().map_or(true, ApplyReport::is_success)
    }
}

/// Result of drift detection.
#[derive(Debug, Clone, Serialize)]
pub struct DriftResult {
    pub has_drift: bool,
    pub model_fingerprint: String,
    pub live_fingerprint: String,
    pub differences: Vec<SchemaChange>,
}

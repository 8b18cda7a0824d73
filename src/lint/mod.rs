use crate::diff::SchemaChange;
use crate::model::Schema;
use serde::Serialize;

/// Environment flag marking a production database.
pub const PRODUCTION_ENV: &str = "MODELSYNC_PROD";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintOptions {
    pub allow_destructive: bool,
    pub is_production: bool,
}

impl Default for LintOptions {
    fn default() -> Self {
        Self {
            allow_destructive: false,
            is_production: is_production_env(),
        }
    }
}

pub fn is_production_env() -> bool {
    std::env::var(PRODUCTION_ENV)
        .map(|v| v == "1")
        .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LintSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintResult {
    pub rule: String,
    pub severity: LintSeverity,
    pub message: String,
}

impl LintResult {
    fn error(rule: &str, message: String) -> Self {
        Self {
            rule: rule.to_string(),
            severity: LintSeverity::Error,
            message,
        }
    }

    fn warning(rule: &str, message: String) -> Self {
        Self {
            rule: rule.to_string(),
            severity: LintSeverity::Warning,
            message,
        }
    }
}

/// Checks planned changes against the live schema they will run on.
pub fn lint_plan(changes: &[SchemaChange], live: &Schema, options: &LintOptions) -> Vec<LintResult> {
    changes
        .iter()
        .flat_map(|change| lint_change(change, live, options))
        .collect()
}

pub fn has_errors(results: &[LintResult]) -> bool {
    results
        .iter()
        .any(|r| matches!(r.severity, LintSeverity::Error))
}

fn lint_change(change: &SchemaChange, live: &Schema, options: &LintOptions) -> Vec<LintResult> {
    let mut results = Vec::new();

    match change {
        SchemaChange::DropTable(name) => {
            if options.is_production {
                results.push(LintResult::error(
                    "deny_drop_table_in_prod",
                    format!("Dropping table {name} is not allowed in production ({PRODUCTION_ENV}=1)"),
                ));
            } else if !options.allow_destructive {
                results.push(LintResult::error(
                    "deny_drop_table",
                    format!("Dropping table {name} requires --allow-destructive flag"),
                ));
            }
        }

        SchemaChange::DropColumn { table, column } => {
            if !options.allow_destructive {
                results.push(LintResult::error(
                    "deny_drop_column",
                    format!("Dropping column {table}.{column} requires --allow-destructive flag"),
                ));
            }
        }

        SchemaChange::DropForeignKey { table, constraint } => {
            if !options.allow_destructive {
                results.push(LintResult::error(
                    "deny_drop_foreign_key",
                    format!(
                        "Dropping foreign key {constraint} on {table} requires --allow-destructive flag"
                    ),
                ));
            }
        }

        SchemaChange::AddColumn { table, column } => {
            if !column.nullable && !column.is_identity {
                results.push(LintResult::warning(
                    "warn_add_required_column",
                    format!(
                        "Adding NOT NULL column {table}.{} fails if {table} already has rows",
                        column.name
                    ),
                ));
            }
        }

        SchemaChange::AlterColumn {
            table,
            column,
            semantic_type,
            nullable,
        } => {
            let current = live.get(table).and_then(|t| t.column(column));

            let type_changed = current
                .and_then(|c| c.semantic_type())
                .map_or(true, |t| t != *semantic_type);
            if type_changed {
                results.push(LintResult::warning(
                    "warn_type_change",
                    format!(
                        "Changing column {table}.{column} to {semantic_type} may fail or lose data"
                    ),
                ));
            }

            let tightened = !*nullable && current.map_or(true, |c| c.nullable);
            if tightened {
                results.push(LintResult::warning(
                    "warn_set_not_null",
                    format!(
                        "Setting column {table}.{column} to NOT NULL may fail if existing rows have NULL values"
                    ),
                ));
            }
        }

        SchemaChange::CreateTable(_) | SchemaChange::AddForeignKey { .. } => {}
    }

    results
}

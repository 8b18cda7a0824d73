//! Statement-by-statement execution with per-statement outcomes.

use crate::sqlgen::Statement;
use crate::util::Result;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info, warn};

/// Runs one statement against the engine.
#[async_trait]
pub trait StatementExecutor: Send {
    async fn execute(&mut self, sql: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    Applied,
    Failed(String),
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementOutcome {
    pub statement: Statement,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub outcomes: Vec<StatementOutcome>,
}

impl ApplyReport {
    pub fn applied(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Applied))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped(_)))
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.skipped() == 0
    }

    fn count(&self, predicate: impl Fn(&Outcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(&o.outcome)).count()
    }
}

/// Executes statements strictly in order, each on its own.
///
/// A failure is recorded and does not stop statements for unrelated tables.
/// Later statements touching or referencing a table whose statement failed
/// are skipped. Nothing already applied is rolled back.
pub async fn apply_statements(
    statements: &[Statement],
    executor: &mut dyn StatementExecutor,
) -> ApplyReport {
    let mut report = ApplyReport::default();
    let mut failed_tables: Vec<&str> = Vec::new();

    for statement in statements {
        if let Some(failed) = failed_tables.iter().find(|t| statement.involves(t)) {
            let reason = format!("earlier statement for table {failed} failed");
            warn!(table = %statement.table, sql = %statement.sql, "skipping statement: {reason}");
            report.outcomes.push(StatementOutcome {
                statement: statement.clone(),
                outcome: Outcome::Skipped(reason),
            });
            continue;
        }

        let outcome = match executor.execute(&statement.sql).await {
            Ok(()) => {
                info!(table = %statement.table, sql = %statement.sql, "applied statement");
                Outcome::Applied
            }
            Err(e) => {
                error!(table = %statement.table, sql = %statement.sql, error = %e, "statement failed");
                failed_tables.push(&statement.table);
                Outcome::Failed(e.to_string())
            }
        };
        report.outcomes.push(StatementOutcome {
            statement: statement.clone(),
            outcome,
        });
    }

    info!(
        applied = report.applied(),
        failed = report.failed(),
        skipped = report.skipped(),
        "apply finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::SchemaChange;
    use crate::model::{ColumnDescriptor, ForeignKeyDescriptor, SemanticType, TableSchema};
    use crate::sqlgen::render;
    use crate::types::Dialect;
    use crate::util::SyncError;

    /// Records statements and fails any containing the given marker.
    struct ScriptedExecutor {
        fail_on: &'static str,
        executed: Vec<String>,
    }

    #[async_trait]
    impl StatementExecutor for ScriptedExecutor {
        async fn execute(&mut self, sql: &str) -> Result<()> {
            if sql.contains(self.fail_on) {
                return Err(SyncError::DatabaseError(format!("cannot run {sql}")));
            }
            self.executed.push(sql.to_string());
            Ok(())
        }
    }

    fn statements() -> Vec<Statement> {
        let changes = vec![
            SchemaChange::CreateTable(
                TableSchema::new("Address")
                    .with_column(ColumnDescriptor::new("Id", SemanticType::Int32).primary_key()),
            ),
            SchemaChange::CreateTable(
                TableSchema::new("Tag")
                    .with_column(ColumnDescriptor::new("Id", SemanticType::Int32).primary_key()),
            ),
            SchemaChange::AddColumn {
                table: "Person".to_string(),
                column: ColumnDescriptor::new("AddressId", SemanticType::Int32).nullable(),
            },
            SchemaChange::AddForeignKey {
                table: "Person".to_string(),
                foreign_key: ForeignKeyDescriptor::new("Person", "AddressId", "Address", "Id"),
            },
            SchemaChange::AddColumn {
                table: "Tag".to_string(),
                column: ColumnDescriptor::new("Label", SemanticType::String).nullable(),
            },
        ];
        render(&changes, Dialect::SqlServer).unwrap()
    }

    #[tokio::test]
    async fn applies_everything_in_order() {
        let mut executor = ScriptedExecutor {
            fail_on: "<never>",
            executed: Vec::new(),
        };
        let statements = statements();
        let report = apply_statements(&statements, &mut executor).await;

        assert!(report.is_success());
        assert_eq!(report.applied(), statements.len());
        assert_eq!(
            executor.executed,
            statements.iter().map(|s| s.sql.clone()).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn failure_skips_dependents_but_not_unrelated_tables() {
        let mut executor = ScriptedExecutor {
            fail_on: "CREATE TABLE [Address]",
            executed: Vec::new(),
        };
        let report = apply_statements(&statements(), &mut executor).await;

        let outcomes: Vec<&Outcome> = report.outcomes.iter().map(|o| &o.outcome).collect();
        assert!(matches!(outcomes[0], Outcome::Failed(_)));
        assert_eq!(outcomes[1], &Outcome::Applied);
        assert_eq!(outcomes[2], &Outcome::Applied);
        assert!(matches!(outcomes[3], Outcome::Skipped(reason) if reason.contains("Address")));
        assert_eq!(outcomes[4], &Outcome::Applied);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.skipped(), 1);
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn failed_table_poisons_its_later_statements() {
        let mut executor = ScriptedExecutor {
            fail_on: "CREATE TABLE [Tag]",
            executed: Vec::new(),
        };
        let report = apply_statements(&statements(), &mut executor).await;
        assert!(matches!(report.outcomes[4].outcome, Outcome::Skipped(_)));
        assert_eq!(report.applied(), 3);
    }

    #[test]
    fn outcome_serializes_with_status() {
        let json = serde_json::to_value(Outcome::Failed("boom".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({"status": "failed", "reason": "boom"}));
    }
}

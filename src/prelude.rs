//! Convenient re-exports for common modelsync usage.
//!
//! # Example
//!
//! ```no_run
//! use modelsync::prelude::*;
//!
//! let model = EntityModel::new()
//!     .entity(Entity::new("Address").field(Field::new("Id", SemanticType::Int32)))
//!     .entity(
//!         Entity::new("Person")
//!             .field(Field::new("Id", SemanticType::Int32).identity())
//!             .field(Field::new("AddressId", SemanticType::Int32)),
//!     );
//!
//! let prepared = prepare_model(&model, &ConventionPolicy::new(), Dialect::SqlServer).unwrap();
//! let plan = creation_script(&prepared, Dialect::SqlServer).unwrap();
//! println!("Generated {} statements", plan.statements.len());
//! ```

// Async functions
pub use crate::api::{apply, drift, plan};

// Blocking functions
pub use crate::api::{apply_blocking, drift_blocking, plan_blocking};

// Offline functions
pub use crate::api::{script, validate};

// Options
pub use crate::api::{ApplyOptions, DriftOptions, PlanOptions, ScriptOptions};

// Results
pub use crate::api::{ApplyResult, DriftResult, PlanResult, ScriptResult, ValidateResult};

// Error types
pub use crate::api::Error;
pub use crate::util::SyncError;

// Core types
pub use crate::apply::{ApplyReport, Outcome, StatementExecutor};
pub use crate::catalog::{CatalogReader, MemoryCatalog};
pub use crate::diff::SchemaChange;
pub use crate::model::{Entity, EntityModel, Field, Schema, SemanticType};
pub use crate::resolve::{ConventionPolicy, ExplicitOnlyPolicy, FkPolicy, ReferencePolicy};
pub use crate::sqlgen::Statement;
pub use crate::sync::{creation_script, execute_plan, inspect_and_plan, prepare_model, SyncPlan};
pub use crate::types::Dialect;

// Re-export LintResult as LintIssue for accessing Error::LintFailed issues
pub use crate::lint::LintResult as LintIssue;

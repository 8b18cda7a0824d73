//! modelsync - keep a relational schema in lockstep with entity definitions.
//!
//! Entities are declared with a builder API or in JSON model files. The
//! crate reflects them into table schemas, reads the live catalog, computes
//! the difference and renders ordered DDL for PostgreSQL or SQL Server.
//!
//! # Quick Start
//!
//! Use the high-level API via the [`api`] module or [`prelude`]:
//!
//! ```no_run
//! use modelsync::prelude::*;
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
//! # Modules
//!
//! - [`api`] - High-level API mirroring CLI commands
//! - [`model`] - Entity declarations and table schemas
//! - [`reflect`] - Entity model to table schemas
//! - [`catalog`] - Live catalog inspection
//! - [`diff`] - Schema comparison and change ordering
//! - [`sqlgen`] - DDL rendering per dialect
//! - [`apply`] - Best-effort statement execution

pub mod api;
pub mod apply;
pub mod catalog;
pub mod diff;
pub mod drift;
pub mod lint;
pub mod loader;
pub mod model;
pub mod pg;
pub mod prelude;
pub mod reflect;
pub mod resolve;
pub mod sqlgen;
pub mod sync;
pub mod types;
pub mod util;

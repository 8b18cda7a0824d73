//! PostgreSQL catalog reader and statement executor over a sqlx pool.

pub mod catalog;
pub mod connection;
pub mod executor;

pub use catalog::PgCatalog;
pub use connection::PgConnection;
pub use executor::PgExecutor;

/// Schema inspected and written when none is given.
pub const DEFAULT_SCHEMA: &str = "public";

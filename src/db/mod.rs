//! Database layer
//!
//! Folio keeps its data in an embedded SQLite database. Repositories are
//! defined as traits in `repositories` and implemented on top of the shared
//! `DynDatabasePool`.
//!
//! ```ignore
//! use folio::config::DatabaseConfig;
//! use folio::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, create_test_pool, DatabasePool, DynDatabasePool, SqliteDatabase};

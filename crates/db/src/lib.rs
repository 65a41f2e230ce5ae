//! Result-typed persistence boundary for jobs and batches.
//!
//! [`JobRepository`] is the only surface the service layer sees. Two
//! implementations ship:
//!
//! - [`PgJobRepository`] — the durable store, conditional writes via
//!   `UPDATE ... WHERE status = $expected`.
//! - [`MemoryJobRepository`] — mutex-guarded maps with the same
//!   conditional-write semantics, for tests and credential-less
//!   environments.

use sqlx::postgres::PgPoolOptions;

pub mod error;
pub mod memory;
pub mod postgres;
pub mod repository;

pub use error::RepoError;
pub use memory::MemoryJobRepository;
pub use postgres::PgJobRepository;
pub use repository::{BatchProgressUpdate, JobRepository, JobStatusUpdate};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Apply embedded migrations to the target database.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

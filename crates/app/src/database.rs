//! Database connection management

use sqlx::{
    PgPool, Postgres, Transaction,
    error::ErrorKind,
    migrate::MigrateError,
};

#[derive(Debug, Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Begin a request-scoped transaction.
    ///
    /// # Errors
    ///
    /// Returns an error when starting the transaction fails.
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }

    /// Returns the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Connect to `PostgreSQL`.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPool::connect(database_url).await
}

/// Apply pending schema migrations.
///
/// # Errors
///
/// Returns an error if a migration fails to apply.
pub async fn migrate(pool: &PgPool) -> Result<(), MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await
}

/// Whether `error` is a unique violation of the named constraint.
pub(crate) fn is_unique_violation_on(error: &sqlx::Error, constraint: &str) -> bool {
    error.as_database_error().is_some_and(|db_error| {
        matches!(db_error.kind(), ErrorKind::UniqueViolation)
            && db_error.constraint() == Some(constraint)
    })
}

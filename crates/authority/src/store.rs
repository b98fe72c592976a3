//! Persistence seam.
//!
//! The directories and the token authority only need a handful of storage
//! primitives from SeaORM: insert with a distinguishable unique violation,
//! keyed lookup, delete returning the affected row count, and a transaction
//! scope. Everything engine-specific lives here.

use crate::error::OAuth2Error;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr, SqlErr};
use std::time::Duration;

/// Whether a failed write breached a unique index or primary key.
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Map a failed insert onto `duplicate` when it was a uniqueness breach,
/// otherwise onto a storage failure.
pub(crate) fn unique_violation_as(duplicate: OAuth2Error) -> impl FnOnce(DbErr) -> OAuth2Error {
    move |err| {
        if is_unique_violation(&err) {
            duplicate
        } else {
            OAuth2Error::Storage(err)
        }
    }
}

/// Open the database the authority persists to.
///
/// An in-memory SQLite database only exists per connection, so its pool is
/// pinned to a single connection; concurrent transactions then queue on it.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(database_url.to_owned());
    options
        .acquire_timeout(Duration::from_secs(30))
        .sqlx_logging(false);
    if database_url.starts_with("sqlite") && database_url.contains(":memory:") {
        options.max_connections(1).min_connections(1);
    }
    Database::connect(options).await
}

/// Bring the schema up to date.
pub async fn migrate(db: &DatabaseConnection) -> Result<(), DbErr> {
    Migrator::up(db, None).await
}

//! SQLite persistence for the sync engine
//!
//! SeaORM entities and queries for the translation store, the remote Workshop
//! metadata and the two sync caches.

mod connection;
mod entities;
mod migration;
mod migrations;
mod queries;
mod stores;

use sea_orm::DatabaseConnection;
use std::path::Path;

use crate::error::ApiError;

pub use connection::{open_connection_async, open_memory_connection_async};
pub use migrations::{apply_migrations_async, is_schema_compatible};
pub use queries::{
    AnalysisCacheQueries, GameInstallationQueries, NewUnitRow, ProjectQueries,
    ScanCacheQueries, TranslationQueries, WorkshopModQueries,
};
pub(crate) use queries::now_epoch;
pub use stores::{SqlAnalysisCache, SqlScanCache};

/// Open the database file, bring the schema up to date and verify it
pub async fn open_database(db_path: &Path) -> Result<DatabaseConnection, ApiError> {
    let conn = open_connection_async(db_path).await?;
    apply_migrations_async(&conn).await?;
    if !is_schema_compatible(&conn).await? {
        return Err(ApiError::migration_failed(format!(
            "Database at {} has an incompatible schema",
            db_path.display()
        )));
    }
    Ok(conn)
}

/// In-memory database with the schema applied
#[cfg(test)]
pub async fn test_database() -> DatabaseConnection {
    let conn = open_memory_connection_async()
        .await
        .expect("Failed to open in-memory database");
    apply_migrations_async(&conn)
        .await
        .expect("Failed to apply migrations");
    conn
}

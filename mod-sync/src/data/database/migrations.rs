//! Database schema migrations

use crate::error::ApiError;
use crate::logger;
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, Statement};
use sea_orm_migration::MigratorTrait;

use super::migration::Migrator;

/// Apply all pending migrations to bring the database up to date
pub async fn apply_migrations_async(conn: &DatabaseConnection) -> Result<(), ApiError> {
    Migrator::up(conn, None)
        .await
        .map_err(|e| ApiError::migration_failed(format!("Migration failed: {}", e)))?;
    logger::log_info("Database schema is up to date", Some("database"));
    Ok(())
}

/// Returns `false` when a table the sync engine writes to lacks a column the entity
/// model expects. `CREATE TABLE IF NOT EXISTS` silently keeps such tables when the
/// database was created by an older build.
pub async fn is_schema_compatible(conn: &DatabaseConnection) -> Result<bool, ApiError> {
    const EXPECTED: &[(&str, &str)] = &[
        ("projects", "source_mod_updated"),
        ("projects", "mod_steam_id"),
        ("translation_units", "source_loc_file"),
        ("translation_units", "is_obsolete"),
        ("mod_update_analysis_cache", "reactivated_units_count"),
    ];

    for (table, column) in EXPECTED {
        let row = conn
            .query_one(Statement::from_sql_and_values(
                DatabaseBackend::Sqlite,
                "SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?",
                [(*table).into(), (*column).into()],
            ))
            .await
            .map_err(ApiError::from)?;

        let count: i64 = row
            .map(|r| r.try_get_by_index(0).unwrap_or(0i64))
            .unwrap_or(0);
        if count == 0 {
            logger::log_warn(
                &format!("Column {}.{} is missing", table, column),
                Some("database"),
            );
            return Ok(false);
        }
    }

    Ok(true)
}

//! SQLite connections: pooled file database or private in-memory database

use crate::error::{ApiError, ApiErrorCode};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use std::path::Path;
use std::time::Duration;

const CONNECT_TIMEOUT_SECS: u64 = 10;

fn sqlite_url(db_path: &Path) -> String {
    let normalized = db_path.to_string_lossy().replace('\\', "/");
    format!("sqlite://{}?mode=rwc", normalized)
}

/// Applied to every file-backed connection. WAL lets a UI read while a scan writes;
/// the busy timeout covers locks held by that UI process.
const FILE_PRAGMAS: &[&str] = &[
    "PRAGMA journal_mode=WAL;",
    "PRAGMA foreign_keys=ON;",
    "PRAGMA busy_timeout=5000;",
    "PRAGMA synchronous=NORMAL;",
    "PRAGMA temp_store=MEMORY;",
];

async fn run_pragmas(db: &DatabaseConnection, pragmas: &[&str]) -> Result<(), ApiError> {
    for pragma in pragmas {
        db.execute_unprepared(pragma).await.map_err(|e| {
            ApiError::with_details(ApiErrorCode::DatabaseError, e.to_string(), *pragma)
        })?;
    }
    Ok(())
}

/// Open (creating when missing) the database file and its parent folder
pub async fn open_connection_async(db_path: &Path) -> Result<DatabaseConnection, ApiError> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ApiError::with_details(
                ApiErrorCode::DatabaseError,
                format!("Cannot create database folder: {}", e),
                parent.display().to_string(),
            )
        })?;
    }

    let mut options = ConnectOptions::new(sqlite_url(db_path));
    options
        .max_connections(5)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .sqlx_logging(false);

    let db = Database::connect(options).await.map_err(|e| {
        ApiError::database(format!("Cannot open {}: {}", db_path.display(), e))
    })?;
    run_pragmas(&db, FILE_PRAGMAS).await?;
    Ok(db)
}

/// Private in-memory database; gone when the connection drops
pub async fn open_memory_connection_async() -> Result<DatabaseConnection, ApiError> {
    let db = Database::connect("sqlite::memory:")
        .await
        .map_err(|e| ApiError::database(format!("Cannot open in-memory database: {}", e)))?;
    run_pragmas(&db, &["PRAGMA foreign_keys=ON;"]).await?;
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, Statement};

    #[test]
    fn test_sqlite_url_normalizes_separators() {
        let url = sqlite_url(Path::new("C:\\Users\\me\\twmt.db"));
        assert_eq!(url, "sqlite://C:/Users/me/twmt.db?mode=rwc");
    }

    #[tokio::test]
    async fn test_open_memory_connection() {
        let conn = open_memory_connection_async()
            .await
            .expect("Failed to open in-memory connection");
        let row = conn
            .query_one(Statement::from_string(
                DatabaseBackend::Sqlite,
                "PRAGMA foreign_keys".to_string(),
            ))
            .await
            .expect("Failed to query PRAGMA");
        let fk_enabled: i32 = row.unwrap().try_get_by_index(0).unwrap_or(0);
        assert_eq!(fk_enabled, 1);
    }

    #[tokio::test]
    async fn test_open_file_connection_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("twmt.db");
        let _conn = open_connection_async(&path).await.unwrap();
        assert!(path.exists());
    }
}

//! `KeyedCache` implementations backed by the cache tables

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use std::collections::HashMap;

use super::queries::{AnalysisCacheQueries, ScanCacheQueries};
use crate::core::cache::KeyedCache;
use crate::error::ApiResult;
use crate::models::{AnalysisCacheEntry, AnalysisCacheKey, ScanCacheEntry};

/// Scan cache in `mod_scan_cache`, keyed by archive path
#[derive(Clone)]
pub struct SqlScanCache {
    conn: DatabaseConnection,
}

impl SqlScanCache {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl KeyedCache<String, ScanCacheEntry> for SqlScanCache {
    async fn get_many(&self, keys: &[String]) -> ApiResult<HashMap<String, ScanCacheEntry>> {
        ScanCacheQueries::get_by_paths(&self.conn, keys).await
    }

    async fn upsert_many(&self, entries: Vec<(String, ScanCacheEntry)>) -> ApiResult<()> {
        let entries = entries
            .into_iter()
            .map(|(path, mut entry)| {
                entry.archive_path = path;
                entry
            })
            .collect();
        ScanCacheQueries::upsert_batch(&self.conn, entries).await
    }
}

/// Analysis cache in `mod_update_analysis_cache`, keyed by (project, archive path)
#[derive(Clone)]
pub struct SqlAnalysisCache {
    conn: DatabaseConnection,
}

impl SqlAnalysisCache {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl KeyedCache<AnalysisCacheKey, AnalysisCacheEntry> for SqlAnalysisCache {
    async fn get_many(
        &self,
        keys: &[AnalysisCacheKey],
    ) -> ApiResult<HashMap<AnalysisCacheKey, AnalysisCacheEntry>> {
        AnalysisCacheQueries::get_many(&self.conn, keys).await
    }

    async fn upsert_many(
        &self,
        entries: Vec<(AnalysisCacheKey, AnalysisCacheEntry)>,
    ) -> ApiResult<()> {
        let entries = entries
            .into_iter()
            .map(|(key, mut entry)| {
                entry.project_id = key.project_id;
                entry.archive_path = key.archive_path;
                entry
            })
            .collect();
        AnalysisCacheQueries::upsert_many(&self.conn, entries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::CacheValidity;
    use crate::data::database::test_database;

    #[tokio::test]
    async fn test_sql_scan_cache_validity_lookup() {
        let conn = test_database().await;
        let cache = SqlScanCache::new(conn);
        let key = "/mods/5/x.pack".to_string();
        cache
            .upsert(
                key.clone(),
                ScanCacheEntry {
                    id: uuid::Uuid::new_v4().to_string(),
                    archive_path: String::new(),
                    last_modified: 100,
                    has_loc_content: true,
                    scanned_at: 1,
                },
            )
            .await
            .unwrap();

        let hit = cache.get(&key).await.unwrap().unwrap();
        assert_eq!(hit.archive_path, key);
        assert!(hit.has_loc_content);
        assert!(hit.is_valid_for(100));
        assert!(!hit.is_valid_for(101));
    }
}

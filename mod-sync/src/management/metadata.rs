//! Remote metadata merge
//!
//! Fresh catalog data wins and is persisted; otherwise the stored record is used;
//! otherwise a title is derived from the pack name. Every mod ends up with a title.

use sea_orm::DatabaseConnection;
use std::collections::HashMap;
use std::sync::Arc;

use crate::data::database::WorkshopModQueries;
use crate::logger;
use crate::models::{MergedModMetadata, MetadataSource, ModArchiveRecord, RemoteModRecord};
use crate::services::RemoteCatalog;

const CONTEXT: &str = "workshop";

/// `my_cool-mod.pack` -> `My Cool Mod`
pub fn humanize_title(archive_base_name: &str) -> String {
    let name = archive_base_name.trim();
    let name = if name.to_ascii_lowercase().ends_with(".pack") {
        &name[..name.len() - ".pack".len()]
    } else {
        name
    };

    name.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn merge_one(
    record: &ModArchiveRecord,
    fresh: Option<&RemoteModRecord>,
    cached: Option<&RemoteModRecord>,
) -> MergedModMetadata {
    let previous_time_updated = cached.map(|c| c.time_updated);
    match (fresh, cached) {
        (Some(remote), _) => MergedModMetadata {
            workshop_id: record.workshop_id.clone(),
            title: remote.title.clone(),
            subscriptions: remote.subscriptions,
            time_updated: Some(remote.time_updated),
            preview_url: remote.preview_url.clone(),
            source: MetadataSource::Remote,
            previous_time_updated,
        },
        (None, Some(stored)) => MergedModMetadata {
            workshop_id: record.workshop_id.clone(),
            title: stored.title.clone(),
            subscriptions: stored.subscriptions,
            time_updated: Some(stored.time_updated),
            preview_url: stored.preview_url.clone(),
            source: MetadataSource::Cached,
            previous_time_updated,
        },
        (None, None) => MergedModMetadata {
            workshop_id: record.workshop_id.clone(),
            title: humanize_title(&record.archive_base_name),
            subscriptions: None,
            time_updated: None,
            preview_url: None,
            source: MetadataSource::Derived,
            previous_time_updated: None,
        },
    }
}

pub struct RemoteMetadataMerger {
    conn: DatabaseConnection,
    catalog: Arc<dyn RemoteCatalog>,
}

impl RemoteMetadataMerger {
    pub fn new(conn: DatabaseConnection, catalog: Arc<dyn RemoteCatalog>) -> Self {
        Self { conn, catalog }
    }

    /// Merged metadata keyed by Workshop id. Never fails: storage and network
    /// problems only lower the tier a mod's data comes from.
    pub async fn merge(
        &self,
        records: &[ModArchiveRecord],
        app_id: Option<&str>,
    ) -> HashMap<String, MergedModMetadata> {
        if records.is_empty() {
            return HashMap::new();
        }
        let ids: Vec<String> = records.iter().map(|r| r.workshop_id.clone()).collect();

        let cached = match WorkshopModQueries::get_many(&self.conn, &ids).await {
            Ok(cached) => cached,
            Err(e) => {
                logger::log_warn(
                    &format!("Stored Workshop metadata unavailable: {}", e),
                    Some(CONTEXT),
                );
                HashMap::new()
            }
        };

        let fresh = match app_id {
            Some(app_id) => match self.catalog.fetch_batch(&ids, app_id).await {
                Ok(fresh) => fresh,
                Err(e) => {
                    logger::log_warn(
                        &format!("Workshop lookup failed, using stored metadata: {}", e),
                        Some(CONTEXT),
                    );
                    HashMap::new()
                }
            },
            None => {
                logger::log_warn(
                    "No Steam app id for this game, skipping Workshop lookup",
                    Some(CONTEXT),
                );
                HashMap::new()
            }
        };

        if !fresh.is_empty() {
            let to_store: Vec<RemoteModRecord> = fresh.values().cloned().collect();
            if let Err(e) = WorkshopModQueries::upsert_many(&self.conn, &to_store).await {
                logger::log_warn(
                    &format!("Failed to store Workshop metadata: {}", e),
                    Some(CONTEXT),
                );
            }
        }

        records
            .iter()
            .map(|record| {
                let merged = merge_one(
                    record,
                    fresh.get(&record.workshop_id),
                    cached.get(&record.workshop_id),
                );
                (record.workshop_id.clone(), merged)
            })
            .collect()
    }
}

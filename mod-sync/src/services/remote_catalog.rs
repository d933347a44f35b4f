//! Remote Workshop catalog (Steam Web API)

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::SyncConfig;
use crate::error::{ApiError, ApiResult};
use crate::logger;
use crate::models::RemoteModRecord;

/// Items per `GetPublishedFileDetails` request
const DETAILS_BATCH: usize = 100;

/// `result` value Steam uses for a found item
const STEAM_RESULT_OK: i64 = 1;

/// Batch lookup of Workshop item metadata.
///
/// Best effort: ids missing from the returned map could not be fetched. An `Err`
/// means nothing at all could be fetched.
#[async_trait]
pub trait RemoteCatalog: Send + Sync {
    async fn fetch_batch(
        &self,
        workshop_ids: &[String],
        app_id: &str,
    ) -> ApiResult<HashMap<String, RemoteModRecord>>;
}

#[derive(Debug, Deserialize)]
struct DetailsEnvelope {
    response: DetailsResponse,
}

#[derive(Debug, Default, Deserialize)]
struct DetailsResponse {
    #[serde(default)]
    publishedfiledetails: Vec<PublishedFileDetails>,
}

#[derive(Debug, Deserialize)]
struct PublishedFileDetails {
    publishedfileid: String,
    #[serde(default)]
    result: i64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    subscriptions: Option<i64>,
    #[serde(default)]
    time_updated: Option<i64>,
    #[serde(default)]
    preview_url: Option<String>,
}

fn records_from_details(
    details: Vec<PublishedFileDetails>,
    app_id: &str,
    checked_at: i64,
) -> HashMap<String, RemoteModRecord> {
    details
        .into_iter()
        .filter(|item| item.result == STEAM_RESULT_OK)
        .filter_map(|item| {
            let time_updated = item.time_updated?;
            let title = item
                .title
                .filter(|title| !title.trim().is_empty())
                .unwrap_or_else(|| item.publishedfileid.clone());
            Some((
                item.publishedfileid.clone(),
                RemoteModRecord {
                    workshop_id: item.publishedfileid,
                    app_id: app_id.to_string(),
                    title,
                    subscriptions: item.subscriptions,
                    time_updated,
                    preview_url: item.preview_url.filter(|url| !url.is_empty()),
                    last_checked_at: checked_at,
                },
            ))
        })
        .collect()
}

pub struct SteamWorkshopCatalog {
    client: reqwest::Client,
    api_url: String,
}

impl SteamWorkshopCatalog {
    pub fn new(config: &SyncConfig) -> ApiResult<Self> {
        Self::with_endpoint(config.steam_api_url.clone(), config.remote_fetch_timeout())
    }

    pub fn with_endpoint(api_url: String, timeout: Duration) -> ApiResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("TWMT Mod Sync/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, api_url })
    }

    async fn fetch_chunk(
        &self,
        chunk: &[String],
        app_id: &str,
    ) -> ApiResult<HashMap<String, RemoteModRecord>> {
        let mut form: Vec<(String, String)> = Vec::with_capacity(chunk.len() + 1);
        form.push(("itemcount".to_string(), chunk.len().to_string()));
        for (index, id) in chunk.iter().enumerate() {
            form.push((format!("publishedfileids[{}]", index), id.clone()));
        }

        let response = self
            .client
            .post(&self.api_url)
            .form(&form)
            .send()
            .await
            .map_err(ApiError::from)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ApiError::network(format!(
                "Workshop API returned status: {} ({})",
                status,
                error_text.chars().take(200).collect::<String>()
            )));
        }

        let envelope = response.json::<DetailsEnvelope>().await.map_err(|e| {
            ApiError::network(format!("Failed to parse Workshop API response: {}", e))
        })?;

        Ok(records_from_details(
            envelope.response.publishedfiledetails,
            app_id,
            chrono::Utc::now().timestamp(),
        ))
    }
}

#[async_trait]
impl RemoteCatalog for SteamWorkshopCatalog {
    async fn fetch_batch(
        &self,
        workshop_ids: &[String],
        app_id: &str,
    ) -> ApiResult<HashMap<String, RemoteModRecord>> {
        let mut result = HashMap::with_capacity(workshop_ids.len());
        if workshop_ids.is_empty() {
            return Ok(result);
        }

        let mut last_error = None;
        let mut any_success = false;
        for chunk in workshop_ids.chunks(DETAILS_BATCH) {
            match self.fetch_chunk(chunk, app_id).await {
                Ok(records) => {
                    any_success = true;
                    result.extend(records);
                }
                Err(e) => {
                    logger::log_warn(
                        &format!("Workshop lookup failed for {} ids: {}", chunk.len(), e),
                        Some("workshop"),
                    );
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !any_success => Err(e),
            _ => {
                crate::log_debug!(
                    &format!(
                        "Workshop lookup returned {}/{} items",
                        result.len(),
                        workshop_ids.len()
                    ),
                    "workshop"
                );
                Ok(result)
            }
        }
    }
}

use crate::city::City;
use crate::config::SourceConfig;
use crate::errors::{IngestError, Result};
use crate::models::{StreetDetail, StreetSummary};
use crate::source::StreetSource;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(Debug, Deserialize)]
struct SearchResponse<T> {
    success: bool,
    result: Option<SearchResult<T>>,
}

#[derive(Debug, Deserialize)]
struct SearchResult<T> {
    records: Vec<T>,
    #[serde(default)]
    total: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct IdRecord {
    #[serde(rename = "_id")]
    id: u64,
}

/// Street row as the catalog returns it; text columns come space-padded
#[derive(Debug, Deserialize)]
struct CatalogRecord {
    #[serde(rename = "_id")]
    id: u64,
    region_code: u32,
    region_name: String,
    city_code: u32,
    city_name: String,
    street_code: u32,
    street_name: String,
    street_name_status: Option<String>,
    official_code: Option<u64>,
}

impl From<CatalogRecord> for StreetDetail {
    fn from(record: CatalogRecord) -> Self {
        StreetDetail {
            street_id: record.id,
            region_code: record.region_code,
            region_name: record.region_name.trim().to_string(),
            city_code: record.city_code,
            city_name: record.city_name.trim().to_string(),
            street_code: record.street_code,
            street_name: record.street_name.trim().to_string(),
            street_name_status: record
                .street_name_status
                .map(|status| status.trim().to_string()),
            official_code: record.official_code,
        }
    }
}

/// Client for the data.gov.il CKAN `datastore_search` endpoint
pub struct CatalogClient {
    base_url: String,
    resource_id: String,
    page_limit: u32,
    client: Client,
}

impl CatalogClient {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| IngestError::SourceUnavailable(format!("HTTP client: {}", e)))?;

        Ok(CatalogClient {
            base_url: config.base_url.clone(),
            resource_id: config.resource_id.clone(),
            page_limit: config.page_limit,
            client,
        })
    }

    async fn search<T: DeserializeOwned>(
        &self,
        filters: serde_json::Value,
        offset: u64,
        limit: u32,
    ) -> Result<SearchResult<T>> {
        let request = json!({
            "resource_id": self.resource_id,
            "filters": filters,
            "offset": offset,
            "limit": limit,
        });

        let response = self
            .client
            .post(&self.base_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Street catalog request failed: {}", e);
                IngestError::SourceUnavailable(format!("Catalog request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(IngestError::SourceUnavailable(format!(
                "Catalog returned status {}: {}",
                status, error_text
            )));
        }

        let body = response.json::<SearchResponse<T>>().await.map_err(|e| {
            IngestError::SourceUnavailable(format!("Failed to parse catalog response: {}", e))
        })?;

        parse_search(body)
    }
}

fn parse_search<T>(body: SearchResponse<T>) -> Result<SearchResult<T>> {
    match body {
        SearchResponse {
            success: true,
            result: Some(result),
        } => Ok(result),
        _ => Err(IngestError::SourceUnavailable(
            "Catalog reported an unsuccessful search".to_string(),
        )),
    }
}

#[async_trait]
impl StreetSource for CatalogClient {
    async fn list_streets(&self, city: City) -> Result<Vec<StreetSummary>> {
        let filters = json!({ "city_name": city.catalog_name() });
        let mut streets = Vec::new();
        let mut offset = 0u64;

        loop {
            let page = self
                .search::<IdRecord>(filters.clone(), offset, self.page_limit)
                .await?;
            let fetched = page.records.len() as u64;
            streets.extend(
                page.records
                    .into_iter()
                    .map(|record| StreetSummary { street_id: record.id }),
            );
            offset += fetched;

            debug!("Fetched {} streets of {} (offset {})", fetched, city, offset);

            let exhausted = fetched < u64::from(self.page_limit)
                || page.total.map_or(false, |total| offset >= total);
            if exhausted {
                break;
            }
        }

        info!("Catalog lists {} streets in {}", streets.len(), city);
        Ok(streets)
    }

    async fn get_detail(&self, street_id: u64) -> Result<StreetDetail> {
        let page = self
            .search::<CatalogRecord>(json!({ "_id": street_id }), 0, 1)
            .await?;

        page.records
            .into_iter()
            .next()
            .map(StreetDetail::from)
            .ok_or(IngestError::StreetNotFound(street_id))
    }
}

use crate::city::City;
use crate::errors::Result;
use crate::models::{StreetDetail, StreetSummary};
use async_trait::async_trait;

/// Street catalog lookups. No retries: any failure aborts the publishing run.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StreetSource: Send + Sync {
    /// Every street of a city, in catalog order
    async fn list_streets(&self, city: City) -> Result<Vec<StreetSummary>>;

    /// Full record of one street
    async fn get_detail(&self, street_id: u64) -> Result<StreetDetail>;
}

use crate::errors::Result;
use crate::models::StreetDetail;
use async_trait::async_trait;

/// Document store. Inserts are not idempotent; a redelivered record may be stored twice.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentSink: Send + Sync {
    async fn insert_one(&self, detail: &StreetDetail) -> Result<()>;
}

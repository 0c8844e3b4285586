// Fetch seam for per-source batch responses
use crate::domain::record::BatchResponse;
use crate::infrastructure::config::SourceConfig;
use async_trait::async_trait;

#[async_trait]
pub trait BatchSource: Send + Sync {
    /// Fetch the whole batch for one configured source
    async fn fetch_batch(&self, source: &SourceConfig) -> anyhow::Result<BatchResponse>;
}

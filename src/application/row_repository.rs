// Repository trait for flat source rows
use crate::domain::record::SourceRow;
use async_trait::async_trait;

#[async_trait]
pub trait RowRepository: Send + Sync {
    /// Every stored row, unclassified
    async fn fetch_rows(&self) -> anyhow::Result<Vec<SourceRow>>;
}

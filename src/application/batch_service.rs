// Batch service - Use case for classifying stored rows into a batch response
use crate::application::progress::EventSink;
use crate::application::row_repository::RowRepository;
use crate::domain::record::{classify, BatchResponse, Discriminator};
use std::sync::Arc;

#[derive(Clone)]
pub struct BatchService {
    repository: Arc<dyn RowRepository>,
    discriminator: Discriminator,
}

impl BatchService {
    pub fn new(repository: Arc<dyn RowRepository>, discriminator: Discriminator) -> Self {
        Self {
            repository,
            discriminator,
        }
    }

    /// Classify every stored row. Skipped rows are reported to `log`.
    pub async fn build_batch(&self, log: &dyn EventSink) -> anyhow::Result<BatchResponse> {
        let rows = self.repository.fetch_rows().await?;
        let classification = classify(&rows, &self.discriminator);

        for condition in &classification.diagnostics {
            log.diagnostic("classifier", condition);
        }
        tracing::debug!(
            "Classified {} of {} rows into {} dates",
            classification.batch.record_count(),
            rows.len(),
            classification.batch.response.len()
        );

        Ok(classification.batch)
    }
}

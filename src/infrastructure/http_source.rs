// HTTP batch source implementation
use crate::application::batch_source::BatchSource;
use crate::domain::record::BatchResponse;
use crate::infrastructure::config::SourceConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;

#[derive(Debug, Clone, Default)]
pub struct HttpBatchSource {
    client: reqwest::Client,
}

impl HttpBatchSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BatchSource for HttpBatchSource {
    async fn fetch_batch(&self, source: &SourceConfig) -> Result<BatchResponse> {
        tracing::debug!("Fetching batch for {} from {}", source.id, source.url);

        let response = self
            .client
            .get(&source.url)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", source.url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Source {} answered with status {}: {}", source.id, status, body);
        }

        let batch = response
            .json::<BatchResponse>()
            .await
            .with_context(|| format!("Failed to parse batch from {}", source.url))?;

        tracing::debug!(
            "Source {} delivered {} records over {} dates",
            source.id,
            batch.record_count(),
            batch.response.len()
        );
        Ok(batch)
    }
}

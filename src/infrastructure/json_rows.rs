// File-backed row repository
use crate::application::row_repository::RowRepository;
use crate::domain::record::SourceRow;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;

/// Reads a JSON array of flat rows on every fetch
#[derive(Debug, Clone)]
pub struct JsonRowRepository {
    path: PathBuf,
}

impl JsonRowRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RowRepository for JsonRowRepository {
    async fn fetch_rows(&self) -> Result<Vec<SourceRow>> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("Failed to read rows from {}", self.path.display()))?;

        serde_json::from_slice(&bytes).with_context(|| format!("Failed to parse rows in {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_rows_from_file() {
        let path = std::env::temp_dir().join(format!("climate-rows-{}.json", std::process::id()));
        tokio::fs::write(&path, r#"[{ "TypeSet": "Particle", "Measure1": 3 }]"#).await.unwrap();

        let rows = JsonRowRepository::new(&path).fetch_rows().await.unwrap();
        tokio::fs::remove_file(&path).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["TypeSet"], "Particle");
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let repository = JsonRowRepository::new("/nonexistent/climate-rows.json");
        assert!(repository.fetch_rows().await.is_err());
    }
}

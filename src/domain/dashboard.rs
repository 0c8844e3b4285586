// Dashboard domain model
use super::chart::ChartData;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    /// Active range description, `All` when unfiltered
    pub range: String,
    pub charts: Vec<ChartData>,
}

impl Dashboard {
    pub fn new(range: String, charts: Vec<ChartData>) -> Self {
        Self { range, charts }
    }

    pub fn chart(&self, id: &str) -> Option<&ChartData> {
        self.charts.iter().find(|c| c.id == id)
    }
}

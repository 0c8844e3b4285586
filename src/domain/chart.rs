// Render-ready chart structures handed to the drawing collaborator
use crate::domain::series::{ChartPoint, SeriesId};
use serde::Serialize;

pub const DEFAULT_CHART_TYPE: &str = "splineArea";
pub const DEFAULT_MARKER_SIZE: u32 = 8;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDataset {
    pub series_id: SeriesId,
    pub label: String,
    pub color: Option<String>,
    pub marker_size: u32,
    #[serde(rename = "data")]
    pub points: Vec<ChartPoint>,
}

impl ChartDataset {
    pub fn new(
        series_id: SeriesId,
        label: String,
        color: Option<String>,
        marker_size: u32,
        points: Vec<ChartPoint>,
    ) -> Self {
        Self {
            series_id,
            label,
            color,
            marker_size,
            points,
        }
    }

    /// Same dataset metadata carrying a different view of the points
    pub fn with_points(&self, points: Vec<ChartPoint>) -> Self {
        Self {
            points,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    pub id: String,
    pub source: String,
    pub title: String,
    pub axis_label: String,
    pub value_format: Option<String>,
    pub chart_type: String,
    pub datasets: Vec<ChartDataset>,
}

impl ChartData {
    pub fn dataset(&self, label: &str) -> Option<&ChartDataset> {
        self.datasets.iter().find(|d| d.label == label)
    }

    pub fn point_count(&self) -> usize {
        self.datasets.iter().map(|d| d.points.len()).sum()
    }
}

// Application state for HTTP handlers
use crate::application::batch_service::BatchService;
use crate::application::chart_service::ChartService;

#[derive(Clone)]
pub struct AppState {
    pub chart_service: ChartService,
    /// Absent when no row feed is configured
    pub batch_service: Option<BatchService>,
}

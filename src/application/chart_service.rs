// Chart service - Use case for building the chart dashboard on request
use crate::application::chart_view::ChartView;
use crate::application::pipeline::ChartPipeline;
use crate::application::progress::{ProgressEntry, ProgressLog};
use crate::domain::dashboard::Dashboard;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Default)]
pub struct ChartQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    pub daily: bool,
}

#[derive(Clone)]
pub struct ChartService {
    pipeline: ChartPipeline,
    range_format: Option<String>,
    last_progress: Arc<Mutex<Vec<ProgressEntry>>>,
}

impl ChartService {
    pub fn new(pipeline: ChartPipeline, range_format: Option<String>) -> Self {
        Self {
            pipeline,
            range_format,
            last_progress: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Rebuild every chart from fresh batches, then apply the requested view.
    /// A rejected range leaves the charts unfiltered.
    pub async fn build_dashboard(&self, query: &ChartQuery) -> Dashboard {
        let log = ProgressLog::new();
        let run = self.pipeline.run(&log).await;
        let mut view = ChartView::new(run, self.range_format.clone());

        if let (Some(start), Some(end)) = (&query.start, &query.end) {
            if let Err(e) = view.apply_date_filter(start, end, &log) {
                tracing::debug!("Keeping unfiltered view: {}", e);
            }
        }

        let dashboard = if query.daily {
            Dashboard::new(view.describe_range(), view.daily_averages(&log))
        } else {
            view.dashboard()
        };

        *self.last_progress.lock().unwrap_or_else(PoisonError::into_inner) = log.entries();
        dashboard
    }

    /// Progress entries of the most recent build
    pub fn last_progress(&self) -> Vec<ProgressEntry> {
        self.last_progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

// Chart view - date filtering, reset and daily averages over one pipeline run
use crate::application::pipeline::PipelineRun;
use crate::application::progress::EventSink;
use crate::domain::chart::ChartData;
use crate::domain::daily::average_by_day;
use crate::domain::dashboard::Dashboard;
use crate::domain::error::PipelineResult;
use crate::domain::ordering::{filter_by_range, is_sentinel};
use crate::domain::timestamp::{describe_range, DateRange, SourceFormats};
use std::collections::BTreeMap;

/// Built charts plus the view currently shown. The built charts are never
/// modified; every filter starts again from them.
#[derive(Debug, Clone)]
pub struct ChartView {
    built: Vec<ChartData>,
    formats: BTreeMap<String, SourceFormats>,
    range_format: Option<String>,
    range: Option<DateRange>,
    current: Vec<ChartData>,
}

impl ChartView {
    pub fn new(run: PipelineRun, range_format: Option<String>) -> Self {
        Self {
            current: run.charts.clone(),
            built: run.charts,
            formats: run.formats,
            range_format,
            range: None,
        }
    }

    pub fn charts(&self) -> &[ChartData] {
        &self.current
    }

    pub fn describe_range(&self) -> String {
        describe_range(self.range.as_ref())
    }

    pub fn dashboard(&self) -> Dashboard {
        Dashboard::new(self.describe_range(), self.current.clone())
    }

    fn formats_for(&self, chart: &ChartData) -> SourceFormats {
        self.formats.get(&chart.source).cloned().unwrap_or_default()
    }

    /// Restrict every dataset to `start..=end`. An invalid range is rejected
    /// before any dataset is touched and the previous view stays in place.
    pub fn apply_date_filter(&mut self, start: &str, end: &str, log: &dyn EventSink) -> PipelineResult<()> {
        let range = match DateRange::parse(start, end, self.range_format.as_deref()) {
            Ok(range) => range,
            Err(e) => {
                log.diagnostic("filter", &e);
                return Err(e);
            }
        };

        log.update("Applying date filter".to_string());
        let mut filtered = Vec::with_capacity(self.built.len());
        for chart in &self.built {
            let formats = self.formats_for(chart);
            let mut view = chart.clone();
            for dataset in &mut view.datasets {
                match filter_by_range(&dataset.points, &range, &formats) {
                    Ok(points) => {
                        log.update(format!(
                            "=> Reduced {}.{} to {} entries (was {})",
                            chart.id,
                            dataset.label,
                            points.len(),
                            dataset.points.len()
                        ));
                        dataset.points = points;
                    }
                    Err(e) => log.diagnostic(dataset.series_id.as_str(), &e),
                }
            }
            filtered.push(view);
        }

        self.current = filtered;
        self.range = Some(range);
        log.update("Done filtering.".to_string());
        Ok(())
    }

    pub fn reset_filters(&mut self, log: &dyn EventSink) {
        log.update("Resetting filters".to_string());
        self.current = self.built.clone();
        self.range = None;
        log.update("Done filtering.".to_string());
    }

    /// Current view reduced to one averaged point per day. Sentinel datasets
    /// pass through unchanged.
    pub fn daily_averages(&self, log: &dyn EventSink) -> Vec<ChartData> {
        self.current
            .iter()
            .map(|chart| {
                let formats = self.formats_for(chart);
                let mut averaged = chart.clone();
                for dataset in &mut averaged.datasets {
                    if is_sentinel(&dataset.points) {
                        continue;
                    }
                    log.update(format!(
                        "Generating dataset averages with {} entries",
                        dataset.points.len()
                    ));
                    match average_by_day(&dataset.points, &formats) {
                        Ok(points) => dataset.points = points,
                        Err(e) => log.diagnostic(dataset.series_id.as_str(), &e),
                    }
                }
                averaged
            })
            .collect()
    }
}

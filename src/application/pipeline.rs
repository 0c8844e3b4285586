// Chart pipeline - fetch every source, normalize and derive each registration
use crate::application::batch_source::BatchSource;
use crate::application::progress::EventSink;
use crate::domain::chart::{ChartData, ChartDataset};
use crate::domain::error::PipelineError;
use crate::domain::formula::{ArithmeticEvaluator, ExpressionEvaluator};
use crate::domain::metric::DerivedMetric;
use crate::domain::record::BatchResponse;
use crate::domain::series::{ExtremumTracker, MarkerStyle, SeriesBuilder, SeriesId};
use crate::domain::timestamp::SourceFormats;
use crate::infrastructure::config::{RegistrationConfig, SourceConfig};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Countdown over all configured sources, independent of completion order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionBarrier {
    total: usize,
    arrived: usize,
}

impl CompletionBarrier {
    pub fn new(total: usize) -> Self {
        Self { total, arrived: 0 }
    }

    /// Register one finished source; true once every source has arrived
    pub fn arrive(&mut self) -> bool {
        self.arrived = (self.arrived + 1).min(self.total);
        self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        self.arrived == self.total
    }

    pub fn remaining(&self) -> usize {
        self.total - self.arrived
    }
}

/// Everything one run produced, in source declaration order
#[derive(Debug, Clone, Default)]
pub struct PipelineRun {
    pub charts: Vec<ChartData>,
    /// Timestamp layouts per source id, needed to re-parse labels later
    pub formats: BTreeMap<String, SourceFormats>,
    pub failed_sources: Vec<String>,
}

#[derive(Clone)]
pub struct ChartPipeline {
    source: Arc<dyn BatchSource>,
    sources: Vec<SourceConfig>,
    evaluator: Arc<dyn ExpressionEvaluator>,
}

impl ChartPipeline {
    pub fn new(source: Arc<dyn BatchSource>, sources: Vec<SourceConfig>) -> Self {
        Self::with_evaluator(source, sources, Arc::new(ArithmeticEvaluator))
    }

    pub fn with_evaluator(
        source: Arc<dyn BatchSource>,
        sources: Vec<SourceConfig>,
        evaluator: Arc<dyn ExpressionEvaluator>,
    ) -> Self {
        Self {
            source,
            sources,
            evaluator,
        }
    }

    /// Fetch all sources concurrently and process each as soon as it lands.
    /// A failed source contributes no charts; the rest still render.
    pub async fn run(&self, log: &dyn EventSink) -> PipelineRun {
        log.update(format!("Connecting to {} sources", self.sources.len()));

        let mut pending: FuturesUnordered<_> = self
            .sources
            .iter()
            .enumerate()
            .map(|(index, source)| async move { (index, self.source.fetch_batch(source).await) })
            .collect();

        let mut barrier = CompletionBarrier::new(self.sources.len());
        let mut slots: Vec<Option<Vec<ChartData>>> = vec![None; self.sources.len()];
        let mut run = PipelineRun::default();
        if barrier.is_complete() {
            log.update("Done.".to_string());
        }

        while let Some((index, result)) = pending.next().await {
            let source = &self.sources[index];
            match result {
                Ok(batch) => {
                    log.update(format!("Received data from {}", source.id));
                    slots[index] = Some(self.process_source(source, &batch, log));
                    run.formats.insert(source.id.clone(), source.formats());
                }
                Err(e) => {
                    let failure = PipelineError::FetchFailure {
                        source_id: source.id.clone(),
                        message: format!("{:#}", e),
                    };
                    log.diagnostic(&source.id, &failure);
                    run.failed_sources.push(source.id.clone());
                }
            }

            if barrier.arrive() {
                log.update("Done.".to_string());
            } else {
                tracing::debug!("{} sources still pending", barrier.remaining());
            }
        }

        run.charts = slots.into_iter().flatten().flatten().collect();
        run
    }

    /// Build every registration of one source from its batch
    pub fn process_source(&self, source: &SourceConfig, batch: &BatchResponse, log: &dyn EventSink) -> Vec<ChartData> {
        let formats = source.formats();
        if let Err(e) = formats.validate() {
            log.diagnostic(&source.id, &e);
            return Vec::new();
        }

        let known: BTreeSet<&str> = source.registrations.iter().map(RegistrationConfig::bucket).collect();
        for bucket in batch.unknown_buckets(&known) {
            log.diagnostic(&source.id, &PipelineError::UnknownBucketKind(bucket));
        }

        log.update(format!(
            "Adding markers for {} registrations of {}",
            batch.response.len(),
            source.id
        ));
        source
            .registrations
            .iter()
            .map(|registration| self.build_registration(source, &formats, registration, batch, log))
            .collect()
    }

    fn build_registration(
        &self,
        source: &SourceConfig,
        formats: &SourceFormats,
        registration: &RegistrationConfig,
        batch: &BatchResponse,
        log: &dyn EventSink,
    ) -> ChartData {
        let mut builder = SeriesBuilder::new();
        let mut datasets = Vec::with_capacity(registration.sets.len());

        for set in &registration.sets {
            let id = SeriesId::new(&source.id, &registration.id, &set.id);
            log.update(format!("=> {}", id));

            let metric = set.metric(registration.aqi);
            if let DerivedMetric::Formula(spec) = &metric {
                for mismatch in spec.length_mismatches() {
                    log.diagnostic(id.as_str(), &mismatch);
                }
            }

            builder.register(id.clone());
            let mut tracker = ExtremumTracker::default();
            for (date, record) in batch.records_in(registration.bucket()) {
                let key = match formats.normalize(date, record.time.as_deref()) {
                    Ok(key) => key,
                    Err(e) => {
                        log.diagnostic(id.as_str(), &e);
                        continue;
                    }
                };

                let raw = record.measurement(set.field());
                let value = match metric.apply(raw, self.evaluator.as_ref()) {
                    Ok(value) => value,
                    Err(e) => {
                        log.diagnostic(id.as_str(), &e);
                        continue;
                    }
                };
                if raw.is_some() && value.is_none() {
                    tracing::debug!("{}: no derived value for {:?} at {}", id, raw, key.label);
                }

                builder.add_point(&id, value, key.label, &mut tracker);
            }

            // keys arrive in map order, so "most recent" only holds after sorting
            if let Err(e) = builder.sort(&id, formats) {
                log.diagnostic(id.as_str(), &e);
            }
            builder.mark_extrema(&id, &tracker, &MarkerStyle::with_marker_type(set.marker_type.as_deref()));

            datasets.push(ChartDataset::new(
                id.clone(),
                set.label.clone(),
                set.color.clone(),
                set.marker_size(),
                builder.take(&id),
            ));
        }

        log.update(format!(
            "Generating chart '{}' with title '{}'",
            registration.id, registration.title
        ));
        ChartData {
            id: registration.id.clone(),
            source: source.id.clone(),
            title: registration.title.clone(),
            axis_label: registration.label.clone(),
            value_format: registration.label_format.clone(),
            chart_type: registration.chart_type.clone(),
            datasets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::progress::ProgressLog;
    use crate::domain::record::RawRecord;
    use crate::domain::series::{MAX_MARKER_COLOR, MIN_MARKER_COLOR};
    use crate::infrastructure::config::parse_sources_config;
    use approx::assert_relative_eq;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;

    const SOURCES: &str = r#"
[[sources]]
id = "home"
url = "http://home/api"

[[sources.registrations]]
id = "particles"
title = "Air quality"
label = "AQI"
aqi = true

[[sources.registrations.sets]]
id = "pm25"
label = "PM 2.5"
type = 25

[[sources.registrations]]
id = "temperature"
title = "Temperature"
label = "Celsius"

[[sources.registrations.sets]]
id = "temperatureHigh"
label = "High"

[[sources.registrations.sets]]
id = "pressure"
label = "Pressure"

[sources.registrations.sets.formula]
expression = "input / 10"

[[sources]]
id = "cabin"
url = "http://cabin/api"

[[sources.registrations]]
id = "temperature"
title = "Cabin temperature"
label = "Celsius"

[[sources.registrations.sets]]
id = "temperatureHigh"
label = "High"
"#;

    /// In-memory source: per url, an optional delay and a canned result
    struct FakeSource {
        batches: HashMap<String, (u64, Option<BatchResponse>)>,
    }

    #[async_trait]
    impl BatchSource for FakeSource {
        async fn fetch_batch(&self, source: &SourceConfig) -> anyhow::Result<BatchResponse> {
            let (delay_ms, batch) = self
                .batches
                .get(&source.url)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no such source"))?;
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            batch.ok_or_else(|| anyhow::anyhow!("connection refused"))
        }
    }

    fn sensor(time: &str, high: f64, pressure: f64) -> RawRecord {
        RawRecord::new(Some(time.to_string()))
            .with_measurement("temperatureHigh", high)
            .with_measurement("pressure", pressure)
    }

    fn home_batch() -> BatchResponse {
        let mut batch = BatchResponse::default();
        batch.push("02.01.2024".to_string(), "sensors", sensor("00:30:00", 9.0, 1010.0));
        batch.push("01.01.2024".to_string(), "sensors", sensor("10:00:00", 5.0, 1000.0));
        batch.push("01.01.2024".to_string(), "sensors", sensor("11:00:00", 9.0, 1020.0));
        batch.push("01.01.2024".to_string(), "sensors", sensor("12:00:00", 2.0, 990.0));
        batch.push("01.01.2024".to_string(), "sensors", sensor("bogus", 50.0, 0.0));
        batch.push(
            "01.01.2024".to_string(),
            "particles",
            RawRecord::new(Some("10:00:00".to_string())).with_measurement("pm25", 24.0),
        );
        batch.push(
            "01.01.2024".to_string(),
            "weather",
            RawRecord::new(Some("10:00:00".to_string())).with_measurement("wind", 3.0),
        );
        batch
    }

    fn cabin_batch() -> BatchResponse {
        let mut batch = BatchResponse::default();
        batch.push("01.01.2024".to_string(), "sensors", sensor("08:00:00", 15.0, 0.0));
        batch
    }

    fn pipeline(batches: HashMap<String, (u64, Option<BatchResponse>)>) -> ChartPipeline {
        let config = parse_sources_config(SOURCES, config::FileFormat::Toml).unwrap();
        ChartPipeline::new(Arc::new(FakeSource { batches }), config.sources)
    }

    #[test]
    fn test_completion_barrier_counts_all_arrivals() {
        let mut barrier = CompletionBarrier::new(3);
        assert!(!barrier.arrive());
        assert!(!barrier.arrive());
        assert_eq!(barrier.remaining(), 1);
        assert!(barrier.arrive());
        assert!(barrier.arrive());

        assert!(CompletionBarrier::new(0).is_complete());
    }

    #[tokio::test]
    async fn test_run_builds_sorted_marked_series() {
        let pipeline = pipeline(HashMap::from([
            ("http://home/api".to_string(), (0, Some(home_batch()))),
            ("http://cabin/api".to_string(), (0, Some(cabin_batch()))),
        ]));
        let log = ProgressLog::new();

        let run = pipeline.run(&log).await;

        assert_eq!(run.charts.len(), 3);
        let temperature = &run.charts[1];
        assert_eq!(temperature.source, "home");
        let high = temperature.dataset("High").unwrap();
        let labels: Vec<&str> = high.points.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["01 Jan 2024 10:00", "01 Jan 2024 11:00", "01 Jan 2024 12:00", "02 Jan 2024 00:30"]
        );
        // 9.0 appears twice; the later one carries the max marker
        assert_eq!(high.points[3].marker_color.as_deref(), Some(MAX_MARKER_COLOR));
        assert!(!high.points[1].is_marked());
        assert_eq!(high.points[2].marker_color.as_deref(), Some(MIN_MARKER_COLOR));
        assert_eq!(high.series_id.as_str(), "home.temperature.temperatureHigh");

        let pressure = temperature.dataset("Pressure").unwrap();
        assert_relative_eq!(pressure.points[0].value, 100.0);

        let aqi = &run.charts[0].datasets[0];
        assert_relative_eq!(aqi.points[0].value, 75.641, epsilon = 1e-3);

        let conditions: Vec<String> = log.diagnostics().into_iter().filter_map(|d| d.condition).collect();
        assert!(conditions.contains(&"UnknownBucketKind".to_string()));
        assert!(conditions.contains(&"MalformedTimestamp".to_string()));
        assert_eq!(log.entries().last().unwrap().message, "Done.");
    }

    #[tokio::test]
    async fn test_failed_source_keeps_others() {
        let pipeline = pipeline(HashMap::from([
            ("http://home/api".to_string(), (0, None)),
            ("http://cabin/api".to_string(), (0, Some(cabin_batch()))),
        ]));
        let log = ProgressLog::new();

        let run = pipeline.run(&log).await;

        assert_eq!(run.failed_sources, vec!["home".to_string()]);
        assert_eq!(run.charts.len(), 1);
        assert_eq!(run.charts[0].source, "cabin");
        assert!(run.formats.contains_key("cabin"));
        assert!(log.diagnostics().iter().any(|d| d.condition.as_deref() == Some("FetchFailure")));
        assert_eq!(log.entries().last().unwrap().message, "Done.");
    }

    #[tokio::test]
    async fn test_out_of_order_completion_waits_for_every_source() {
        // the first declared source finishes last
        let pipeline = pipeline(HashMap::from([
            ("http://home/api".to_string(), (50, Some(home_batch()))),
            ("http://cabin/api".to_string(), (0, Some(cabin_batch()))),
        ]));
        let log = ProgressLog::new();

        let run = pipeline.run(&log).await;

        let messages: Vec<String> = log.entries().into_iter().map(|e| e.message).collect();
        let cabin = messages.iter().position(|m| m == "Received data from cabin").unwrap();
        let home = messages.iter().position(|m| m == "Received data from home").unwrap();
        assert!(cabin < home);
        assert_eq!(messages.iter().filter(|m| *m == "Done.").count(), 1);
        assert_eq!(messages.last().map(String::as_str), Some("Done."));

        // output order follows declaration, not completion
        let sources: Vec<&str> = run.charts.iter().map(|c| c.source.as_str()).collect();
        assert_eq!(sources, vec!["home", "home", "cabin"]);
    }

    #[tokio::test]
    async fn test_run_without_sources_is_done_immediately() {
        let pipeline = ChartPipeline::new(Arc::new(FakeSource { batches: HashMap::new() }), Vec::new());
        let log = ProgressLog::new();

        let run = pipeline.run(&log).await;

        assert!(run.charts.is_empty());
        let messages: Vec<String> = log.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(messages.iter().filter(|m| *m == "Done.").count(), 1);
    }

    #[test]
    fn test_broken_display_format_skips_source() {
        let mut config = parse_sources_config(SOURCES, config::FileFormat::Toml).unwrap();
        config.sources[0].display_format = "%d %Q".to_string();
        let pipeline = ChartPipeline::new(
            Arc::new(FakeSource { batches: HashMap::new() }),
            config.sources.clone(),
        );
        let log = ProgressLog::new();

        let charts = pipeline.process_source(&config.sources[0], &home_batch(), &log);

        assert!(charts.is_empty());
        assert_eq!(log.diagnostics().len(), 1);
    }

    #[test]
    fn test_yearless_display_format_skips_source() {
        let mut config = parse_sources_config(SOURCES, config::FileFormat::Toml).unwrap();
        config.sources[0].display_format = "%d %b %H:%M".to_string();
        let pipeline = ChartPipeline::new(
            Arc::new(FakeSource { batches: HashMap::new() }),
            config.sources.clone(),
        );
        let log = ProgressLog::new();

        let charts = pipeline.process_source(&config.sources[0], &home_batch(), &log);

        assert!(charts.is_empty());
        let diagnostics = log.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].condition.as_deref(), Some("MalformedTimestamp"));
    }
}

// Series builder - chart points, running extrema and min/max markers
use crate::domain::error::PipelineResult;
use crate::domain::ordering::sort_by_time;
use crate::domain::timestamp::SourceFormats;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

pub const MAX_MARKER_COLOR: &str = "pink";
pub const MIN_MARKER_COLOR: &str = "white";
pub const DEFAULT_MARKER_TYPE: &str = "cross";

/// Key of one logical metric: `source.registration.set`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SeriesId(String);

impl SeriesId {
    pub fn new(source: &str, registration: &str, set: &str) -> Self {
        Self(format!("{}.{}.{}", source, registration, set))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerKind {
    #[default]
    None,
    Extremum,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub value: f64,
    pub label: String,
    pub marker_kind: MarkerKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker_type: Option<String>,
}

impl ChartPoint {
    pub fn new(value: f64, label: impl Into<String>) -> Self {
        Self {
            value,
            label: label.into(),
            marker_kind: MarkerKind::None,
            marker_color: None,
            marker_type: None,
        }
    }

    pub fn is_marked(&self) -> bool {
        self.marker_kind == MarkerKind::Extremum
    }

    fn mark(&mut self, color: &str, marker_type: &str) {
        self.marker_kind = MarkerKind::Extremum;
        self.marker_color = Some(color.to_string());
        self.marker_type = Some(marker_type.to_string());
    }
}

/// Running min/max of one series while its points are added
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ExtremumTracker {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ExtremumTracker {
    pub fn observe(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        if self.max.is_none_or(|max| value > max) {
            self.max = Some(value);
        }
        if self.min.is_none_or(|min| value < min) {
            self.min = Some(value);
        }
    }
}

/// Marker appearance for extrema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerStyle {
    pub max_color: String,
    pub min_color: String,
    pub marker_type: String,
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self {
            max_color: MAX_MARKER_COLOR.to_string(),
            min_color: MIN_MARKER_COLOR.to_string(),
            marker_type: DEFAULT_MARKER_TYPE.to_string(),
        }
    }
}

impl MarkerStyle {
    pub fn with_marker_type(marker_type: Option<&str>) -> Self {
        let mut style = Self::default();
        if let Some(marker_type) = marker_type {
            style.marker_type = marker_type.to_string();
        }
        style
    }
}

/// Positions that received the max and min markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtremaMarks {
    pub max: Option<usize>,
    pub min: Option<usize>,
}

/// Mark the points holding the tracked extrema.
///
/// Scans from the last point backward; the first match per extremum wins, so
/// ties go to the most recent point. A point holding both extrema ends up
/// with the min color.
pub fn mark_extrema(points: &mut [ChartPoint], tracker: &ExtremumTracker, style: &MarkerStyle) -> ExtremaMarks {
    let mut marks = ExtremaMarks::default();

    for i in (0..points.len()).rev() {
        if marks.max.is_none() && Some(points[i].value) == tracker.max {
            points[i].mark(&style.max_color, &style.marker_type);
            marks.max = Some(i);
        }
        if marks.min.is_none() && Some(points[i].value) == tracker.min {
            points[i].mark(&style.min_color, &style.marker_type);
            marks.min = Some(i);
        }
        if marks.max.is_some() && marks.min.is_some() {
            break;
        }
    }

    marks
}

/// Point accumulator for every series of one pipeline run
#[derive(Debug, Clone, Default)]
pub struct SeriesBuilder {
    series: BTreeMap<SeriesId, Vec<ChartPoint>>,
}

impl SeriesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `id` from an empty series
    pub fn register(&mut self, id: SeriesId) {
        self.series.insert(id, Vec::new());
    }

    /// Append an unmarked point; a missing value is charted as zero
    pub fn add_point(&mut self, id: &SeriesId, raw: Option<f64>, label: String, tracker: &mut ExtremumTracker) {
        let value = raw.unwrap_or(0.0);
        self.series
            .entry(id.clone())
            .or_default()
            .push(ChartPoint::new(value, label));
        tracker.observe(value);
    }

    pub fn sort(&mut self, id: &SeriesId, formats: &SourceFormats) -> PipelineResult<()> {
        if let Some(points) = self.series.get_mut(id) {
            *points = sort_by_time(points, formats)?;
        }
        Ok(())
    }

    pub fn mark_extrema(&mut self, id: &SeriesId, tracker: &ExtremumTracker, style: &MarkerStyle) -> ExtremaMarks {
        self.series
            .get_mut(id)
            .map(|points| mark_extrema(points, tracker, style))
            .unwrap_or_default()
    }

    pub fn points(&self, id: &SeriesId) -> &[ChartPoint] {
        self.series.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn take(&mut self, id: &SeriesId) -> Vec<ChartPoint> {
        self.series.remove(id).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

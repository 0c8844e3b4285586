// Series ordering and range filtering
use crate::domain::error::PipelineResult;
use crate::domain::series::ChartPoint;
use crate::domain::timestamp::{DateRange, SourceFormats};

pub const NO_DATA_LABEL: &str = "No data in range";

/// Placeholder series shown when a filter leaves nothing to draw
pub fn empty_range_sentinel() -> Vec<ChartPoint> {
    vec![ChartPoint::new(0.0, NO_DATA_LABEL)]
}

pub fn is_sentinel(points: &[ChartPoint]) -> bool {
    matches!(points, [only] if only.label == NO_DATA_LABEL)
}

/// Stable ascending sort by the instant each label denotes
pub fn sort_by_time(points: &[ChartPoint], formats: &SourceFormats) -> PipelineResult<Vec<ChartPoint>> {
    let mut keyed = points
        .iter()
        .map(|point| Ok((formats.parse_label(&point.label)?, point.clone())))
        .collect::<PipelineResult<Vec<_>>>()?;

    keyed.sort_by_key(|(instant, _)| *instant);
    Ok(keyed.into_iter().map(|(_, point)| point).collect())
}

/// Points whose instant lies inside `range` (inclusive). The source slice is
/// left untouched; an empty result becomes the sentinel series.
pub fn filter_by_range(
    points: &[ChartPoint],
    range: &DateRange,
    formats: &SourceFormats,
) -> PipelineResult<Vec<ChartPoint>> {
    let mut kept = Vec::new();
    for point in points {
        if range.contains(&formats.parse_label(&point.label)?) {
            kept.push(point.clone());
        }
    }

    if kept.is_empty() {
        return Ok(empty_range_sentinel());
    }
    Ok(kept)
}

/// Parse the bounds once, then filter. `range_format` is the layout of the
/// bounds; RFC 3339 / ISO-8601 when unset.
pub fn filter_by_labels(
    points: &[ChartPoint],
    start: &str,
    end: &str,
    range_format: Option<&str>,
    formats: &SourceFormats,
) -> PipelineResult<Vec<ChartPoint>> {
    let range = DateRange::parse(start, end, range_format)?;
    filter_by_range(points, &range, formats)
}

// Daily aggregation - one averaged point per day of year
use crate::domain::error::PipelineResult;
use crate::domain::series::ChartPoint;
use crate::domain::timestamp::SourceFormats;
use chrono::Datelike;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
struct DayTotal {
    sum: f64,
    count: usize,
    label: String,
}

/// Average `points` per day of year, ascending by day.
///
/// Days from different years share a bucket when they fall on the same
/// ordinal. Each emitted point carries the label of the last point seen for
/// its day.
pub fn average_by_day(points: &[ChartPoint], formats: &SourceFormats) -> PipelineResult<Vec<ChartPoint>> {
    let mut totals: BTreeMap<u32, DayTotal> = BTreeMap::new();

    for point in points {
        let day = formats.parse_label(&point.label)?.ordinal();
        let total = totals.entry(day).or_default();
        total.sum += point.value;
        total.count += 1;
        total.label.clone_from(&point.label);
    }

    Ok(totals
        .into_values()
        .map(|total| ChartPoint::new(total.sum / total.count as f64, total.label))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::series::{mark_extrema, ExtremumTracker, MarkerStyle};
    use approx::assert_relative_eq;

    #[test]
    fn test_average_by_day() {
        let points = vec![
            ChartPoint::new(4.0, "02 Jan 2024 10:00"),
            ChartPoint::new(1.0, "01 Jan 2024 09:00"),
            ChartPoint::new(3.0, "01 Jan 2024 18:00"),
            ChartPoint::new(8.0, "02 Jan 2024 06:00"),
        ];

        let averaged = average_by_day(&points, &SourceFormats::default()).unwrap();

        assert_eq!(averaged.len(), 2);
        assert_relative_eq!(averaged[0].value, 2.0);
        assert_relative_eq!(averaged[1].value, 6.0);
        // label of the last point processed for each day
        assert_eq!(averaged[0].label, "01 Jan 2024 18:00");
        assert_eq!(averaged[1].label, "02 Jan 2024 06:00");
    }

    #[test]
    fn test_average_drops_markers() {
        let mut points = vec![
            ChartPoint::new(10.0, "05 Mar 2024 10:00"),
            ChartPoint::new(20.0, "05 Mar 2024 11:00"),
        ];
        let tracker = ExtremumTracker { min: Some(10.0), max: Some(20.0) };
        mark_extrema(&mut points, &tracker, &MarkerStyle::default());

        let averaged = average_by_day(&points, &SourceFormats::default()).unwrap();
        assert_eq!(averaged, vec![ChartPoint::new(15.0, "05 Mar 2024 11:00")]);
    }

    #[test]
    fn test_average_same_ordinal_across_years() {
        let points = vec![
            ChartPoint::new(2.0, "10 Feb 2023 10:00"),
            ChartPoint::new(4.0, "10 Feb 2024 10:00"),
        ];

        let averaged = average_by_day(&points, &SourceFormats::default()).unwrap();
        assert_eq!(averaged, vec![ChartPoint::new(3.0, "10 Feb 2024 10:00")]);
    }

    #[test]
    fn test_average_empty_series() {
        assert!(average_by_day(&[], &SourceFormats::default()).unwrap().is_empty());
    }
}

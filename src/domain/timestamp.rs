// Time key normalization - source date/time fields into grouping keys and display labels
use crate::domain::error::{PipelineError, PipelineResult};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

pub const DEFAULT_DATE_FORMAT: &str = "%d.%m.%Y";
pub const DEFAULT_TIME_FORMAT: &str = "%H:%M:%S";
pub const DEFAULT_DISPLAY_FORMAT: &str = "%d %b %Y %H:%M";

/// Short time layout accepted when a source drops the seconds field
const SHORT_TIME_FORMAT: &str = "%H:%M";

/// Day-only layout used when describing an active range
const RANGE_DESCRIPTION_FORMAT: &str = "%d %b %Y";

/// Bound layouts tried after RFC 3339 when no explicit range format is configured
const RANGE_FALLBACK_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

/// Grouping key and canonical label derived from one record's timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeKey {
    pub date_key: String,
    pub label: String,
}

/// Per-source timestamp layouts (chrono strftime syntax)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFormats {
    pub date: String,
    pub time: String,
    pub display: String,
}

impl Default for SourceFormats {
    fn default() -> Self {
        Self {
            date: DEFAULT_DATE_FORMAT.to_string(),
            time: DEFAULT_TIME_FORMAT.to_string(),
            display: DEFAULT_DISPLAY_FORMAT.to_string(),
        }
    }
}

impl SourceFormats {
    /// Reject layouts chrono cannot interpret. A structurally wrong layout
    /// means the configuration is mis-declared, not that a record is bad.
    /// Labels must also parse back, otherwise sorting and filtering fail later.
    pub fn validate(&self) -> PipelineResult<()> {
        validate_format(&self.date)?;
        validate_format(&self.time)?;
        validate_format(&self.display)?;
        validate_round_trip(&self.display)
    }

    /// Normalize a record's date and optional time into a [`TimeKey`].
    ///
    /// When `time` is absent or blank the date field is treated as a combined
    /// timestamp and split on its first whitespace.
    pub fn normalize(&self, date: &str, time: Option<&str>) -> PipelineResult<TimeKey> {
        let (date_part, time_part) = match time.map(str::trim).filter(|t| !t.is_empty()) {
            Some(time) => (date.trim(), time),
            None => split_combined(date)
                .ok_or_else(|| PipelineError::malformed(date, format!("{} {}", self.date, self.time)))?,
        };

        let day = NaiveDate::parse_from_str(date_part, &self.date)
            .map_err(|_| PipelineError::malformed(date_part, &self.date))?;
        let clock = NaiveTime::parse_from_str(time_part, &self.time)
            .or_else(|_| NaiveTime::parse_from_str(time_part, SHORT_TIME_FORMAT))
            .map_err(|_| PipelineError::malformed(time_part, &self.time))?;

        Ok(TimeKey {
            date_key: day.format(&self.date).to_string(),
            label: day.and_time(clock).format(&self.display).to_string(),
        })
    }

    pub fn parse_label(&self, label: &str) -> PipelineResult<NaiveDateTime> {
        parse_label(label, &self.display)
    }
}

pub fn validate_format(format: &str) -> PipelineResult<()> {
    if format.trim().is_empty() || StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(PipelineError::malformed(format, "strftime layout"));
    }
    Ok(())
}

fn validate_round_trip(display_format: &str) -> PipelineResult<()> {
    let sample = NaiveDate::from_ymd_opt(2021, 11, 23)
        .and_then(|day| day.and_hms_opt(17, 45, 30))
        .ok_or_else(|| PipelineError::malformed(display_format, "strftime layout"))?;

    let label = sample.format(display_format).to_string();
    let parsed = parse_label(&label, display_format)?;
    if parsed.format(display_format).to_string() != label {
        return Err(PipelineError::malformed(label, display_format));
    }
    Ok(())
}

fn split_combined(value: &str) -> Option<(&str, &str)> {
    value
        .trim()
        .split_once(char::is_whitespace)
        .map(|(date, time)| (date, time.trim()))
}

/// Parse a display label. Layouts without a time of day resolve to midnight.
pub fn parse_label(label: &str, display_format: &str) -> PipelineResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(label, display_format)
        .or_else(|_| NaiveDate::parse_from_str(label, display_format).map(|d| d.and_time(NaiveTime::MIN)))
        .map_err(|_| PipelineError::malformed(label, display_format))
}

/// Parse a range bound. Offsets are discarded: bounds compare against labels
/// as wall-clock times.
pub fn parse_range_bound(value: &str, format: Option<&str>) -> PipelineResult<NaiveDateTime> {
    let value = value.trim();
    if let Some(format) = format {
        return parse_label(value, format);
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.naive_local());
    }
    RANGE_FALLBACK_FORMATS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(value, layout).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
        .ok_or_else(|| PipelineError::malformed(value, "RFC 3339"))
}

/// Re-key a date string from one layout to another (used when classifying rows)
pub fn reformat_date(value: &str, from: &str, to: &str) -> PipelineResult<String> {
    NaiveDate::parse_from_str(value.trim(), from)
        .map(|d| d.format(to).to_string())
        .map_err(|_| PipelineError::malformed(value, from))
}

/// Inclusive instant range, validated once before any filtering happens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateRange {
    pub fn parse(start: &str, end: &str, format: Option<&str>) -> PipelineResult<Self> {
        let invalid = |reason: &str| PipelineError::InvalidRange {
            start: start.to_string(),
            end: end.to_string(),
            reason: reason.to_string(),
        };

        let left = parse_range_bound(start, format).map_err(|_| invalid("unparsable start"))?;
        let right = parse_range_bound(end, format).map_err(|_| invalid("unparsable end"))?;
        if left >= right {
            return Err(invalid("start must be before end"));
        }

        Ok(Self { start: left, end: right })
    }

    pub fn contains(&self, instant: &NaiveDateTime) -> bool {
        *instant >= self.start && *instant <= self.end
    }

    pub fn describe(&self) -> String {
        format!(
            "{} - {}",
            self.start.format(RANGE_DESCRIPTION_FORMAT),
            self.end.format(RANGE_DESCRIPTION_FORMAT)
        )
    }
}

/// Description of the active filter, `All` when none is applied
pub fn describe_range(range: Option<&DateRange>) -> String {
    range.map(DateRange::describe).unwrap_or_else(|| "All".to_string())
}

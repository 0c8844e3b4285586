// Raw source records and the record classifier
use crate::domain::error::{PipelineError, PipelineResult};
use crate::domain::timestamp::{reformat_date, DEFAULT_DATE_FORMAT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// One flat row handed over by the storage collaborator
pub type SourceRow = BTreeMap<String, Value>;

/// Records grouped by bucket name for one date key
pub type DayBuckets = BTreeMap<String, Vec<RawRecord>>;

/// One measurement row inside a bucket
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl RawRecord {
    pub fn new(time: Option<String>) -> Self {
        Self {
            time,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_measurement(mut self, name: &str, value: f64) -> Self {
        self.fields.insert(name.to_string(), Value::from(value));
        self
    }

    /// Numeric value of a named field; numeric strings are coerced
    pub fn measurement(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(numeric)
    }
}

fn numeric(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    number.filter(|v: &f64| v.is_finite())
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Batch payload: `{ "response": { dateKey: { bucket: [records] } } }`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BatchResponse {
    #[serde(default)]
    pub response: BTreeMap<String, DayBuckets>,
}

impl BatchResponse {
    pub fn push(&mut self, date_key: String, bucket: &str, record: RawRecord) {
        self.response
            .entry(date_key)
            .or_default()
            .entry(bucket.to_string())
            .or_default()
            .push(record);
    }

    /// Every `(date_key, record)` pair held in `bucket`
    pub fn records_in<'a>(&'a self, bucket: &'a str) -> impl Iterator<Item = (&'a str, &'a RawRecord)> + 'a {
        self.response.iter().flat_map(move |(date, buckets)| {
            buckets
                .get(bucket)
                .into_iter()
                .flatten()
                .map(move |record| (date.as_str(), record))
        })
    }

    pub fn bucket_names(&self) -> BTreeSet<&str> {
        self.response
            .values()
            .flat_map(|buckets| buckets.keys().map(String::as_str))
            .collect()
    }

    /// Buckets present in the batch that no registration consumes
    pub fn unknown_buckets(&self, known: &BTreeSet<&str>) -> Vec<String> {
        self.bucket_names()
            .into_iter()
            .filter(|name| !known.contains(name))
            .map(str::to_string)
            .collect()
    }

    pub fn record_count(&self) -> usize {
        self.response.values().flat_map(BTreeMap::values).map(Vec::len).sum()
    }
}

/// Source column copied into a named measurement
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldMapping {
    pub name: String,
    pub column: String,
}

/// How rows of one kind become bucket records
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BucketRule {
    /// Discriminator value matched by [`Discriminator::Kind`]
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub bucket: String,
    /// Column holding the date, or the combined date-time when `time` is unset
    pub recorded: String,
    #[serde(default)]
    pub time: Option<String>,
    /// Layout of the date column; the value is used verbatim as key when unset
    #[serde(default)]
    pub date_format: Option<String>,
    #[serde(default = "default_key_format")]
    pub key_format: String,
    #[serde(default)]
    pub fields: Vec<FieldMapping>,
}

fn default_key_format() -> String {
    DEFAULT_DATE_FORMAT.to_string()
}

impl BucketRule {
    fn to_record(&self, row: &SourceRow) -> PipelineResult<(String, RawRecord)> {
        let recorded = row
            .get(&self.recorded)
            .and_then(text)
            .ok_or_else(|| PipelineError::malformed(format!("<missing {}>", self.recorded), "date column"))?;

        let (date, time) = match &self.time {
            Some(column) => (recorded.trim().to_string(), row.get(column).and_then(text)),
            None => {
                let (date, time) = recorded
                    .trim()
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| PipelineError::malformed(&recorded, "combined date and time"))?;
                (date.to_string(), Some(time.trim().to_string()))
            }
        };

        let date_key = match &self.date_format {
            Some(format) => reformat_date(&date, format, &self.key_format)?,
            None => date,
        };

        let mut record = RawRecord::new(time);
        for mapping in &self.fields {
            if let Some(value) = row.get(&mapping.column).and_then(numeric) {
                record.fields.insert(mapping.name.clone(), Value::from(value));
            }
        }

        Ok((date_key, record))
    }
}

/// Rule selecting the bucket a row belongs to
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "by", rename_all = "lowercase")]
pub enum Discriminator {
    /// Exact match of `row[field]` against the configured kinds
    Kind { field: String, kinds: Vec<BucketRule> },
    /// `row[field]` names the bucket (one bucket per location)
    Location { field: String, rule: BucketRule },
}

/// Classifier output plus everything it declined to place
#[derive(Debug, Default)]
pub struct Classification {
    pub batch: BatchResponse,
    pub diagnostics: Vec<PipelineError>,
}

/// Split flat rows into date-keyed buckets. Rows of unknown kind and rows with
/// unusable timestamps are skipped and reported, never fatal.
pub fn classify(rows: &[SourceRow], discriminator: &Discriminator) -> Classification {
    let mut classification = Classification::default();
    let mut unknown = BTreeSet::new();

    for row in rows {
        let placed = match discriminator {
            Discriminator::Kind { field, kinds } => {
                let kind = row.get(field).and_then(text).unwrap_or_default();
                match kinds.iter().find(|rule| rule.kind == kind) {
                    Some(rule) => Some((rule.bucket.clone(), rule)),
                    None => {
                        unknown.insert(kind);
                        None
                    }
                }
            }
            Discriminator::Location { field, rule } => match row.get(field).and_then(text) {
                Some(location) if !location.trim().is_empty() => Some((location.trim().to_string(), rule)),
                _ => {
                    unknown.insert(String::new());
                    None
                }
            },
        };

        let Some((bucket, rule)) = placed else {
            continue;
        };
        match rule.to_record(row) {
            Ok((date_key, record)) => classification.batch.push(date_key, &bucket, record),
            Err(err) => classification.diagnostics.push(err),
        }
    }

    classification
        .diagnostics
        .extend(unknown.into_iter().map(PipelineError::UnknownBucketKind));
    classification
}

use crate::domain::aqi::Pollutant;
use crate::domain::chart::{DEFAULT_CHART_TYPE, DEFAULT_MARKER_SIZE};
use crate::domain::formula::{FormulaSpec, VariableTable};
use crate::domain::metric::DerivedMetric;
use crate::domain::record::Discriminator;
use crate::domain::timestamp::{SourceFormats, DEFAULT_DATE_FORMAT, DEFAULT_DISPLAY_FORMAT, DEFAULT_TIME_FORMAT};
use serde::Deserialize;

const PARTICLES_BUCKET: &str = "particles";
const SENSORS_BUCKET: &str = "sensors";

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// JSON file of flat rows served through `/api`
    #[serde(default)]
    pub rows_path: Option<String>,
    #[serde(default)]
    pub classifier: Option<Discriminator>,
    /// Layout of range bounds passed to `/charts`; RFC 3339 when unset
    #[serde(default)]
    pub range_format: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourcesConfig {
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub id: String,
    pub url: String,
    #[serde(default = "default_date_format")]
    pub date_format: String,
    #[serde(default = "default_time_format")]
    pub time_format: String,
    #[serde(default = "default_display_format")]
    pub display_format: String,
    #[serde(default)]
    pub registrations: Vec<RegistrationConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegistrationConfig {
    pub id: String,
    pub title: String,
    /// Value axis title
    pub label: String,
    /// Value format string handed to the renderer
    #[serde(default)]
    pub label_format: Option<String>,
    #[serde(default = "default_chart_type")]
    pub chart_type: String,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub aqi: bool,
    #[serde(default)]
    pub sets: Vec<SeriesConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SeriesConfig {
    pub id: String,
    pub label: String,
    pub color: Option<String>,
    /// Record field to read; defaults to `id`
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub pollutant: Option<Pollutant>,
    /// Legacy pollutant code (25 or 10)
    #[serde(default, rename = "type")]
    pub pollutant_code: Option<u32>,
    #[serde(default)]
    pub formula: Option<FormulaConfig>,
    #[serde(default)]
    pub marker_size: Option<u32>,
    #[serde(default)]
    pub marker_type: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FormulaConfig {
    pub expression: String,
    #[serde(default)]
    pub base: Vec<f64>,
    #[serde(default)]
    pub sets: Vec<Vec<f64>>,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_date_format() -> String {
    DEFAULT_DATE_FORMAT.to_string()
}

fn default_time_format() -> String {
    DEFAULT_TIME_FORMAT.to_string()
}

fn default_display_format() -> String {
    DEFAULT_DISPLAY_FORMAT.to_string()
}

fn default_chart_type() -> String {
    DEFAULT_CHART_TYPE.to_string()
}

impl SourceConfig {
    pub fn formats(&self) -> SourceFormats {
        SourceFormats {
            date: self.date_format.clone(),
            time: self.time_format.clone(),
            display: self.display_format.clone(),
        }
    }
}

impl RegistrationConfig {
    /// Bucket this registration reads, `particles` for AQI charts and
    /// `sensors` otherwise unless configured
    pub fn bucket(&self) -> &str {
        match &self.bucket {
            Some(bucket) => bucket.as_str(),
            None if self.aqi => PARTICLES_BUCKET,
            None => SENSORS_BUCKET,
        }
    }
}

impl SeriesConfig {
    pub fn field(&self) -> &str {
        self.field.as_deref().unwrap_or(&self.id)
    }

    pub fn pollutant(&self) -> Option<Pollutant> {
        self.pollutant.or_else(|| self.pollutant_code.and_then(Pollutant::from_code))
    }

    pub fn marker_size(&self) -> u32 {
        self.marker_size.unwrap_or(DEFAULT_MARKER_SIZE)
    }

    /// Strategy applied to each measurement of this series. AQI registrations
    /// convert sets that name a pollutant; a formula applies anywhere.
    pub fn metric(&self, aqi: bool) -> DerivedMetric {
        if let Some(formula) = &self.formula {
            return DerivedMetric::Formula(formula.spec());
        }
        match self.pollutant() {
            Some(pollutant) if aqi => DerivedMetric::Aqi(pollutant),
            _ => DerivedMetric::Raw,
        }
    }
}

impl FormulaConfig {
    pub fn spec(&self) -> FormulaSpec {
        FormulaSpec::new(
            self.expression.clone(),
            VariableTable::new(self.base.clone()),
            self.sets.iter().cloned().map(VariableTable::new).collect(),
        )
    }
}

pub fn load_server_config() -> anyhow::Result<ServerConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/server").required(false))
        .add_source(config::Environment::with_prefix("CLIMATE"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

pub fn load_sources_config() -> anyhow::Result<SourcesConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/sources"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Parse a sources document held in memory
pub fn parse_sources_config(text: &str, format: config::FileFormat) -> anyhow::Result<SourcesConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::from_str(text, format))
        .build()?;

    Ok(settings.try_deserialize()?)
}

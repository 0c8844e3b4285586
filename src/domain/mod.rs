// Domain layer - the normalization and derivation core
pub mod aqi;
pub mod chart;
pub mod daily;
pub mod dashboard;
pub mod error;
pub mod formula;
pub mod metric;
pub mod ordering;
pub mod record;
pub mod series;
pub mod timestamp;

// Environmental sensor normalization and chart-series derivation
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

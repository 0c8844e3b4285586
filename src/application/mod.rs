// Application layer - use cases and collaborator seams
pub mod batch_service;
pub mod batch_source;
pub mod chart_service;
pub mod chart_view;
pub mod pipeline;
pub mod progress;
pub mod row_repository;

// Append-only progress log that pipeline stages write to synchronously
use crate::domain::error::PipelineError;
use serde::Serialize;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEntry {
    pub message: String,
    /// Condition name for diagnostics, absent for plain progress
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Milliseconds since the previous entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub took_ms: Option<u64>,
}

pub trait EventSink: Send + Sync {
    fn update(&self, message: String);

    /// Record a recoverable condition met while processing `context`
    fn diagnostic(&self, context: &str, condition: &PipelineError);
}

#[derive(Debug, Default)]
struct LogState {
    entries: Vec<ProgressEntry>,
    last: Option<Instant>,
}

/// Entries are kept in arrival order; every write also goes to `tracing`.
#[derive(Debug, Default)]
pub struct ProgressLog {
    state: Mutex<LogState>,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ProgressEntry> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .clone()
    }

    pub fn diagnostics(&self) -> Vec<ProgressEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.condition.is_some())
            .collect()
    }

    fn push(&self, message: String, condition: Option<String>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let took_ms = state
            .last
            .map(|last| now.duration_since(last).as_millis() as u64);
        state.last = Some(now);
        state.entries.push(ProgressEntry {
            message,
            condition,
            took_ms,
        });
    }
}

impl EventSink for ProgressLog {
    fn update(&self, message: String) {
        tracing::info!("{}", message);
        self.push(message, None);
    }

    fn diagnostic(&self, context: &str, condition: &PipelineError) {
        let message = format!("{}: {}", context, condition);
        tracing::warn!(condition = condition.kind(), "{}", message);
        self.push(message, Some(condition.kind().to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_entries_keep_arrival_order() {
        let log = ProgressLog::new();
        log.update("Connecting".to_string());
        log.diagnostic("home", &PipelineError::UnknownBucketKind("weather".to_string()));
        log.update("Done.".to_string());

        let entries = log.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].took_ms, None);
        assert!(entries[1].took_ms.is_some());
        assert_eq!(entries[1].message, "home: unknown bucket kind 'weather'");
        assert_eq!(entries[1].condition.as_deref(), Some("UnknownBucketKind"));
        assert_eq!(entries[2].message, "Done.");
        assert_eq!(log.diagnostics().len(), 1);
    }

    #[test]
    fn test_concurrent_writers_append() {
        let log = Arc::new(ProgressLog::new());
        let handles: Vec<_> = (0..4)
            .map(|n| {
                let log = log.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        log.update(format!("writer {} step {}", n, i));
                    }
                })
            })
            .collect();
        handles.into_iter().for_each(|h| h.join().unwrap());

        assert_eq!(log.entries().len(), 100);
    }
}

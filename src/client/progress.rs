use crate::models::percent;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// One progress update for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressSample {
    pub file_name: String,
    pub bytes_sent: u64,
    pub bytes_total: u64,
    pub percent: u8,
}

impl ProgressSample {
    pub fn new(file_name: &str, bytes_sent: u64, bytes_total: u64) -> Self {
        Self {
            file_name: file_name.to_string(),
            bytes_sent,
            bytes_total,
            percent: percent(bytes_sent, bytes_total),
        }
    }

    pub fn complete(file_name: &str, bytes_total: u64) -> Self {
        Self::new(file_name, bytes_total, bytes_total)
    }
}

/// Receives per-file progress from the upload clients.
///
/// Updates for a file arrive with non-decreasing `percent`; a file that
/// uploaded successfully always ends on a 100 sample. Implementations must
/// not block, they are called from inside the upload loop.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, sample: ProgressSample);
}

impl<F> ProgressReporter for F
where
    F: Fn(ProgressSample) + Send + Sync,
{
    fn report(&self, sample: ProgressSample) {
        self(sample)
    }
}

impl ProgressReporter for UnboundedSender<ProgressSample> {
    fn report(&self, sample: ProgressSample) {
        if self.send(sample).is_err() {
            tracing::debug!("Progress receiver dropped, update discarded");
        }
    }
}

/// Discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _sample: ProgressSample) {}
}

/// Latest percentage per file, readable while uploads run.
#[derive(Debug, Default, Clone)]
pub struct ProgressTracker {
    percents: Arc<DashMap<String, u8>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, file_name: &str) -> Option<u8> {
        self.percents.get(file_name).map(|p| *p.value())
    }

    pub fn snapshot(&self) -> Vec<(String, u8)> {
        let mut all: Vec<(String, u8)> = self
            .percents
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        all.sort();
        all
    }
}

impl ProgressReporter for ProgressTracker {
    fn report(&self, sample: ProgressSample) {
        // per-file percent never moves backwards
        let mut current = self.percents.entry(sample.file_name).or_insert(0);
        if sample.percent > *current {
            *current = sample.percent;
        }
    }
}

//! Results of incremental update batches

use crate::error::ArborError;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of one update batch.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct UpdateSummary {
    /// Monotonically increasing batch sequence number.
    pub sequence: u64,
    /// Files processed successfully, in processing order.
    pub updated_files: Vec<PathBuf>,
    /// Files pulled in by cascade rather than by the incoming batch.
    pub cascaded_files: Vec<PathBuf>,
    /// Files whose processing failed (each also reported as an error event).
    pub failed_files: Vec<PathBuf>,
    pub nodes_added: usize,
    pub nodes_removed: usize,
    pub edges_added: usize,
    pub edges_removed: usize,
    pub duration: Duration,
    /// The batch stopped early on cancellation.
    pub cancelled: bool,
}

impl UpdateSummary {
    pub fn new(sequence: u64) -> Self {
        UpdateSummary {
            sequence,
            ..UpdateSummary::default()
        }
    }

    /// Check if any file was processed.
    pub fn is_empty(&self) -> bool {
        self.updated_files.is_empty() && self.failed_files.is_empty()
    }
}

/// Notifications published by the update orchestrator.
#[derive(Debug, Clone)]
pub enum UpdateEvent {
    /// A batch finished with at least one processed file.
    Completed(UpdateSummary),
    /// One file failed; the rest of the batch carried on.
    Error {
        file_path: PathBuf,
        error: Arc<ArborError>,
    },
}

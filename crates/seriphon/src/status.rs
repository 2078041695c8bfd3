//! Job-scoped download status, shared between the worker pool and pollers.
//!
//! Each [`crate::engine::DownloadEngine`] owns one tracker; concurrent jobs on
//! separate engines therefore never clobber each other's state. Every mutating
//! operation is a single critical section, and [`StatusTracker::snapshot`]
//! returns a deep copy, so a poller can never observe a half-applied
//! transition.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// A failed item: filename plus the captured error message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadFailure {
    pub filename: String,
    pub message: String,
}

/// Point-in-time copy of the tracker state, safe to hand to any reader.
///
/// Invariant: a filename appears in at most one of `queued`, `downloading`
/// and `completed`; a failed filename has been removed from all three before
/// it shows up in `errors`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub active: bool,
    pub queued: Vec<String>,
    pub downloading: Vec<String>,
    pub completed: Vec<String>,
    pub errors: Vec<DownloadFailure>,
}

#[derive(Debug, Default)]
struct StatusState {
    active: bool,
    queued: Vec<String>,
    downloading: Vec<String>,
    completed: Vec<String>,
    errors: Vec<DownloadFailure>,
}

/// Lifecycle state machine for the items of one download job.
#[derive(Debug, Default)]
pub struct StatusTracker {
    state: Mutex<StatusState>,
}

fn remove(list: &mut Vec<String>, filename: &str) -> bool {
    match list.iter().position(|f| f == filename) {
        Some(idx) => {
            list.remove(idx);
            true
        }
        None => false,
    }
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new job: mark the tracker active and queue the given
    /// filenames, discarding any state from a previous job.
    pub fn reset(&self, filenames: impl IntoIterator<Item = String>) {
        let mut state = self.state.lock();
        state.active = true;
        state.queued = filenames.into_iter().collect();
        state.downloading.clear();
        state.completed.clear();
        state.errors.clear();
    }

    /// Move a filename from `queued` to `downloading`. No-op if it is not
    /// queued.
    pub fn mark_downloading(&self, filename: &str) {
        let mut state = self.state.lock();
        if remove(&mut state.queued, filename) {
            state.downloading.push(filename.to_string());
        }
    }

    /// Move a filename to `completed`, whether it was downloading or (for
    /// already-present files) still queued.
    pub fn mark_completed(&self, filename: &str) {
        let mut state = self.state.lock();
        remove(&mut state.downloading, filename);
        remove(&mut state.queued, filename);
        if !state.completed.iter().any(|f| f == filename) {
            state.completed.push(filename.to_string());
        }
    }

    /// Drop a filename from the live buckets and record the failure.
    pub fn mark_failed(&self, filename: &str, message: impl Into<String>) {
        let mut state = self.state.lock();
        remove(&mut state.queued, filename);
        remove(&mut state.downloading, filename);
        state.errors.push(DownloadFailure {
            filename: filename.to_string(),
            message: message.into(),
        });
    }

    /// Mark the job finished. The tracker is terminal once this has run and
    /// `downloading` is empty.
    pub fn finish(&self) {
        self.state.lock().active = false;
    }

    /// Deep copy of the current state.
    pub fn snapshot(&self) -> StatusSnapshot {
        let state = self.state.lock();
        StatusSnapshot {
            active: state.active,
            queued: state.queued.clone(),
            downloading: state.downloading.clone(),
            completed: state.completed.clone(),
            errors: state.errors.clone(),
        }
    }
}
